use std::marker::PhantomData;

use crudmap::Entity;

pub trait Tenant: Send + Sync + 'static {}

#[derive(Default)]
pub struct Acme;

impl Tenant for Acme {}

#[derive(Entity)]
#[db(table = "ACCOUNTS")]
pub struct Account<T: Tenant> {
    #[db("ID,pk")]
    id: i64,
    #[db("OWNER")]
    owner: String,
    tenant: PhantomData<T>,
}

impl<T: Tenant> Default for Account<T> {
    fn default() -> Self {
        Self {
            id: 0,
            owner: String::new(),
            tenant: PhantomData,
        }
    }
}

fn main() {
    assert_eq!(Account::<Acme>::table_name(), "ACCOUNTS");
}
