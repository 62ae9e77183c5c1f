use crudmap::Entity;

#[derive(Default, Entity)]
struct Shipment {
    #[db("ID,pk,pk")]
    id: i64,
}

fn main() {}
