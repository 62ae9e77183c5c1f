use crudmap::{Entity, EntityMetadata};

#[derive(Debug, Default, Entity)]
#[db(table = "PRODUCTS")]
pub struct Product {
    #[db("ID,pk,seq=PRODUCTS_SEQ")]
    id: i64,
    #[db("NAME")]
    name: String,
    #[db("PRICE")]
    price: f64,
}

fn main() {
    assert_eq!(Product::table_name(), "PRODUCTS");
    let metadata = EntityMetadata::<Product>::extract().unwrap();
    assert_eq!(metadata.column_names(), vec!["ID", "NAME", "PRICE"]);
}
