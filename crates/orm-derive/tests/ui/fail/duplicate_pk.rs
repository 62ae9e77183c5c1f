use crudmap::Entity;

#[derive(Default, Entity)]
struct Shipment {
    #[db("ID,pk")]
    id: i64,
    #[db("CODE,pk")]
    code: String,
}

fn main() {}
