use crudmap::Entity;

#[derive(Default, Entity)]
struct Shipment {
    #[db("ID,pk")]
    id: i64,
    #[db("NAME,seq=S")]
    name: String,
}

fn main() {}
