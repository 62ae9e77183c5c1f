use crudmap::Entity;

#[derive(Default, Entity)]
struct Shipment {
    #[db("ID,pk,seq=")]
    id: i64,
}

fn main() {}
