use crudmap::Entity;

#[derive(Default, Entity)]
struct Shipment {
    #[db("ID,primary")]
    id: i64,
}

fn main() {}
