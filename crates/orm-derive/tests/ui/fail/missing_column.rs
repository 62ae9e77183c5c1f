use crudmap::Entity;

#[derive(Default, Entity)]
struct Shipment {
    #[db(",pk")]
    id: i64,
}

fn main() {}
