use crudmap::Entity;

#[derive(Default, Entity)]
struct Pair(i64, String);

fn main() {}
