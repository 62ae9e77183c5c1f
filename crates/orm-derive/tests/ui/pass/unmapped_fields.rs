use crudmap::Entity;

// No table attribute: the table is the upper-cased struct name
#[derive(Debug, Default, Entity)]
pub struct Invoice {
    #[db("INVOICE_NO, pk")]
    number: String,
    #[db("ISSUED_YEAR")]
    issued_year: Option<i32>,
    #[db("NOTE")]
    note: Option<String>,
    cached_total: f64,
}

fn main() {
    assert_eq!(Invoice::table_name(), "INVOICE");
    assert_eq!(Invoice::fields().len(), 3);
}
