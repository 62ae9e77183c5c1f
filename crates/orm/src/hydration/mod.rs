//! Result Hydration
//!
//! Fills fresh entity instances from result rows. Rows are read positionally,
//! so the select list must be generated from the same metadata that is used
//! here; the column count is checked before any field is assigned.

use crate::backends::DatabaseRow;
use crate::error::{ModelError, ModelResult};
use crate::metadata::EntityMetadata;
use crate::model::Entity;

/// Build one instance from `row`
pub fn materialize_row<T: Entity>(
    metadata: &EntityMetadata<T>,
    row: &dyn DatabaseRow,
) -> ModelResult<T> {
    if row.column_count() != metadata.len() {
        return Err(ModelError::Query(format!(
            "Row has {} columns but {} maps {}",
            row.column_count(),
            std::any::type_name::<T>(),
            metadata.len()
        )));
    }

    let mut entity = T::default();
    for index in 0..metadata.len() {
        let value = row.get_by_index(index)?;
        metadata.assign(&mut entity, index, value)?;
    }

    Ok(entity)
}

/// Build the single instance of a point query; zero rows is `NotFound`
pub fn materialize_one<T: Entity>(
    metadata: &EntityMetadata<T>,
    table: &str,
    row: Option<Box<dyn DatabaseRow>>,
) -> ModelResult<T> {
    match row {
        Some(row) => materialize_row(metadata, row.as_ref()),
        None => Err(ModelError::NotFound(table.to_string())),
    }
}

/// Build every instance of a list query, in row order
pub fn materialize_all<T: Entity>(
    metadata: &EntityMetadata<T>,
    rows: Vec<Box<dyn DatabaseRow>>,
) -> ModelResult<Vec<T>> {
    rows.iter()
        .map(|row| materialize_row(metadata, row.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DatabaseValue;
    use crate::error::{ErrorKind, OrmResult};
    use crate::model::FieldBinding;

    struct MockDatabaseRow {
        columns: Vec<&'static str>,
        values: Vec<DatabaseValue>,
    }

    impl MockDatabaseRow {
        fn boxed(values: Vec<DatabaseValue>) -> Box<dyn DatabaseRow> {
            Box::new(Self {
                columns: vec!["ID", "NAME", "PRICE"][..values.len().min(3)].to_vec(),
                values,
            })
        }
    }

    impl DatabaseRow for MockDatabaseRow {
        fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
            self.values
                .get(index)
                .cloned()
                .ok_or_else(|| ModelError::Query(format!("No column at index {}", index)))
        }

        fn column_count(&self) -> usize {
            self.values.len()
        }

        fn column_names(&self) -> Vec<String> {
            self.columns.iter().map(|c| c.to_string()).collect()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Product {
        id: i64,
        name: String,
        price: f64,
        cached: bool,
    }

    impl Entity for Product {
        fn table_name() -> &'static str {
            "PRODUCTS"
        }

        fn fields() -> Vec<FieldBinding<Self>> {
            vec![
                FieldBinding::new("id", "ID,pk", |p| p.id.into(), |p, v| {
                    p.id = v.into_field()?;
                    Ok(())
                }),
                FieldBinding::unmapped("cached"),
                FieldBinding::new("name", "NAME", |p| p.name.clone().into(), |p, v| {
                    p.name = v.into_field()?;
                    Ok(())
                }),
                FieldBinding::new("price", "PRICE", |p| p.price.into(), |p, v| {
                    p.price = v.into_field()?;
                    Ok(())
                }),
            ]
        }
    }

    fn row(id: i64, name: &str, price: f64) -> Box<dyn DatabaseRow> {
        MockDatabaseRow::boxed(vec![
            DatabaseValue::Int64(id),
            DatabaseValue::String(name.to_string()),
            DatabaseValue::Float64(price),
        ])
    }

    fn metadata() -> EntityMetadata<Product> {
        EntityMetadata::extract().unwrap()
    }

    #[test]
    fn test_materialize_one() {
        let product: Product =
            materialize_one(&metadata(), "PRODUCTS", Some(row(1, "Lamp", 20.0))).unwrap();

        assert_eq!(
            product,
            Product {
                id: 1,
                name: "Lamp".into(),
                price: 20.0,
                cached: false,
            }
        );
    }

    #[test]
    fn test_point_query_without_row_is_not_found() {
        let err = materialize_one::<Product>(&metadata(), "PRODUCTS", None).unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Record not found in table 'PRODUCTS'");
    }

    #[test]
    fn test_materialize_all_keeps_row_order() {
        let rows = vec![row(2, "Desk", 120.0), row(1, "Lamp", 20.0)];
        let products = materialize_all(&metadata(), rows).unwrap();

        assert_eq!(products.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 1]);
        assert!(materialize_all(&metadata(), Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_column_count_mismatch() {
        let short = MockDatabaseRow::boxed(vec![DatabaseValue::Int64(1), DatabaseValue::Null]);
        let err = materialize_row(&metadata(), short.as_ref()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_conversion_error_names_column() {
        let bad = MockDatabaseRow::boxed(vec![
            DatabaseValue::Int64(1),
            DatabaseValue::String("Lamp".into()),
            DatabaseValue::String("cheap".into()),
        ]);
        let err = materialize_all(&metadata(), vec![row(2, "Desk", 1.0), bad]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("'PRICE'"), "{}", err);
    }
}
