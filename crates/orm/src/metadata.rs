//! Metadata Extraction
//!
//! Turns an entity's field-binding table into column descriptors by parsing
//! the per-field annotations. Metadata is derived on every call; nothing is
//! cached between operations.

use serde::Serialize;

use crate::backends::DatabaseValue;
use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, FieldBinding};
use crate::security::{validate_identifier, validate_table_name};

/// Flag marking the primary-key column
const PRIMARY_KEY_FLAG: &str = "pk";

/// Key of the flag naming the identity sequence
const SEQUENCE_FLAG: &str = "seq";

/// Mapping of one entity field onto a table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub column: String,
    pub is_primary_key: bool,
    pub sequence: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            is_primary_key: false,
            sequence: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = Some(sequence.into());
        self
    }

    /// Whether the database generates this column's value on insert
    pub fn is_generated(&self) -> bool {
        self.is_primary_key && self.sequence.is_some()
    }
}

/// Parse a field annotation of the form `COLUMN[,pk][,seq=SEQUENCE]`.
///
/// Returns `Ok(None)` for an empty annotation, meaning the field is not
/// mapped. Tokens are trimmed, so `"ID, pk, seq = S"` is accepted.
pub fn parse_annotation(annotation: &str) -> ModelResult<Option<ColumnDescriptor>> {
    if annotation.trim().is_empty() {
        return Ok(None);
    }

    let mut tokens = annotation.split(',').map(str::trim);
    let column = tokens.next().unwrap_or_default();
    if column.is_empty() {
        return Err(ModelError::Validation(format!(
            "Annotation '{}' has no column name",
            annotation
        )));
    }
    validate_identifier(column)?;

    let mut descriptor = ColumnDescriptor::new(column);
    for token in tokens {
        if token == PRIMARY_KEY_FLAG {
            if descriptor.is_primary_key {
                return Err(repeated_flag(annotation, PRIMARY_KEY_FLAG));
            }
            descriptor.is_primary_key = true;
            continue;
        }

        let sequence = match token.split_once('=') {
            Some((key, value)) if key.trim() == SEQUENCE_FLAG => value.trim(),
            _ => {
                return Err(ModelError::Validation(format!(
                    "Unknown flag '{}' in annotation '{}'",
                    token, annotation
                )))
            }
        };
        if descriptor.sequence.is_some() {
            return Err(repeated_flag(annotation, SEQUENCE_FLAG));
        }
        if sequence.is_empty() {
            return Err(ModelError::Validation(format!(
                "Annotation '{}' has an empty sequence name",
                annotation
            )));
        }
        validate_table_name(sequence)?;
        descriptor.sequence = Some(sequence.to_string());
    }

    if descriptor.sequence.is_some() && !descriptor.is_primary_key {
        return Err(ModelError::Validation(format!(
            "Annotation '{}' binds a sequence to a column that is not the primary key",
            annotation
        )));
    }

    Ok(Some(descriptor))
}

fn repeated_flag(annotation: &str, flag: &str) -> ModelError {
    ModelError::Validation(format!(
        "Flag '{}' repeated in annotation '{}'",
        flag, annotation
    ))
}

/// Column descriptors for `T` in declaration order
pub fn extract_columns<T: Entity>() -> ModelResult<Vec<ColumnDescriptor>> {
    Ok(EntityMetadata::<T>::extract()?.descriptors())
}

/// Column descriptors of an entity type, kept aligned with the field accessors
#[derive(Debug)]
pub struct EntityMetadata<T> {
    columns: Vec<ColumnDescriptor>,
    bindings: Vec<FieldBinding<T>>,
    primary_key: Option<usize>,
}

impl<T: Entity> EntityMetadata<T> {
    /// Parse and validate every annotation of `T`
    pub fn extract() -> ModelResult<Self> {
        let mut columns: Vec<ColumnDescriptor> = Vec::new();
        let mut bindings = Vec::new();
        let mut primary_key = None;

        for binding in T::fields() {
            let descriptor = match parse_annotation(binding.annotation())? {
                Some(descriptor) => descriptor,
                None => continue,
            };

            // unquoted identifiers fold case, so `id` and `ID` name one column
            if columns.iter().any(|c| c.column.eq_ignore_ascii_case(&descriptor.column)) {
                return Err(ModelError::Validation(format!(
                    "Column '{}' is mapped by more than one field (second: '{}')",
                    descriptor.column,
                    binding.name()
                )));
            }

            if descriptor.is_primary_key {
                if let Some(existing) = primary_key {
                    let first: &ColumnDescriptor = &columns[existing];
                    return Err(ModelError::Validation(format!(
                        "Entity has more than one primary key ('{}' and '{}')",
                        first.column, descriptor.column
                    )));
                }
                primary_key = Some(columns.len());
            }

            columns.push(descriptor);
            bindings.push(binding);
        }

        if columns.is_empty() {
            return Err(ModelError::Validation(format!(
                "Entity {} has no mapped fields",
                std::any::type_name::<T>()
            )));
        }

        Ok(Self {
            columns,
            bindings,
            primary_key,
        })
    }
}

impl<T> EntityMetadata<T> {
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn descriptors(&self) -> Vec<ColumnDescriptor> {
        self.columns.clone()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }

    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.primary_key.map(|index| &self.columns[index])
    }

    /// Primary-key column, or a mapping error naming `operation`
    pub fn require_primary_key(&self, operation: &str) -> ModelResult<&ColumnDescriptor> {
        self.primary_key().ok_or_else(|| {
            ModelError::Mapping(format!(
                "{} requires a field annotated 'pk' on {}",
                operation,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Value of the column at `index` on `entity`
    pub fn value_of(&self, entity: &T, index: usize) -> DatabaseValue {
        self.bindings[index].value(entity)
    }

    /// Value of the primary-key column on `entity`, if `T` has one
    pub fn primary_key_value(&self, entity: &T) -> Option<DatabaseValue> {
        self.primary_key.map(|index| self.value_of(entity, index))
    }

    /// Store `value` into the field mapped to the column at `index`
    pub fn assign(&self, entity: &mut T, index: usize, value: DatabaseValue) -> ModelResult<()> {
        self.bindings[index]
            .assign(entity, value)
            .map_err(|e| e.for_column(&self.columns[index].column))
    }

    /// Store `value` into the primary-key field
    pub fn assign_primary_key(&self, entity: &mut T, value: DatabaseValue) -> ModelResult<()> {
        let index = match self.primary_key {
            Some(index) => index,
            None => {
                return Err(ModelError::Mapping(format!(
                    "{} has no field annotated 'pk'",
                    std::any::type_name::<T>()
                )))
            }
        };
        self.assign(entity, index, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    macro_rules! entity {
        ($name:ident { $($field:literal),* $(,)? }) => {
            #[derive(Debug, Default)]
            struct $name {
                values: Vec<DatabaseValue>,
            }

            impl Entity for $name {
                fn table_name() -> &'static str {
                    stringify!($name)
                }

                fn fields() -> Vec<FieldBinding<Self>> {
                    vec![$(FieldBinding::new($field, $field, |_| DatabaseValue::Null, |e, v| {
                        e.values.push(v);
                        Ok(())
                    })),*]
                }
            }
        };
    }

    #[test]
    fn test_parse_plain_column() {
        let descriptor = parse_annotation("NAME").unwrap().unwrap();
        assert_eq!(descriptor, ColumnDescriptor::new("NAME"));
        assert!(!descriptor.is_generated());
    }

    #[test]
    fn test_parse_primary_key_with_sequence() {
        let descriptor = parse_annotation("ID,pk,seq=PRODUCTS_SEQ").unwrap().unwrap();
        assert_eq!(
            descriptor,
            ColumnDescriptor::new("ID").primary_key().with_sequence("PRODUCTS_SEQ")
        );
        assert!(descriptor.is_generated());

        let spaced = parse_annotation(" ID , pk , seq = PRODUCTS_SEQ ").unwrap().unwrap();
        assert_eq!(spaced, descriptor);

        let reordered = parse_annotation("ID,seq=SHOP.PRODUCTS_SEQ,pk").unwrap().unwrap();
        assert_eq!(reordered.sequence.as_deref(), Some("SHOP.PRODUCTS_SEQ"));
    }

    #[test]
    fn test_empty_annotation_is_unmapped() {
        assert_eq!(parse_annotation("").unwrap(), None);
        assert_eq!(parse_annotation("   ").unwrap(), None);
    }

    #[test]
    fn test_malformed_annotations_are_rejected() {
        for annotation in [
            ",pk",
            "ID,primary",
            "ID,pk,pk",
            "ID,pk,seq=",
            "ID,pk,seq=A,seq=B",
            "NAME,seq=S",
            "NAME;DROP",
            "ID,pk,seq=S;DROP",
            "ID,pk,",
            "SELECT",
        ] {
            let err = parse_annotation(annotation).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "annotation {:?}", annotation);
        }
    }

    entity!(Product { "ID,pk,seq=S", "NAME", "", "PRICE" });
    entity!(Untracked { "CODE", "LABEL" });
    entity!(Nothing { "", "" });
    entity!(TwoKeys { "A,pk", "B,pk" });
    entity!(Duplicated { "A", "B", "A" });
    entity!(DuplicatedByCase { "ID,pk", "NAME", "id" });

    #[test]
    fn test_extract_keeps_declaration_order_and_skips_unmapped() {
        let metadata = EntityMetadata::<Product>::extract().unwrap();

        assert_eq!(metadata.column_names(), vec!["ID", "NAME", "PRICE"]);
        assert_eq!(metadata.primary_key().unwrap().column, "ID");
        assert_eq!(extract_columns::<Product>().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_primary_key_is_legal_until_required() {
        let metadata = EntityMetadata::<Untracked>::extract().unwrap();

        assert!(metadata.primary_key().is_none());
        let err = metadata.require_primary_key("delete").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mapping);
    }

    #[test]
    fn test_invalid_entity_shapes() {
        for err in [
            EntityMetadata::<Nothing>::extract().unwrap_err(),
            EntityMetadata::<TwoKeys>::extract().unwrap_err(),
            EntityMetadata::<Duplicated>::extract().unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_duplicate_columns_differing_only_in_case_are_rejected() {
        let err = EntityMetadata::<DuplicatedByCase>::extract().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("'id'"), "{}", err);
    }

    #[test]
    fn test_assign_goes_through_bindings() {
        let metadata = EntityMetadata::<Product>::extract().unwrap();
        let mut product = Product::default();

        metadata.assign_primary_key(&mut product, DatabaseValue::Int64(5)).unwrap();
        metadata.assign(&mut product, 2, DatabaseValue::Float64(1.5)).unwrap();

        assert_eq!(
            product.values,
            vec![DatabaseValue::Int64(5), DatabaseValue::Float64(1.5)]
        );
    }
}
