//! Identifier validation for generated SQL
//!
//! Values always travel as positional parameters, but table, column and
//! sequence names are spliced into the statement text. Every such name is
//! checked here before it reaches the statement builder, so an annotation or
//! a caller-supplied table name can never smuggle SQL into a statement.

use crate::error::ModelError;

/// Characters allowed in SQL identifiers (alphanumeric, underscore, dollar)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$";

/// Longest identifier accepted by every supported dialect
const MAX_IDENTIFIER_LEN: usize = 63;

/// SQL keywords that must be rejected
static SQL_KEYWORDS: &[&str] = &[
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "FROM",
    "WHERE",
    "JOIN",
    "UNION",
    "DROP",
    "CREATE",
    "ALTER",
    "GRANT",
    "REVOKE",
    "TRUNCATE",
    "EXEC",
    "EXECUTE",
    "DECLARE",
    "ORDER",
    "GROUP",
    "TABLE",
    "VALUES",
    "SET",
    "INTO",
    "RETURNING",
];

/// Validate that an identifier is safe for use in SQL
///
/// # Arguments
/// * `identifier` - The identifier to validate
///
/// # Returns
/// * Ok(()) if valid, Err(ModelError::Validation) if invalid
pub fn validate_identifier(identifier: &str) -> Result<(), ModelError> {
    let first = match identifier.chars().next() {
        Some(c) => c,
        None => {
            return Err(ModelError::Validation(
                "Identifier cannot be empty".to_string(),
            ))
        }
    };

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' is too long (max {} characters)",
            identifier, MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(c) = identifier.chars().find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c)) {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' contains invalid character '{}'",
            identifier, c
        )));
    }

    if first.is_ascii_digit() || first == '$' {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' must start with a letter or underscore",
            identifier
        )));
    }

    let upper_identifier = identifier.to_uppercase();
    if SQL_KEYWORDS.contains(&upper_identifier.as_str()) {
        return Err(ModelError::Validation(format!(
            "Identifier '{}' is a reserved SQL keyword",
            identifier
        )));
    }

    Ok(())
}

/// Validate a table name, optionally qualified by one schema (`SHOP.PRODUCTS`)
pub fn validate_table_name(table: &str) -> Result<(), ModelError> {
    let mut parts = table.split('.');
    let (first, second, rest) = (parts.next(), parts.next(), parts.next());

    if rest.is_some() {
        return Err(ModelError::Validation(format!(
            "Table name '{}' has more than one schema qualifier",
            table
        )));
    }

    if let Some(schema) = first {
        validate_identifier(schema)?;
    }
    if let Some(name) = second {
        validate_identifier(name)?;
    }

    Ok(())
}
