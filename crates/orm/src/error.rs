//! Error types for the mapping layer
//!
//! Every failure surfaces as a [`ModelError`]. Callers that need to react to
//! the broad class of a failure (for example mapping "not found" and
//! "execution failed" to different outward responses) match on
//! [`ModelError::kind`] instead of the individual variants.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Broad failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The entity type lacks a mapping the operation needs (usually a primary key)
    Mapping,
    /// Malformed annotations, unsafe identifiers or an invalid entity value
    Validation,
    /// A point query matched no row
    NotFound,
    /// Statement execution or row conversion failed
    Execution,
    /// Invalid configuration or unsupported backend
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Mapping => "mapping",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Execution => "execution",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Error types for mapper operations
#[derive(Debug, Error)]
pub enum ModelError {
    /// Entity type has no field mapped as primary key
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Annotation grammar, identifier or entity value rejected
    #[error("Validation error: {0}")]
    Validation(String),

    /// Point query returned zero rows
    #[error("Record not found in table '{0}'")]
    NotFound(String),

    /// Driver-level failure while executing a statement
    #[error("Database error: {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    /// Failure reported by a driver outside the sqlx stack
    #[error("Driver error: {context}: {source}")]
    Driver {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Execution failure reported by a backend without a driver error to chain
    #[error("Query error: {0}")]
    Query(String),

    /// Column value could not be converted into the field's type
    #[error("Cannot convert column '{column}' from {found} to {expected}")]
    Conversion {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Connection pool could not be created or used
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    /// Wrap a driver error with a short description of what was being attempted
    pub fn database(context: impl Into<String>, source: sqlx::Error) -> Self {
        ModelError::Database {
            context: context.into(),
            source,
        }
    }

    pub fn driver(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ModelError::Driver {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::Mapping(_) => ErrorKind::Mapping,
            ModelError::Validation(_) => ErrorKind::Validation,
            ModelError::NotFound(_) => ErrorKind::NotFound,
            ModelError::Database { .. }
            | ModelError::Driver { .. }
            | ModelError::Query(_)
            | ModelError::Conversion { .. }
            | ModelError::Connection(_) => ErrorKind::Execution,
            ModelError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Rename the column reported by a conversion error.
    ///
    /// Field setters only see the value, so the materializer fills in the
    /// column name after the fact.
    pub(crate) fn for_column(self, name: &str) -> Self {
        match self {
            ModelError::Conversion {
                expected, found, ..
            } => ModelError::Conversion {
                column: name.to_string(),
                expected,
                found,
            },
            other => other,
        }
    }
}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::database("statement failed", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ModelError::Mapping("x".into()).kind(), ErrorKind::Mapping);
        assert_eq!(ModelError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(ModelError::Query("x".into()).kind(), ErrorKind::Execution);
        assert!(ModelError::NotFound("PRODUCTS".into()).is_not_found());
        assert!(!ModelError::Query("boom".into()).is_not_found());
    }

    #[test]
    fn test_driver_error_is_kept_as_source() {
        let err = ModelError::database("insert into PRODUCTS", sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().starts_with("Database error: insert into PRODUCTS: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_non_sqlx_driver_error_is_kept_as_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "listener went away");
        let err = ModelError::driver("insert into PRODUCTS", io);

        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.to_string(), "Driver error: insert into PRODUCTS: listener went away");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_conversion_error_column_rename() {
        let err = ModelError::Conversion {
            column: String::new(),
            expected: "i64",
            found: "String",
        }
        .for_column("PRICE");

        assert_eq!(err.to_string(), "Cannot convert column 'PRICE' from String to i64");
    }
}
