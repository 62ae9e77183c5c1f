//! SQL Generation
//!
//! Builds parameterized statements from entity metadata. Values always travel
//! as positional parameters; only validated identifiers are spliced into the
//! statement text.

pub mod builder;

pub use builder::StatementBuilder;

use crate::backends::DatabaseValue;

/// A generated statement with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
    /// Set for inserts that hand back the generated primary key
    pub returning: Option<Returning>,
}

impl Statement {
    pub fn new(sql: String, params: Vec<DatabaseValue>) -> Self {
        Self {
            sql,
            params,
            returning: None,
        }
    }
}

/// Column returned by an insert, and the output parameter receiving it on
/// dialects that return through a bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Returning {
    pub column: String,
    pub out_position: usize,
}
