//! Query planner - turns an expression tree into a parameterized statement.
//!
//! Three cooperating parts:
//! 1. [`ColumnResolver`]: column token → entity + property binding
//! 2. [`JoinGraphBuilder`]: referenced entities → JOIN clauses from the root
//! 3. [`QueryCompiler`]: walks the tree, binds literals, assembles the statement

pub mod compiler;
pub mod join_builder;
pub mod resolver;

pub use compiler::QueryCompiler;
pub use join_builder::JoinGraphBuilder;
pub use resolver::{ColumnReference, ColumnResolution, ColumnResolver, ColumnSource};

use thiserror::Error;

/// Errors that can occur while compiling a query.
///
/// Every variant aborts the compilation; no partial SQL is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column '{column}' is defined on several entities: {}", entities.join(", "))]
    AmbiguousColumn {
        column: String,
        entities: Vec<String>,
    },

    #[error("Entity '{entity}' is not related to query entity '{root}'")]
    UnrelatedEntities { entity: String, root: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl QueryError {
    /// Stable error code reported to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UnknownEntity(_) => "UNKNOWN_ENTITY",
            QueryError::UnknownColumn(_) => "UNKNOWN_COLUMN",
            QueryError::AmbiguousColumn { .. } => "AMBIGUOUS_COLUMN",
            QueryError::UnrelatedEntities { .. } => "UNRELATED_ENTITIES",
            QueryError::InvalidQuery(_) => "INVALID_QUERY",
        }
    }
}

impl From<crate::dsl::RangeParseError> for QueryError {
    fn from(err: crate::dsl::RangeParseError) -> Self {
        QueryError::InvalidQuery(err.to_string())
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
