//! SQL generation for PostgreSQL.
//!
//! Statements are built from [`Token`]s and serialized at the very end, so
//! there is exactly one place where text is produced.

pub mod query;
pub mod token;

pub use query::{Join, JoinType, ParamStore, ParametrizedQuery, Query, SelectExpr, TableRef};
pub use token::{Token, TokenStream};
