//! # fims-query
//!
//! Compiles entity query expressions over a per-project attribute schema into
//! a single parameterized PostgreSQL statement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Expression tree (from an upstream parser)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner::QueryCompiler]
//! ┌─────────────────────────────────────────────────────────┐
//! │  ColumnResolver      token → entity + property URI       │
//! │  JoinGraphBuilder    entities → JOINs from the root      │
//! │  ParamStore          literals → :1, :2, ...              │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql::query]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ParametrizedQuery { sql, params }                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The schema ([`model::ProjectConfig`]) is read-only and may be shared
//! between threads; each compilation owns its own compiler.

pub mod compile;
pub mod config;
pub mod dsl;
pub mod model;
pub mod planner;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{compile_query, CompileOptions};
    pub use crate::dsl::{ComparisonOperator, Expression, LogicalOperator};
    pub use crate::model::{Attribute, DataType, Entity, ExpeditionMetadataProperty, ProjectConfig};
    pub use crate::planner::{ColumnResolution, QueryCompiler, QueryError, QueryResult};
    pub use crate::sql::ParametrizedQuery;
}

pub use compile::{compile_query, CompileOptions};
pub use planner::{QueryError, QueryResult};
pub use sql::ParametrizedQuery;
