//! End-to-end compilation from an expression tree to parameterized SQL.
//!
//! This module provides the high-level API:
//!
//! ```text
//! Schema JSON → ProjectConfig ─┐
//!                              ├→ QueryCompiler → ParametrizedQuery
//! Expression JSON → Expression ┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use fims_query::compile::{compile_query, CompileOptions};
//! use fims_query::dsl::{ComparisonOperator, Expression};
//! use fims_query::model::ProjectConfig;
//!
//! let project = ProjectConfig::from_json(&schema_json)?;
//! let expr = Expression::comparison("year", ComparisonOperator::GreaterThan, "2001");
//!
//! let options = CompileOptions::default().with_limit(100).only_public(true);
//! let query = compile_query(&project, "Event", &expr, &options)?;
//! println!("{}", query.sql());
//! ```

use log::debug;

use crate::config::Settings;
use crate::dsl::Expression;
use crate::model::{ProjectConfig, SchemaError};
use crate::planner::{ColumnResolution, QueryCompiler, QueryError, QueryResult};
use crate::sql::query::ParametrizedQuery;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when compiling from documents.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid expression document: {0}")]
    Expression(#[from] serde_json::Error),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Options
// ============================================================================

/// Per-request compilation options.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub network_id: u32,
    /// Zero-based page number; only used together with a limit.
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Requested limits above this are clamped.
    pub max_limit: u64,
    pub only_public: bool,
    pub column_resolution: ColumnResolution,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CompileOptions {
    /// Options carrying the configured query defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        let query = &settings.query;
        Self {
            network_id: query.network_id,
            page: None,
            limit: query.default_limit,
            max_limit: query.max_limit,
            only_public: query.only_public_expeditions,
            column_resolution: query.column_resolution,
        }
    }

    pub fn with_network_id(mut self, network_id: u32) -> Self {
        self.network_id = network_id;
        self
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn only_public(mut self, only_public: bool) -> Self {
        self.only_public = only_public;
        self
    }

    pub fn with_column_resolution(mut self, resolution: ColumnResolution) -> Self {
        self.column_resolution = resolution;
        self
    }

    /// The limit to apply: zero is rejected, anything above `max_limit` is clamped.
    pub fn effective_limit(&self) -> QueryResult<Option<u64>> {
        match self.limit {
            Some(0) => Err(QueryError::InvalidQuery("limit must be greater than 0".into())),
            Some(limit) if limit > self.max_limit => {
                debug!("clamping limit {} to {}", limit, self.max_limit);
                Ok(Some(self.max_limit))
            }
            other => Ok(other),
        }
    }
}

// ============================================================================
// Main API
// ============================================================================

/// Compile an expression tree against a project schema.
pub fn compile_query(
    project: &ProjectConfig,
    entity: &str,
    expr: &Expression,
    options: &CompileOptions,
) -> QueryResult<ParametrizedQuery> {
    let limit = options.effective_limit()?;
    QueryCompiler::new(project, options.network_id, entity)?
        .with_column_resolution(options.column_resolution)
        .with_pagination(options.page, limit)
        .compile(expr, options.only_public)
}

/// Compile from a schema document and an expression document, both JSON.
pub fn compile_documents(
    project_json: &str,
    entity: &str,
    expression_json: &str,
    options: &CompileOptions,
) -> CompileResult<ParametrizedQuery> {
    let project = ProjectConfig::from_json(project_json)?;
    let expr: Expression = serde_json::from_str(expression_json)?;
    Ok(compile_query(&project, entity, &expr, options)?)
}
