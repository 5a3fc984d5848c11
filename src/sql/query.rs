//! Query builder - assemble SELECT statements from token fragments.
//!
//! Predicates arrive already rendered as [`TokenStream`]s; this module only
//! arranges them into a statement and owns the bound parameter map.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression (column with alias)
// =============================================================================

/// A SELECT list item: expression with optional quoted alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: TokenStream,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: TokenStream) -> Self {
        Self { expr, alias: None }
    }

    /// `table.column`
    pub fn column(table: &str, column: &str) -> Self {
        let mut ts = TokenStream::new();
        ts.column(table, column);
        Self::new(ts)
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = self.expr.clone();
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::QuotedIdent(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Table Reference
// =============================================================================

/// A table reference with optional schema and alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: None,
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: TokenStream,
}

impl Join {
    pub fn new(join_type: JoinType, table: TableRef, on: TokenStream) -> Self {
        Self {
            join_type,
            table,
            on,
        }
    }

    /// Name the joined table is referenced by in the rest of the statement.
    pub fn reference_name(&self) -> &str {
        self.table.alias.as_deref().unwrap_or(&self.table.table)
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
        };

        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());
        ts.space().push(Token::On).space();
        ts.append(&self.on);
        ts
    }
}

// =============================================================================
// Query
// =============================================================================

/// A complete SELECT statement.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Query {
    select: Vec<SelectExpr>,
    from: Option<TableRef>,
    joins: Vec<Join>,
    filter: Option<TokenStream>,
    order_by: Vec<TokenStream>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, exprs: Vec<SelectExpr>) -> Self {
        self.select = exprs;
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn joins(mut self, joins: Vec<Join>) -> Self {
        self.joins = joins;
        self
    }

    /// Set the WHERE predicate. An empty stream leaves the query unfiltered.
    pub fn filter(mut self, condition: TokenStream) -> Self {
        self.filter = (!condition.is_empty()).then_some(condition);
        self
    }

    pub fn order_by(mut self, exprs: Vec<TokenStream>) -> Self {
        self.order_by = exprs;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Select).space();
        for (i, expr) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.append(&expr.to_tokens());
        }

        if let Some(from) = &self.from {
            ts.space().push(Token::From).space();
            ts.append(&from.to_tokens());
        }

        for join in &self.joins {
            ts.space().append(&join.to_tokens());
        }

        if let Some(filter) = &self.filter {
            ts.space().push(Token::Where).space();
            ts.append(filter);
        }

        if !self.order_by.is_empty() {
            ts.space().push(Token::OrderBy).space();
            for (i, expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(expr);
            }
        }

        if let Some(offset) = self.offset {
            ts.space().push(Token::Offset).space().push(Token::LitInt(offset));
        }
        if let Some(limit) = self.limit {
            ts.space().push(Token::Limit).space().push(Token::LitInt(limit));
        }

        ts
    }

    pub fn to_sql(&self) -> String {
        self.to_tokens().serialize()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Bound literal values, keyed `"1"`, `"2"`, ... in insertion order.
///
/// This is the only way a user-supplied value reaches a statement: `put`
/// records the literal and hands back the placeholder token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamStore {
    params: IndexMap<String, String>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a literal and return its placeholder.
    pub fn put(&mut self, value: impl Into<String>) -> Token {
        let key = self.params.len() + 1;
        self.params.insert(key.to_string(), value.into());
        Token::Param(key)
    }

    /// Bind several literals, returning their placeholders in order.
    pub fn put_all<I, S>(&mut self, values: I) -> Vec<Token>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values.into_iter().map(|v| self.put(v)).collect()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<String, String> {
        self.params
    }
}

// =============================================================================
// Output
// =============================================================================

/// Final compiler output: SQL text plus the literals its placeholders bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParametrizedQuery {
    sql: String,
    params: IndexMap<String, String>,
}

impl ParametrizedQuery {
    pub fn new(sql: String, params: ParamStore) -> Self {
        Self {
            sql,
            params: params.into_inner(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &IndexMap<String, String> {
        &self.params
    }

    pub fn into_parts(self) -> (String, IndexMap<String, String>) {
        (self.sql, self.params)
    }
}

impl fmt::Display for ParametrizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
