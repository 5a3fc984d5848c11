//! Expression tree → parameterized SELECT.
//!
//! Each node compiles to a returned [`TokenStream`] fragment. Literals go to
//! the compiler's [`ParamStore`] and entity references to its
//! [`JoinGraphBuilder`]; the final statement is assembled once by
//! [`QueryCompiler::parameterized_query`], which consumes the compiler.
//!
//! Empty fragments are meaningful: `All` and a bare `Select` contribute
//! nothing to the WHERE clause, and logical operators pass the other side
//! through unchanged.

use indexmap::IndexMap;
use log::debug;

use crate::dsl::ast::{ComparisonOperator, Expression, LogicalOperator};
use crate::dsl::range::ParsedRange;
use crate::model::{Entity, ProjectConfig};
use crate::planner::join_builder::{entity_identifiers_alias, network_schema, JoinGraphBuilder};
use crate::planner::resolver::{
    ColumnReference, ColumnResolution, ColumnResolver, ColumnSource, EXPEDITIONS_TABLE,
};
use crate::planner::{QueryError, QueryResult};
use crate::sql::query::{ParamStore, ParametrizedQuery, Query, SelectExpr, TableRef};
use crate::sql::token::{Token, TokenStream};

pub struct QueryCompiler<'a> {
    project: &'a ProjectConfig,
    root: &'a Entity,
    network_id: u32,
    resolution: ColumnResolution,
    joins: JoinGraphBuilder<'a>,
    params: ParamStore,
    where_clause: TokenStream,
    all_query: bool,
    page: Option<u64>,
    limit: Option<u64>,
}

impl<'a> QueryCompiler<'a> {
    /// Create a compiler for queries rooted at `root_alias`.
    pub fn new(project: &'a ProjectConfig, network_id: u32, root_alias: &str) -> QueryResult<Self> {
        let root = project
            .entity(root_alias)
            .ok_or_else(|| QueryError::UnknownEntity(root_alias.to_string()))?;

        Ok(Self {
            project,
            root,
            network_id,
            resolution: ColumnResolution::default(),
            joins: JoinGraphBuilder::new(project, root, network_id),
            params: ParamStore::new(),
            where_clause: TokenStream::new(),
            all_query: false,
            page: None,
            limit: None,
        })
    }

    pub fn with_pagination(mut self, page: Option<u64>, limit: Option<u64>) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    pub fn with_column_resolution(mut self, resolution: ColumnResolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn root(&self) -> &'a Entity {
        self.root
    }

    /// Compile `expr` into the WHERE clause. Repeated visits are ANDed.
    pub fn visit(&mut self, expr: &Expression) -> QueryResult<()> {
        let fragment = self.compile_expr(expr)?;
        if fragment.is_empty() {
            return Ok(());
        }
        if !self.where_clause.is_empty() {
            self.where_clause.space().push(Token::And).space();
        }
        self.where_clause.append(&fragment);
        Ok(())
    }

    /// Visit `expr` and assemble the statement in one step.
    pub fn compile(mut self, expr: &Expression, only_public: bool) -> QueryResult<ParametrizedQuery> {
        self.visit(expr)?;
        self.parameterized_query(only_public)
    }

    /// Assemble the final statement.
    pub fn parameterized_query(mut self, only_public: bool) -> QueryResult<ParametrizedQuery> {
        let has_predicate = !self.where_clause.is_empty();
        if !has_predicate && !self.all_query {
            return Err(QueryError::InvalidQuery("query must not be empty".into()));
        }
        if has_predicate && self.all_query {
            return Err(QueryError::InvalidQuery(
                "an all query cannot be combined with other predicates".into(),
            ));
        }
        if self.limit == Some(0) {
            return Err(QueryError::InvalidQuery("limit must be greater than 0".into()));
        }

        let mut filter = self.where_clause.clone();
        if only_public {
            let mut public = TokenStream::new();
            public
                .column(EXPEDITIONS_TABLE, "public")
                .space()
                .push(Token::Eq)
                .space()
                .push(Token::True);
            filter = if filter.is_empty() {
                public
            } else {
                let mut ts = filter.parenthesized();
                ts.space().push(Token::And).space().append(&public);
                ts
            };
        }

        // The projection always reads expedition columns.
        self.joins.join_expeditions();

        let root_entity = self.root;
        let root = &root_entity.concept_alias;
        let mut select = entity_projection(root_entity);
        select.push(SelectExpr::column(EXPEDITIONS_TABLE, "expedition_code").with_alias("expeditionCode"));
        select.push(SelectExpr::column(EXPEDITIONS_TABLE, "project_id").with_alias("projectId"));
        for entity in self.joins.select_entities() {
            select.extend(entity_projection(entity));
        }

        let mut order_local = TokenStream::new();
        order_local.column(root, "local_identifier");
        let mut order_expedition = TokenStream::new();
        order_expedition.column(root, "expedition_id");

        let mut query = Query::new()
            .select(select)
            .from(
                TableRef::new(root)
                    .with_schema(&network_schema(self.network_id))
                    .with_alias(root),
            )
            .joins(self.joins.build_joins()?)
            .filter(filter)
            .order_by(vec![order_local, order_expedition]);

        if let Some(limit) = self.limit {
            let offset = self
                .page
                .unwrap_or(0)
                .checked_mul(limit)
                .ok_or_else(|| QueryError::InvalidQuery("page out of range".into()))?;
            query = query.offset(offset).limit(limit);
        }

        debug!(
            "compiled query on '{}' with {} parameters",
            root,
            self.params.len()
        );

        Ok(ParametrizedQuery::new(query.to_sql(), self.params))
    }

    fn compile_expr(&mut self, expr: &Expression) -> QueryResult<TokenStream> {
        match expr {
            Expression::Comparison {
                column,
                operator,
                term,
            } => {
                let column = self.resolve(column)?;
                Ok(self.comparison(&column, *operator, term))
            }

            Expression::Range { column, range } => {
                let column = self.resolve(column)?;
                let range = ParsedRange::parse(range)?;
                let parts: Vec<TokenStream> = range
                    .bounds()
                    .map(|bound| self.comparison(&column, bound.operator, &bound.value))
                    .collect();
                if parts.len() == 1 {
                    Ok(parts.into_iter().next().unwrap_or_default())
                } else {
                    Ok(TokenStream::joined(&parts, Token::And).parenthesized())
                }
            }

            Expression::Like { column, term } => {
                let column = self.resolve(column)?;
                let mut ts = column.to_tokens();
                ts.space()
                    .push(Token::ILike)
                    .space()
                    .push(self.params.put(term.as_str()));
                Ok(ts)
            }

            Expression::FullTextSearch { column, term } => self.full_text_search(column.as_deref(), term),

            Expression::Exists { columns } => self.exists(columns),

            Expression::Not { expression } => {
                let inner = self.compile_expr(expression)?;
                if inner.is_empty() {
                    return Err(QueryError::InvalidQuery(
                        "not requires a predicate to negate".into(),
                    ));
                }
                let mut ts = TokenStream::new();
                ts.push(Token::Not).space().append(&inner);
                Ok(ts)
            }

            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.compile_expr(left)?;
                let right = self.compile_expr(right)?;
                let keyword = match operator {
                    LogicalOperator::And => Token::And,
                    LogicalOperator::Or => Token::Or,
                };
                Ok(match (left.is_empty(), right.is_empty()) {
                    (true, _) => right,
                    (_, true) => left,
                    _ => TokenStream::joined(&[left, right], keyword),
                })
            }

            Expression::Group { expression } => {
                let inner = self.compile_expr(expression)?;
                if inner.is_empty() {
                    Ok(inner)
                } else {
                    Ok(inner.parenthesized())
                }
            }

            Expression::Expedition { expeditions } => {
                if expeditions.is_empty() {
                    return Err(QueryError::InvalidQuery(
                        "expedition filter requires at least one expedition code".into(),
                    ));
                }
                self.joins.join_expeditions();
                Ok(self.membership("expedition_code", expeditions.iter().cloned()))
            }

            Expression::Project { projects } => {
                if projects.is_empty() {
                    return Err(QueryError::InvalidQuery(
                        "project filter requires at least one project id".into(),
                    ));
                }
                self.joins.join_expeditions();
                Ok(self.membership("project_id", projects.iter().map(i64::to_string)))
            }

            Expression::Select {
                entities,
                expression,
            } => {
                for alias in entities {
                    let entity = self
                        .project
                        .entity(alias)
                        .ok_or_else(|| QueryError::UnknownEntity(alias.clone()))?;
                    self.joins.add_select(entity);
                }
                match expression {
                    Some(inner) => self.compile_expr(inner),
                    None => Ok(TokenStream::new()),
                }
            }

            Expression::All => {
                self.all_query = true;
                Ok(TokenStream::new())
            }

            Expression::Empty => Err(QueryError::InvalidQuery("query must not be empty".into())),
        }
    }

    /// Resolve a column token and register whatever it needs joined.
    fn resolve(&mut self, token: &str) -> QueryResult<ColumnReference<'a>> {
        let column = ColumnResolver::new(self.project, self.root)
            .with_policy(self.resolution)
            .resolve(token)?;
        match column.source {
            ColumnSource::Entity(entity) => self.joins.add(entity),
            ColumnSource::Expedition => self.joins.join_expeditions(),
        }
        Ok(column)
    }

    /// `col op :n`, with both sides cast for ordering operators on typed columns.
    fn comparison(
        &mut self,
        column: &ColumnReference<'_>,
        operator: ComparisonOperator,
        value: &str,
    ) -> TokenStream {
        let cast = if operator.is_ordering() {
            column
                .data_type
                .cast_function()
                .zip(column.data_type.sql_type())
        } else {
            None
        };

        let mut ts = TokenStream::new();
        match cast {
            Some((function, _)) => {
                ts.push(Token::FunctionName(function.into()))
                    .lparen()
                    .append(&column.to_tokens())
                    .rparen();
            }
            None => {
                ts.append(&column.to_tokens());
            }
        }

        ts.space()
            .push(operator_token(operator))
            .space()
            .push(self.params.put(value));

        if let Some((_, sql_type)) = cast {
            ts.push(Token::Cast).push(Token::TypeName(sql_type.into()));
        }
        ts
    }

    fn full_text_search(&mut self, column: Option<&str>, term: &str) -> QueryResult<TokenStream> {
        let words: Vec<&str> = term.split_whitespace().collect();
        if words.is_empty() {
            return Err(QueryError::InvalidQuery(
                "full text search requires a search term".into(),
            ));
        }
        let tsquery = words.join(" & ");

        let Some(token) = column else {
            let root = self.root;
            return Ok(self.tsv_match(&root.concept_alias, &tsquery));
        };

        let column = self.resolve(token)?;
        if column.source == ColumnSource::Expedition {
            return Err(QueryError::InvalidQuery(format!(
                "full text search is not supported on {}",
                token
            )));
        }

        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("to_tsvector".into()))
            .lparen()
            .append(&column.to_tokens())
            .rparen()
            .space()
            .push(Token::TsMatch)
            .space()
            .append(&self.tsquery(&tsquery));

        let tsv = self.tsv_match(column.table(), &tsquery);
        Ok(TokenStream::joined(&[ts, tsv], Token::And).parenthesized())
    }

    /// `T.tsv @@ to_tsquery(:n)`
    fn tsv_match(&mut self, table: &str, tsquery: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.column(table, "tsv")
            .space()
            .push(Token::TsMatch)
            .space()
            .append(&self.tsquery(tsquery));
        ts
    }

    fn tsquery(&mut self, tsquery: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("to_tsquery".into()))
            .lparen()
            .push(self.params.put(tsquery))
            .rparen();
        ts
    }

    fn exists(&mut self, columns: &[String]) -> QueryResult<TokenStream> {
        if columns.is_empty() {
            return Err(QueryError::InvalidQuery(
                "exists requires at least one column".into(),
            ));
        }

        // (table, data column) → properties, in first-seen order
        let mut groups: IndexMap<(String, &'static str), Vec<String>> = IndexMap::new();
        for token in columns {
            let column = self.resolve(token)?;
            if column.is_identifier() {
                continue;
            }
            let properties = groups
                .entry((column.table().to_string(), column.data_column()))
                .or_default();
            if !properties.contains(&column.property) {
                properties.push(column.property);
            }
        }

        if groups.is_empty() {
            let mut ts = TokenStream::new();
            ts.push(Token::True);
            return Ok(ts);
        }

        let mut parts = Vec::with_capacity(groups.len());
        for ((table, data_column), properties) in groups {
            let mut ts = TokenStream::new();
            ts.column(&table, data_column).space();
            if let [property] = properties.as_slice() {
                ts.push(Token::HasKey).space().push(self.params.put(property.as_str()));
            } else {
                let keys = self.params.put_all(properties.iter().map(String::as_str));
                ts.push(Token::HasAllKeys)
                    .space()
                    .push(Token::Array)
                    .push(Token::LBracket)
                    .append(&TokenStream::comma_list(keys))
                    .push(Token::RBracket);
            }
            parts.push(ts);
        }

        if parts.len() == 1 {
            Ok(parts.into_iter().next().unwrap_or_default())
        } else {
            Ok(TokenStream::joined(&parts, Token::And).parenthesized())
        }
    }

    /// `expeditions.<column> = :n` or `expeditions.<column> IN (:n, ...)`
    fn membership(&mut self, column: &str, values: impl Iterator<Item = String>) -> TokenStream {
        let keys = self.params.put_all(values);
        let mut ts = TokenStream::new();
        ts.column(EXPEDITIONS_TABLE, column).space();
        if let [key] = keys.as_slice() {
            ts.push(Token::Eq).space().push(key.clone());
        } else {
            ts.push(Token::In)
                .space()
                .append(&TokenStream::comma_list(keys.iter().cloned()).parenthesized());
        }
        ts
    }
}

fn operator_token(operator: ComparisonOperator) -> Token {
    match operator {
        ComparisonOperator::Equals => Token::Eq,
        ComparisonOperator::NotEquals => Token::Ne,
        ComparisonOperator::GreaterThan => Token::Gt,
        ComparisonOperator::GreaterThanOrEqual => Token::Gte,
        ComparisonOperator::LessThan => Token::Lt,
        ComparisonOperator::LessThanOrEqual => Token::Lte,
    }
}

/// `X.data AS "X_data", X_entity_identifiers.identifier AS "X_rootIdentifier"`
fn entity_projection(entity: &Entity) -> Vec<SelectExpr> {
    let alias = &entity.concept_alias;
    vec![
        SelectExpr::column(alias, "data").with_alias(&format!("{}_data", alias)),
        SelectExpr::column(&entity_identifiers_alias(alias), "identifier")
            .with_alias(&format!("{}_rootIdentifier", alias)),
    ]
}
