//! Column resolution: raw column tokens → concrete bindings.
//!
//! A token is either bare (`country`) or qualified (`Sample.country`,
//! `expedition.permitGuid`). Bare tokens are looked up across the schema
//! according to a [`ColumnResolution`] policy.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::model::{DataType, Entity, ProjectConfig};
use crate::planner::{QueryError, QueryResult};
use crate::sql::token::{Token, TokenStream};

/// Column prefix addressing the expedition metadata blob.
const EXPEDITION_PREFIX: &str = "expedition";

pub(crate) const EXPEDITIONS_TABLE: &str = "expeditions";

/// How a bare column name matching several entities is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnResolution {
    /// First entity in declaration order wins.
    #[default]
    DeclarationOrder,
    /// The query's root entity wins, then declaration order.
    PreferRoot,
    /// Several matches is an error.
    Strict,
}

/// Where a resolved column lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource<'a> {
    Entity(&'a Entity),
    /// `expeditions.metadata`
    Expedition,
}

/// A column token bound to a table and property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReference<'a> {
    pub source: ColumnSource<'a>,
    /// Property URI, or the metadata key for expedition columns.
    pub property: String,
    pub data_type: DataType,
    pub is_local_identifier: bool,
    pub is_parent_identifier: bool,
}

impl<'a> ColumnReference<'a> {
    fn entity_column(project: &ProjectConfig, entity: &'a Entity, column: &str) -> Option<Self> {
        let attribute = entity.attribute(column)?;
        let is_local_identifier = entity.unique_key_uri() == Some(attribute.uri.as_str());
        let is_parent_identifier = project
            .parent(entity)
            .is_some_and(|parent| parent.unique_key == column);

        Some(Self {
            source: ColumnSource::Entity(entity),
            property: attribute.uri.clone(),
            data_type: attribute.data_type,
            is_local_identifier,
            is_parent_identifier,
        })
    }

    fn expedition_column(project: &ProjectConfig, property: &str) -> Self {
        let data_type = project
            .expedition_metadata_property(property)
            .map(|p| p.data_type)
            .unwrap_or_default();

        Self {
            source: ColumnSource::Expedition,
            property: property.to_string(),
            data_type,
            is_local_identifier: false,
            is_parent_identifier: false,
        }
    }

    /// The owning entity; `None` for expedition metadata.
    pub fn entity(&self) -> Option<&'a Entity> {
        match self.source {
            ColumnSource::Entity(entity) => Some(entity),
            ColumnSource::Expedition => None,
        }
    }

    /// Table alias the column is read from.
    pub fn table(&self) -> &str {
        match self.source {
            ColumnSource::Entity(entity) => &entity.concept_alias,
            ColumnSource::Expedition => EXPEDITIONS_TABLE,
        }
    }

    /// JSON column holding the property.
    pub fn data_column(&self) -> &'static str {
        match self.source {
            ColumnSource::Entity(_) => "data",
            ColumnSource::Expedition => "metadata",
        }
    }

    /// Identifier columns are stored as real columns, not in the JSON blob.
    pub fn is_identifier(&self) -> bool {
        self.is_local_identifier || self.is_parent_identifier
    }

    /// Physical access expression, e.g. `Sample.data->>'urn:weight'`.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        if self.is_local_identifier {
            ts.column(self.table(), "local_identifier");
        } else if self.is_parent_identifier {
            ts.column(self.table(), "parent_identifier");
        } else {
            ts.column(self.table(), self.data_column())
                .push(Token::JsonText)
                .push(Token::LitString(self.property.clone()));
        }
        ts
    }
}

/// Resolves column tokens against a project schema for one root entity.
pub struct ColumnResolver<'a> {
    project: &'a ProjectConfig,
    root: &'a Entity,
    policy: ColumnResolution,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(project: &'a ProjectConfig, root: &'a Entity) -> Self {
        Self {
            project,
            root,
            policy: ColumnResolution::default(),
        }
    }

    pub fn with_policy(mut self, policy: ColumnResolution) -> Self {
        self.policy = policy;
        self
    }

    pub fn resolve(&self, token: &str) -> QueryResult<ColumnReference<'a>> {
        match token.split_once('.') {
            Some((prefix, column)) => self.resolve_qualified(token, prefix, column),
            None => self.resolve_bare(token),
        }
    }

    fn resolve_qualified(
        &self,
        token: &str,
        prefix: &str,
        column: &str,
    ) -> QueryResult<ColumnReference<'a>> {
        if prefix.eq_ignore_ascii_case(EXPEDITION_PREFIX) {
            if column.is_empty() {
                return Err(QueryError::UnknownColumn(token.to_string()));
            }
            return Ok(ColumnReference::expedition_column(self.project, column));
        }

        let entity = self
            .project
            .entity(prefix)
            .ok_or_else(|| QueryError::UnknownEntity(token.to_string()))?;

        ColumnReference::entity_column(self.project, entity, column)
            .ok_or_else(|| QueryError::UnknownColumn(token.to_string()))
    }

    fn resolve_bare(&self, token: &str) -> QueryResult<ColumnReference<'a>> {
        let project = self.project;
        let matches: Vec<&'a Entity> = project
            .entities()
            .iter()
            .filter(|e| e.attribute(token).is_some())
            .collect();

        let entity = match (matches.as_slice(), self.policy) {
            ([], _) => return Err(QueryError::UnknownColumn(token.to_string())),
            ([only], _) => *only,
            (_, ColumnResolution::Strict) => {
                return Err(QueryError::AmbiguousColumn {
                    column: token.to_string(),
                    entities: matches.iter().map(|e| e.concept_alias.clone()).collect(),
                })
            }
            (_, ColumnResolution::PreferRoot) => matches
                .iter()
                .copied()
                .find(|e| e.concept_alias == self.root.concept_alias)
                .unwrap_or(matches[0]),
            (_, ColumnResolution::DeclarationOrder) => {
                warn!(
                    "column '{}' matches {} entities, resolving to '{}'",
                    token,
                    matches.len(),
                    matches[0].concept_alias
                );
                matches[0]
            }
        };

        ColumnReference::entity_column(project, entity, token)
            .ok_or_else(|| QueryError::UnknownColumn(token.to_string()))
    }
}
