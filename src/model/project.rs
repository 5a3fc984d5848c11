//! Project schema: the ordered entity list plus the parent/child hierarchy.
//!
//! The hierarchy is kept as a petgraph `DiGraph` with edges running
//! parent → child. Construction rejects unknown parents and cycles, so every
//! entity has at most one parent and the graph is a forest. Relation queries
//! (`is_descendant`, `common_ancestor`, `are_related`, `path_between`) rely
//! on that shape.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::types::DataType;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Aliases that collide with side tables or the `expedition.` column prefix.
const RESERVED_ALIASES: &[&str] = &["expeditions", "entity_identifiers", "expedition"];

/// Errors raised while building a project schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("Invalid concept alias '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidConceptAlias(String),

    #[error("Concept alias '{0}' is reserved")]
    ReservedConceptAlias(String),

    #[error("Entity '{entity}' references unknown parent '{parent}'")]
    UnknownParent { entity: String, parent: String },

    #[error("Entity hierarchy contains a cycle through '{0}'")]
    CyclicHierarchy(String),

    #[error("Duplicate column '{column}' on entity '{entity}'")]
    DuplicateColumn { entity: String, column: String },

    #[error("Duplicate attribute uri '{uri}' on entity '{entity}'")]
    DuplicateUri { entity: String, uri: String },

    #[error("Unique key '{unique_key}' is not an attribute of entity '{entity}'")]
    UnknownUniqueKey { entity: String, unique_key: String },

    #[error("Failed to parse project config: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// A typed property stored in an expedition's `metadata` blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpeditionMetadataProperty {
    pub name: String,
    #[serde(default)]
    pub data_type: DataType,
}

impl ExpeditionMetadataProperty {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Wire shape of a project schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectConfigDef {
    entities: Vec<Entity>,
    #[serde(default)]
    expedition_metadata_properties: Vec<ExpeditionMetadataProperty>,
}

/// The schema for one project. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ProjectConfigDef", into = "ProjectConfigDef")]
pub struct ProjectConfig {
    /// Entities in declaration order.
    entities: Vec<Entity>,
    expedition_metadata: Vec<ExpeditionMetadataProperty>,
    /// Node weight is the entity's position in `entities`.
    hierarchy: DiGraph<usize, ()>,
    index: HashMap<String, NodeIndex>,
}

impl ProjectConfig {
    pub fn new(
        entities: Vec<Entity>,
        expedition_metadata: Vec<ExpeditionMetadataProperty>,
    ) -> Result<Self, SchemaError> {
        let mut hierarchy = DiGraph::new();
        let mut index = HashMap::new();

        for (position, entity) in entities.iter().enumerate() {
            validate_entity(entity)?;
            let node = hierarchy.add_node(position);
            if index.insert(entity.concept_alias.clone(), node).is_some() {
                return Err(SchemaError::DuplicateEntity(entity.concept_alias.clone()));
            }
        }

        for entity in &entities {
            let Some(parent) = &entity.parent_entity else {
                continue;
            };
            let parent_idx = index.get(parent).ok_or_else(|| SchemaError::UnknownParent {
                entity: entity.concept_alias.clone(),
                parent: parent.clone(),
            })?;
            hierarchy.add_edge(*parent_idx, index[&entity.concept_alias], ());
        }

        if let Err(cycle) = toposort(&hierarchy, None) {
            let alias = entities[hierarchy[cycle.node_id()]].concept_alias.clone();
            return Err(SchemaError::CyclicHierarchy(alias));
        }

        Ok(Self {
            entities,
            expedition_metadata,
            hierarchy,
            index,
        })
    }

    /// Parse and validate a JSON schema document.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let def: ProjectConfigDef = serde_json::from_str(json)?;
        Self::try_from(def)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, concept_alias: &str) -> Option<&Entity> {
        self.index
            .get(concept_alias)
            .map(|idx| &self.entities[self.hierarchy[*idx]])
    }

    pub fn expedition_metadata_properties(&self) -> &[ExpeditionMetadataProperty] {
        &self.expedition_metadata
    }

    /// Case-insensitive lookup of an expedition metadata property.
    pub fn expedition_metadata_property(&self, name: &str) -> Option<&ExpeditionMetadataProperty> {
        self.expedition_metadata
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn parent(&self, entity: &Entity) -> Option<&Entity> {
        entity
            .parent_entity
            .as_deref()
            .and_then(|parent| self.entity(parent))
    }

    /// Ancestors of an entity, nearest first.
    pub fn parent_entities(&self, concept_alias: &str) -> Vec<&Entity> {
        let mut parents = Vec::new();
        let mut current = self.entity(concept_alias);
        while let Some(parent) = current.and_then(|e| self.parent(e)) {
            parents.push(parent);
            current = Some(parent);
        }
        parents
    }

    /// Number of ancestors; top-level entities have depth 0.
    pub fn depth(&self, concept_alias: &str) -> usize {
        self.parent_entities(concept_alias).len()
    }

    /// True if `entity` sits strictly below `ancestor` in the hierarchy.
    pub fn is_descendant(&self, entity: &str, ancestor: &str) -> bool {
        if entity == ancestor {
            return false;
        }
        match (self.index.get(ancestor), self.index.get(entity)) {
            (Some(from), Some(to)) => has_path_connecting(&self.hierarchy, *from, *to, None),
            _ => false,
        }
    }

    /// Nearest entity that is `a` or one of its ancestors and also `b` or one
    /// of its ancestors. `None` when the two sit in separate trees.
    pub fn common_ancestor(&self, a: &str, b: &str) -> Option<&Entity> {
        let a = self.entity(a)?;
        let b = self.entity(b)?;

        let lineage_a: HashSet<&str> = std::iter::once(a)
            .chain(self.parent_entities(&a.concept_alias))
            .map(|e| e.concept_alias.as_str())
            .collect();

        std::iter::once(b)
            .chain(self.parent_entities(&b.concept_alias))
            .find(|e| lineage_a.contains(e.concept_alias.as_str()))
    }

    /// True if two distinct entities share an ancestor, which includes one
    /// being the ancestor of the other.
    pub fn are_related(&self, a: &str, b: &str) -> bool {
        a != b && self.common_ancestor(a, b).is_some()
    }

    /// Entities on the path from `ancestor` down to `descendant`, both inclusive.
    ///
    /// Returns `None` unless `descendant` is strictly below `ancestor`.
    pub fn path_between(&self, ancestor: &str, descendant: &str) -> Option<Vec<&Entity>> {
        let start = *self.index.get(ancestor)?;
        let mut current = *self.index.get(descendant)?;
        if start == current {
            return None;
        }

        let mut path = vec![current];
        while current != start {
            current = self
                .hierarchy
                .neighbors_directed(current, Direction::Incoming)
                .next()?;
            path.push(current);
        }
        path.reverse();

        Some(
            path.into_iter()
                .map(|idx| &self.entities[self.hierarchy[idx]])
                .collect(),
        )
    }
}

impl TryFrom<ProjectConfigDef> for ProjectConfig {
    type Error = SchemaError;

    fn try_from(def: ProjectConfigDef) -> Result<Self, Self::Error> {
        ProjectConfig::new(def.entities, def.expedition_metadata_properties)
    }
}

impl From<ProjectConfig> for ProjectConfigDef {
    fn from(config: ProjectConfig) -> Self {
        Self {
            entities: config.entities,
            expedition_metadata_properties: config.expedition_metadata,
        }
    }
}

fn validate_entity(entity: &Entity) -> Result<(), SchemaError> {
    let alias = &entity.concept_alias;
    if !IDENTIFIER.is_match(alias) {
        return Err(SchemaError::InvalidConceptAlias(alias.clone()));
    }
    if RESERVED_ALIASES.iter().any(|r| r.eq_ignore_ascii_case(alias)) {
        return Err(SchemaError::ReservedConceptAlias(alias.clone()));
    }
    if entity.parent_entity.as_deref() == Some(alias.as_str()) {
        return Err(SchemaError::CyclicHierarchy(alias.clone()));
    }

    let mut columns = HashSet::new();
    let mut uris = HashSet::new();
    for attribute in &entity.attributes {
        if !columns.insert(attribute.column.as_str()) {
            return Err(SchemaError::DuplicateColumn {
                entity: alias.clone(),
                column: attribute.column.clone(),
            });
        }
        if !uris.insert(attribute.uri.as_str()) {
            return Err(SchemaError::DuplicateUri {
                entity: alias.clone(),
                uri: attribute.uri.clone(),
            });
        }
    }

    if entity.attribute(&entity.unique_key).is_none() {
        return Err(SchemaError::UnknownUniqueKey {
            entity: alias.clone(),
            unique_key: entity.unique_key.clone(),
        });
    }

    Ok(())
}
