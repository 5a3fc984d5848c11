//! Join path resolution over the entity hierarchy.
//!
//! Every registered entity is reached from the root by climbing to the
//! nearest ancestor the two share and descending into the entity's branch.
//! Intermediate entities are joined even if nobody asked for them, and each
//! entity is joined at most once.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::{debug, trace};

use crate::model::{Entity, ProjectConfig};
use crate::planner::resolver::EXPEDITIONS_TABLE;
use crate::planner::{QueryError, QueryResult};
use crate::sql::query::{Join, JoinType, TableRef};
use crate::sql::token::{Token, TokenStream};

const ENTITY_IDENTIFIERS_TABLE: &str = "entity_identifiers";

/// Alias of the `entity_identifiers` join for an entity.
pub fn entity_identifiers_alias(concept_alias: &str) -> String {
    format!("{}_{}", concept_alias, ENTITY_IDENTIFIERS_TABLE)
}

/// Schema holding a network's entity tables.
pub fn network_schema(network_id: u32) -> String {
    format!("network_{}", network_id)
}

pub struct JoinGraphBuilder<'a> {
    project: &'a ProjectConfig,
    root: &'a Entity,
    network_id: u32,
    entities: BTreeMap<&'a str, &'a Entity>,
    select: BTreeSet<&'a str>,
    expeditions: bool,
}

impl<'a> JoinGraphBuilder<'a> {
    pub fn new(project: &'a ProjectConfig, root: &'a Entity, network_id: u32) -> Self {
        Self {
            project,
            root,
            network_id,
            entities: BTreeMap::new(),
            select: BTreeSet::new(),
            expeditions: false,
        }
    }

    /// Register an entity that must be reachable from the root.
    pub fn add(&mut self, entity: &'a Entity) {
        if entity.concept_alias == self.root.concept_alias {
            return;
        }
        self.entities.insert(&entity.concept_alias, entity);
    }

    /// Register an entity whose rows are projected into the output.
    pub fn add_select(&mut self, entity: &'a Entity) {
        if entity.concept_alias == self.root.concept_alias {
            return;
        }
        self.add(entity);
        self.select.insert(&entity.concept_alias);
    }

    pub fn join_expeditions(&mut self) {
        self.expeditions = true;
    }

    /// Select-projected entities, ancestors first.
    pub fn select_entities(&self) -> Vec<&'a Entity> {
        let mut selected: Vec<&'a Entity> = self
            .select
            .iter()
            .filter_map(|alias| self.entities.get(alias).copied())
            .collect();
        self.sort_by_hierarchy(&mut selected);
        selected
    }

    /// Compute the JOIN clauses for everything registered so far.
    pub fn build_joins(&self) -> QueryResult<Vec<Join>> {
        let root = self.root;
        let mut joined: HashSet<&str> = HashSet::from([root.concept_alias.as_str()]);
        let mut joins = Vec::new();

        let mut entities: Vec<&'a Entity> = self.entities.values().copied().collect();
        self.sort_by_hierarchy(&mut entities);

        for entity in entities {
            let alias = entity.concept_alias.as_str();
            let meeting = self
                .project
                .common_ancestor(&root.concept_alias, alias)
                .ok_or_else(|| QueryError::UnrelatedEntities {
                    entity: alias.to_string(),
                    root: root.concept_alias.clone(),
                })?;

            // Up from the root to the shared ancestor
            if meeting.concept_alias != root.concept_alias {
                let path = self.path(&meeting.concept_alias, &root.concept_alias)?;
                for hop in path.windows(2).rev() {
                    let (parent, child) = (hop[0], hop[1]);
                    if !joined.insert(parent.concept_alias.as_str()) {
                        continue;
                    }
                    joins.push(self.entity_join(JoinType::Inner, parent, child, parent));
                }
            }

            // Then down into the entity's branch
            if meeting.concept_alias != alias {
                let path = self.path(&meeting.concept_alias, alias)?;
                for hop in path.windows(2) {
                    let (parent, child) = (hop[0], hop[1]);
                    if !joined.insert(child.concept_alias.as_str()) {
                        continue;
                    }
                    let join_type = if self.select.contains(child.concept_alias.as_str()) {
                        JoinType::Left
                    } else {
                        JoinType::Inner
                    };
                    joins.push(self.entity_join(join_type, child, child, parent));
                }
            }
        }

        joins.push(entity_identifiers_join(root));
        for entity in self.select_entities() {
            joins.push(entity_identifiers_join(entity));
        }

        if self.expeditions {
            let mut on = TokenStream::new();
            on.column(EXPEDITIONS_TABLE, "id")
                .space()
                .push(Token::Eq)
                .space()
                .column(&root.concept_alias, "expedition_id");
            joins.push(Join::new(JoinType::Inner, TableRef::new(EXPEDITIONS_TABLE), on));
        }

        for join in &joins {
            trace!("join {:?} {}", join.join_type, join.reference_name());
        }
        debug!(
            "built {} joins from root '{}'",
            joins.len(),
            root.concept_alias
        );

        Ok(joins)
    }

    /// Render the JOIN clauses as SQL text.
    pub fn build(&self) -> QueryResult<String> {
        let joins = self.build_joins()?;
        let parts: Vec<TokenStream> = joins.iter().map(Join::to_tokens).collect();
        Ok(TokenStream::joined_by_space(&parts).serialize())
    }

    fn path(&self, ancestor: &str, descendant: &str) -> QueryResult<Vec<&'a Entity>> {
        self.project
            .path_between(ancestor, descendant)
            .ok_or_else(|| QueryError::UnrelatedEntities {
                entity: descendant.to_string(),
                root: ancestor.to_string(),
            })
    }

    fn sort_by_hierarchy(&self, entities: &mut [&'a Entity]) {
        entities.sort_by(|a, b| {
            let depth_a = self.project.depth(&a.concept_alias);
            let depth_b = self.project.depth(&b.concept_alias);
            depth_a
                .cmp(&depth_b)
                .then_with(|| a.concept_alias.cmp(&b.concept_alias))
        });
    }

    /// `JOIN <table> ON child.parent_identifier = parent.local_identifier AND same expedition`
    fn entity_join(&self, join_type: JoinType, table: &Entity, child: &Entity, parent: &Entity) -> Join {
        let table_ref = TableRef::new(&table.concept_alias)
            .with_schema(&network_schema(self.network_id))
            .with_alias(&table.concept_alias);

        let mut on = TokenStream::new();
        on.column(&child.concept_alias, "parent_identifier")
            .space()
            .push(Token::Eq)
            .space()
            .column(&parent.concept_alias, "local_identifier")
            .space()
            .push(Token::And)
            .space()
            .column(&child.concept_alias, "expedition_id")
            .space()
            .push(Token::Eq)
            .space()
            .column(&parent.concept_alias, "expedition_id");

        Join::new(join_type, table_ref, on)
    }
}

/// `LEFT JOIN entity_identifiers AS X_entity_identifiers ON ...`
fn entity_identifiers_join(entity: &Entity) -> Join {
    let alias = entity_identifiers_alias(&entity.concept_alias);

    let mut on = TokenStream::new();
    on.column(&alias, "expedition_id")
        .space()
        .push(Token::Eq)
        .space()
        .column(&entity.concept_alias, "expedition_id")
        .space()
        .push(Token::And)
        .space()
        .column(&alias, "concept_alias")
        .space()
        .push(Token::Eq)
        .space()
        .push(Token::LitString(entity.concept_alias.clone()));

    Join::new(
        JoinType::Left,
        TableRef::new(ENTITY_IDENTIFIERS_TABLE).with_alias(&alias),
        on,
    )
}
