//! Tests for project schema loading, validation, and hierarchy queries.

#[path = "../common/mod.rs"]
mod common;

use fims_query::model::{Attribute, DataType, Entity, ProjectConfig, SchemaError};

fn aliases(entities: Vec<&Entity>) -> Vec<&str> {
    entities.iter().map(|e| e.concept_alias.as_str()).collect()
}

fn keyed(alias: &str) -> Entity {
    Entity::new(alias, "id").with_attribute(Attribute::new("id", &format!("urn:{}_id", alias)))
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_demo_project_loads() {
    let project = common::project();

    let names: Vec<_> = project
        .entities()
        .iter()
        .map(|e| e.concept_alias.as_str())
        .collect();
    assert_eq!(names, vec!["Event", "Sample", "Tissue", "Site"]);

    let sample = project.entity("Sample").unwrap();
    assert_eq!(sample.parent_entity.as_deref(), Some("Event"));
    assert_eq!(sample.attribute("weight").unwrap().data_type, DataType::Float);
    assert_eq!(project.expedition_metadata_properties().len(), 2);
}

#[test]
fn test_serialize_round_trip_keeps_hierarchy() {
    let project = common::project();
    let json = serde_json::to_string(&project).unwrap();
    let reloaded: ProjectConfig = serde_json::from_str(&json).unwrap();

    assert!(reloaded.is_descendant("Tissue", "Event"));
    assert_eq!(reloaded.entities().len(), project.entities().len());
}

#[test]
fn test_malformed_json_is_parse_error() {
    let err = ProjectConfig::from_json("{\"entities\": 3}").unwrap_err();
    assert!(matches!(err, SchemaError::ParseError(_)));
}

// ============================================================================
// Hierarchy
// ============================================================================

#[test]
fn test_descendants_and_relations() {
    let project = common::project();

    assert!(project.is_descendant("Sample", "Event"));
    assert!(project.is_descendant("Tissue", "Event"));
    assert!(!project.is_descendant("Event", "Sample"));
    assert!(!project.is_descendant("Event", "Event"));

    assert!(project.are_related("Event", "Tissue"));
    assert!(project.are_related("Tissue", "Event"));
    assert!(!project.are_related("Site", "Event"));
    assert!(!project.are_related("Event", "Unknown"));
}

#[test]
fn test_sibling_branches_share_an_ancestor() {
    let project = ProjectConfig::new(
        vec![
            keyed("Event"),
            keyed("Sample").with_parent("Event"),
            keyed("Tissue").with_parent("Sample"),
            keyed("Photo").with_parent("Event"),
            keyed("Site"),
        ],
        vec![],
    )
    .unwrap();

    let alias = |e: Option<&Entity>| e.map(|e| e.concept_alias.clone());
    assert_eq!(alias(project.common_ancestor("Tissue", "Photo")), Some("Event".into()));
    assert_eq!(alias(project.common_ancestor("Tissue", "Sample")), Some("Sample".into()));
    assert_eq!(alias(project.common_ancestor("Event", "Tissue")), Some("Event".into()));
    assert_eq!(alias(project.common_ancestor("Photo", "Site")), None);

    assert!(project.are_related("Sample", "Photo"));
    assert!(project.are_related("Photo", "Tissue"));
    assert!(!project.are_related("Photo", "Photo"));
    assert!(!project.are_related("Photo", "Site"));
}

#[test]
fn test_path_between_ancestor_and_descendant() {
    let project = common::project();

    assert_eq!(
        aliases(project.path_between("Event", "Tissue").unwrap()),
        vec!["Event", "Sample", "Tissue"]
    );
    assert_eq!(
        aliases(project.path_between("Sample", "Tissue").unwrap()),
        vec!["Sample", "Tissue"]
    );
    assert!(project.path_between("Site", "Tissue").is_none());
}

#[test]
fn test_parent_entities_nearest_first() {
    let project = common::project();

    assert_eq!(aliases(project.parent_entities("Tissue")), vec!["Sample", "Event"]);
    assert!(project.parent_entities("Event").is_empty());
    assert_eq!(project.depth("Tissue"), 2);
    assert_eq!(project.depth("Site"), 0);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_duplicate_entity_rejected() {
    let err = ProjectConfig::new(vec![keyed("Event"), keyed("Event")], vec![]).unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateEntity(a) if a == "Event"));
}

#[test]
fn test_unknown_parent_rejected() {
    let err = ProjectConfig::new(vec![keyed("Sample").with_parent("Event")], vec![]).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::UnknownParent { entity, parent } if entity == "Sample" && parent == "Event"
    ));
}

#[test]
fn test_cycle_rejected() {
    let err = ProjectConfig::new(
        vec![
            keyed("A").with_parent("C"),
            keyed("B").with_parent("A"),
            keyed("C").with_parent("B"),
        ],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::CyclicHierarchy(_)));
}

#[test]
fn test_unsafe_and_reserved_aliases_rejected() {
    let err = ProjectConfig::new(vec![keyed("Event; DROP")], vec![]).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidConceptAlias(_)));

    for reserved in ["expeditions", "entity_identifiers", "Expedition"] {
        let err = ProjectConfig::new(vec![keyed(reserved)], vec![]).unwrap_err();
        assert!(
            matches!(err, SchemaError::ReservedConceptAlias(_)),
            "{} should be reserved",
            reserved
        );
    }
}

#[test]
fn test_attribute_uniqueness() {
    let dup_uri = keyed("Event").with_attribute(Attribute::new("other", "urn:Event_id"));
    assert!(matches!(
        ProjectConfig::new(vec![dup_uri], vec![]).unwrap_err(),
        SchemaError::DuplicateUri { .. }
    ));

    let dup_column = keyed("Event").with_attribute(Attribute::new("id", "urn:other"));
    assert!(matches!(
        ProjectConfig::new(vec![dup_column], vec![]).unwrap_err(),
        SchemaError::DuplicateColumn { .. }
    ));
}

#[test]
fn test_unique_key_must_be_attribute() {
    let entity = Entity::new("Event", "eventId").with_attribute(Attribute::new("name", "urn:name"));
    assert!(matches!(
        ProjectConfig::new(vec![entity], vec![]).unwrap_err(),
        SchemaError::UnknownUniqueKey { .. }
    ));
}
