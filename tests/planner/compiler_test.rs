//! Tests for per-node WHERE clause compilation and statement assembly.

#[path = "../common/mod.rs"]
mod common;

use common::{param_values, where_clause};
use fims_query::dsl::Expression;
use fims_query::model::ProjectConfig;
use fims_query::planner::{ColumnResolution, QueryCompiler, QueryError};
use fims_query::sql::ParametrizedQuery;

use fims_query::dsl::ComparisonOperator::*;

fn compile_on(project: &ProjectConfig, root: &str, expr: &Expression) -> ParametrizedQuery {
    QueryCompiler::new(project, 1, root)
        .unwrap()
        .compile(expr, false)
        .unwrap_or_else(|e| panic!("{:?} should compile: {}", expr, e))
}

fn compile(root: &str, expr: &Expression) -> ParametrizedQuery {
    compile_on(&common::project(), root, expr)
}

fn compile_err(root: &str, expr: &Expression) -> QueryError {
    let project = common::project();
    QueryCompiler::new(&project, 1, root)
        .unwrap()
        .compile(expr, false)
        .unwrap_err()
}

// ============================================================================
// Comparison
// ============================================================================

#[test]
fn test_integer_ordering_is_cast() {
    let query = compile("Event", &Expression::comparison("year", GreaterThan, "10"));
    assert_eq!(
        where_clause(&query),
        "convert_to_int(Event.data->>'urn:year') > :1::int"
    );
    assert_eq!(param_values(&query), vec!["10"]);
}

#[test]
fn test_typed_casts() {
    let query = compile("Sample", &Expression::comparison("weight", GreaterThanOrEqual, "1.5"));
    assert_eq!(
        where_clause(&query),
        "convert_to_float(Sample.data->>'urn:weight') >= :1::float"
    );

    let query = compile("Event", &Expression::comparison("eventDate", LessThan, "2020-01-01"));
    assert_eq!(
        where_clause(&query),
        "convert_to_date(Event.data->>'urn:eventDate') < :1::date"
    );

    let query = compile("Sample", &Expression::comparison("preserved", LessThanOrEqual, "true"));
    assert_eq!(
        where_clause(&query),
        "convert_to_bool(Sample.data->>'urn:preserved') <= :1::boolean"
    );
}

#[test]
fn test_equality_compares_raw_text() {
    let query = compile("Event", &Expression::comparison("year", Equals, "2001"));
    assert_eq!(where_clause(&query), "Event.data->>'urn:year' = :1");

    let query = compile("Event", &Expression::comparison("country", NotEquals, "Peru"));
    assert_eq!(where_clause(&query), "Event.data->>'urn:country' != :1");
}

#[test]
fn test_string_ordering_is_not_cast() {
    let query = compile("Event", &Expression::comparison("locality", GreaterThan, "M"));
    assert_eq!(where_clause(&query), "Event.data->>'urn:locality' > :1");
}

#[test]
fn test_identifier_columns() {
    let query = compile("Sample", &Expression::comparison("materialSampleID", Equals, "S1"));
    assert_eq!(where_clause(&query), "Sample.local_identifier = :1");

    let query = compile("Sample", &Expression::comparison("Sample.eventId", Equals, "E1"));
    assert_eq!(where_clause(&query), "Sample.parent_identifier = :1");
}

// ============================================================================
// Range / Like / Full text
// ============================================================================

#[test]
fn test_range_with_two_bounds() {
    let query = compile("Event", &Expression::range("year", ">=0 and <=90"));
    assert_eq!(
        where_clause(&query),
        "(convert_to_int(Event.data->>'urn:year') >= :1::int AND \
         convert_to_int(Event.data->>'urn:year') <= :2::int)"
    );
    assert_eq!(param_values(&query), vec!["0", "90"]);
}

#[test]
fn test_bracket_range() {
    let query = compile("Event", &Expression::range("year", "[2000 TO 2010}"));
    assert_eq!(
        where_clause(&query),
        "(convert_to_int(Event.data->>'urn:year') >= :1::int AND \
         convert_to_int(Event.data->>'urn:year') < :2::int)"
    );
    assert_eq!(param_values(&query), vec!["2000", "2010"]);
}

#[test]
fn test_invalid_range() {
    let err = compile_err("Event", &Expression::range("year", "between 1 and 2"));
    assert!(matches!(err, QueryError::InvalidQuery(_)));
}

#[test]
fn test_like_keeps_caller_wildcards() {
    let query = compile("Event", &Expression::like("locality", "%creek_"));
    assert_eq!(where_clause(&query), "Event.data->>'urn:locality' ILIKE :1");
    assert_eq!(param_values(&query), vec!["%creek_"]);
}

#[test]
fn test_full_text_without_column() {
    let query = compile("Sample", &Expression::fts(None, "  tree   frog "));
    assert_eq!(where_clause(&query), "Sample.tsv @@ to_tsquery(:1)");
    assert_eq!(param_values(&query), vec!["tree & frog"]);
}

#[test]
fn test_full_text_with_column() {
    let query = compile("Sample", &Expression::fts(Some("locality"), "creek"));
    assert_eq!(
        where_clause(&query),
        "(to_tsvector(Event.data->>'urn:locality') @@ to_tsquery(:1) AND \
         Event.tsv @@ to_tsquery(:2))"
    );
    assert_eq!(param_values(&query), vec!["creek", "creek"]);
    assert!(query.sql().contains("INNER JOIN network_1.Event AS Event"));
}

#[test]
fn test_full_text_errors() {
    assert!(matches!(
        compile_err("Event", &Expression::fts(None, "   ")),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        compile_err("Event", &Expression::fts(Some("expedition.permitGuid"), "x")),
        QueryError::InvalidQuery(_)
    ));
}

// ============================================================================
// Exists
// ============================================================================

#[test]
fn test_exists_single_and_multiple() {
    let query = compile("Event", &Expression::exists(&["country"]));
    assert_eq!(where_clause(&query), "Event.data ? :1");
    assert_eq!(param_values(&query), vec!["urn:country"]);

    let query = compile("Event", &Expression::exists(&["country", "locality"]));
    assert_eq!(where_clause(&query), "Event.data ?& array[:1, :2]");
    assert_eq!(param_values(&query), vec!["urn:country", "urn:locality"]);
}

#[test]
fn test_exists_groups_by_entity() {
    let query = compile(
        "Sample",
        &Expression::exists(&["weight", "Event.locality", "preserved"]),
    );
    assert_eq!(
        where_clause(&query),
        "(Sample.data ?& array[:1, :2] AND Event.data ? :3)"
    );
    assert_eq!(
        param_values(&query),
        vec!["urn:weight", "urn:preserved", "urn:locality"]
    );
}

#[test]
fn test_exists_skips_identifiers() {
    let query = compile("Sample", &Expression::exists(&["materialSampleID", "weight"]));
    assert_eq!(where_clause(&query), "Sample.data ? :1");

    let query = compile("Sample", &Expression::exists(&["materialSampleID"]));
    assert_eq!(where_clause(&query), "true");
    assert!(query.params().is_empty());
}

#[test]
fn test_exists_on_expedition_metadata() {
    let query = compile("Event", &Expression::exists(&["expedition.permitGuid"]));
    assert_eq!(where_clause(&query), "expeditions.metadata ? :1");
    assert_eq!(param_values(&query), vec!["permitGuid"]);
}

#[test]
fn test_exists_requires_columns() {
    assert!(matches!(
        compile_err("Event", &Expression::exists(&[])),
        QueryError::InvalidQuery(_)
    ));
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_not_group_and_logical() {
    let expr = Expression::and(
        Expression::group(Expression::or(
            Expression::comparison("country", Equals, "Peru"),
            Expression::comparison("country", Equals, "Chile"),
        )),
        Expression::not(Expression::exists(&["locality"])),
    );
    let query = compile("Event", &expr);
    assert_eq!(
        where_clause(&query),
        "(Event.data->>'urn:country' = :1 OR Event.data->>'urn:country' = :2) AND not Event.data ? :3"
    );
    assert_eq!(param_values(&query), vec!["Peru", "Chile", "urn:locality"]);
}

#[test]
fn test_expedition_and_project_filters() {
    let query = compile("Event", &Expression::expedition(&["EXP1"]));
    assert_eq!(where_clause(&query), "expeditions.expedition_code = :1");

    let query = compile("Event", &Expression::expedition(&["EXP1", "EXP2"]));
    assert_eq!(where_clause(&query), "expeditions.expedition_code IN (:1, :2)");
    assert_eq!(param_values(&query), vec!["EXP1", "EXP2"]);
    assert!(query
        .sql()
        .contains("INNER JOIN expeditions ON expeditions.id = Event.expedition_id"));

    let query = compile("Event", &Expression::project(&[7, 8]));
    assert_eq!(where_clause(&query), "expeditions.project_id IN (:1, :2)");
    assert_eq!(param_values(&query), vec!["7", "8"]);

    assert!(matches!(
        compile_err("Event", &Expression::expedition(&[])),
        QueryError::InvalidQuery(_)
    ));
}

#[test]
fn test_select_projects_related_entity() {
    let expr = Expression::select(
        &["Sample"],
        Some(Expression::comparison("country", Equals, "Peru")),
    );
    let query = compile("Event", &expr);
    let sql = query.sql();

    assert!(sql.contains(
        "Sample.data AS \"Sample_data\", Sample_entity_identifiers.identifier AS \"Sample_rootIdentifier\""
    ));
    assert!(sql.contains(
        "LEFT JOIN network_1.Sample AS Sample ON Sample.parent_identifier = Event.local_identifier"
    ));
    assert!(sql.contains("LEFT JOIN entity_identifiers AS Sample_entity_identifiers"));
    assert_eq!(where_clause(&query), "Event.data->>'urn:country' = :1");
}

#[test]
fn test_filter_on_sibling_entity() {
    use fims_query::model::{Attribute, Entity};

    let project = ProjectConfig::new(
        vec![
            Entity::new("Event", "eventId").with_attribute(Attribute::new("eventId", "urn:eventId")),
            Entity::new("Sample", "sampleId")
                .with_parent("Event")
                .with_attribute(Attribute::new("sampleId", "urn:sampleId")),
            Entity::new("Photo", "photoId")
                .with_parent("Event")
                .with_attribute(Attribute::new("photoId", "urn:photoId"))
                .with_attribute(Attribute::new("caption", "urn:caption")),
        ],
        vec![],
    )
    .unwrap();

    let query = compile_on(
        &project,
        "Sample",
        &Expression::comparison("Photo.caption", Equals, "x"),
    );
    assert_eq!(where_clause(&query), "Photo.data->>'urn:caption' = :1");
    assert!(query.sql().contains(
        "FROM network_1.Sample AS Sample \
         INNER JOIN network_1.Event AS Event ON Sample.parent_identifier = Event.local_identifier \
         AND Sample.expedition_id = Event.expedition_id \
         INNER JOIN network_1.Photo AS Photo ON Photo.parent_identifier = Event.local_identifier \
         AND Photo.expedition_id = Event.expedition_id \
         LEFT JOIN entity_identifiers AS Sample_entity_identifiers"
    ));
}

#[test]
fn test_select_unknown_entity() {
    let expr = Expression::select(&["Specimen"], Some(Expression::All));
    assert_eq!(
        compile_err("Event", &expr),
        QueryError::UnknownEntity("Specimen".into())
    );
}

// ============================================================================
// All / Empty / assembly
// ============================================================================

#[test]
fn test_all_query_has_no_where() {
    let query = compile("Event", &Expression::All);
    assert!(!query.sql().contains(" WHERE "));
    assert!(query.params().is_empty());
}

#[test]
fn test_empty_and_invalid_combinations() {
    assert!(matches!(
        compile_err("Event", &Expression::Empty),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        compile_err(
            "Event",
            &Expression::and(Expression::All, Expression::comparison("year", Equals, "1"))
        ),
        QueryError::InvalidQuery(_)
    ));
    // A select with no predicate is neither filtered nor an all query
    assert!(matches!(
        compile_err("Event", &Expression::select(&["Sample"], None)),
        QueryError::InvalidQuery(_)
    ));
    assert!(matches!(
        compile_err("Event", &Expression::not(Expression::select(&["Sample"], None))),
        QueryError::InvalidQuery(_)
    ));
}

#[test]
fn test_only_public_is_anded() {
    let project = common::project();

    let query = QueryCompiler::new(&project, 1, "Event")
        .unwrap()
        .compile(&Expression::comparison("year", GreaterThan, "2001"), true)
        .unwrap();
    assert_eq!(
        where_clause(&query),
        "(convert_to_int(Event.data->>'urn:year') > :1::int) AND expeditions.public = true"
    );

    let query = QueryCompiler::new(&project, 1, "Event")
        .unwrap()
        .compile(&Expression::All, true)
        .unwrap();
    assert_eq!(where_clause(&query), "expeditions.public = true");
}

#[test]
fn test_pagination() {
    let project = common::project();

    let query = QueryCompiler::new(&project, 1, "Event")
        .unwrap()
        .with_pagination(Some(2), Some(10))
        .compile(&Expression::All, false)
        .unwrap();
    assert!(query
        .sql()
        .ends_with("ORDER BY Event.local_identifier, Event.expedition_id OFFSET 20 LIMIT 10"));

    let query = QueryCompiler::new(&project, 1, "Event")
        .unwrap()
        .with_pagination(None, Some(10))
        .compile(&Expression::All, false)
        .unwrap();
    assert!(query.sql().ends_with("OFFSET 0 LIMIT 10"));

    let query = QueryCompiler::new(&project, 1, "Event")
        .unwrap()
        .with_pagination(Some(3), None)
        .compile(&Expression::All, false)
        .unwrap();
    assert!(query
        .sql()
        .ends_with("ORDER BY Event.local_identifier, Event.expedition_id"));
}

#[test]
fn test_page_offset_overflow_rejected() {
    let project = common::project();

    let result = QueryCompiler::new(&project, 1, "Event")
        .unwrap()
        .with_pagination(Some(u64::MAX / 2), Some(100))
        .compile(&Expression::All, false);
    assert_eq!(
        result.unwrap_err(),
        QueryError::InvalidQuery("page out of range".into())
    );

    // The largest offset that still fits is accepted
    let query = QueryCompiler::new(&project, 1, "Event")
        .unwrap()
        .with_pagination(Some(u64::MAX), Some(1))
        .compile(&Expression::All, false)
        .unwrap();
    assert!(query
        .sql()
        .ends_with(&format!("OFFSET {} LIMIT 1", u64::MAX)));
}

#[test]
fn test_repeated_visits_are_anded() {
    let project = common::project();
    let mut compiler = QueryCompiler::new(&project, 1, "Event").unwrap();
    compiler
        .visit(&Expression::comparison("country", Equals, "Peru"))
        .unwrap();
    compiler.visit(&Expression::expedition(&["EXP1"])).unwrap();
    let query = compiler.parameterized_query(false).unwrap();

    assert_eq!(
        where_clause(&query),
        "Event.data->>'urn:country' = :1 AND expeditions.expedition_code = :2"
    );
}

// ============================================================================
// Resolution errors and policies
// ============================================================================

#[test]
fn test_resolution_errors() {
    assert_eq!(
        compile_err("Event", &Expression::comparison("colour", Equals, "red")),
        QueryError::UnknownColumn("colour".into())
    );
    assert_eq!(
        compile_err("Event", &Expression::comparison("Specimen.colour", Equals, "red")),
        QueryError::UnknownEntity("Specimen.colour".into())
    );
    assert_eq!(
        compile_err("Event", &Expression::comparison("Site.elevation", GreaterThan, "100")),
        QueryError::UnrelatedEntities {
            entity: "Site".into(),
            root: "Event".into(),
        }
    );
}

#[test]
fn test_column_resolution_policy() {
    let project = common::project();
    let expr = Expression::comparison("country", Equals, "Peru");

    let query = compile_on(&project, "Sample", &expr);
    assert_eq!(where_clause(&query), "Event.data->>'urn:country' = :1");
    assert!(query.sql().contains("INNER JOIN network_1.Event AS Event"));

    let query = QueryCompiler::new(&project, 1, "Sample")
        .unwrap()
        .with_column_resolution(ColumnResolution::PreferRoot)
        .compile(&expr, false)
        .unwrap();
    assert_eq!(where_clause(&query), "Sample.data->>'urn:sample_country' = :1");
    assert!(!query.sql().contains("network_1.Event"));

    let err = QueryCompiler::new(&project, 1, "Sample")
        .unwrap()
        .with_column_resolution(ColumnResolution::Strict)
        .compile(&expr, false)
        .unwrap_err();
    assert_eq!(err.code(), "AMBIGUOUS_COLUMN");
}

#[test]
fn test_literals_never_reach_sql() {
    let hostile = "x'; DROP TABLE network_1.Event; --";
    let expr = Expression::or(
        Expression::comparison("country", Equals, hostile),
        Expression::like("locality", hostile),
    );
    let query = compile("Event", &expr);

    assert!(!query.sql().contains("DROP TABLE"));
    assert_eq!(param_values(&query), vec![hostile, hostile]);
}

#[test]
fn test_expedition_metadata_comparison() {
    let query = compile("Event", &Expression::comparison("expedition.embargoed", Equals, "false"));
    assert_eq!(where_clause(&query), "expeditions.metadata->>'embargoed' = :1");
}
