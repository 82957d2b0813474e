//! Core engine for SchemaScribe.
//!
//! This crate ties introspection, closure computation, catalog merges, and
//! the summarization pool into end-to-end operations (rebuild, reload,
//! summarize) exposed to the CLI.

pub mod clear;
pub mod graph;
pub mod pipeline;
pub mod prompts;
pub mod summarize;
pub mod sync;

#[cfg(test)]
pub(crate) mod testutil {
    use schemascribe_catalog::Catalog;
    use schemascribe_introspect::schema::{
        FieldIntro, InputValueIntro, TypeIntro, TypeRef, type_kind,
    };
    use schemascribe_introspect::{MetaSummary, SchemaGraph};
    use schemascribe_shared::naming::{JOIN_AGGREGATION_TYPE, JOIN_TYPE};
    use schemascribe_shared::types::{field_role, type_role};
    use uuid::Uuid;

    /// Create a temp file catalog for testing.
    pub(crate) async fn test_catalog() -> Catalog {
        let tmp = std::env::temp_dir().join(format!("scribe_core_{}.db", Uuid::now_v7()));
        Catalog::open(&tmp).await.expect("open test db")
    }

    fn named(name: &str) -> TypeRef {
        TypeRef {
            name: name.into(),
            kind: type_kind::OBJECT.into(),
            of_type: None,
        }
    }

    fn field(name: &str, target: &str) -> FieldIntro {
        FieldIntro {
            name: name.into(),
            type_ref: named(target),
            ..Default::default()
        }
    }

    fn role_field(name: &str, target: &str, role: &str) -> FieldIntro {
        FieldIntro {
            name: name.into(),
            role: role.into(),
            type_ref: named(target),
            ..Default::default()
        }
    }

    fn arg(name: &str, target: &str) -> InputValueIntro {
        InputValueIntro {
            name: name.into(),
            type_ref: named(target),
            ..Default::default()
        }
    }

    fn object(name: &str, role: &str, module: &str, fields: Vec<FieldIntro>) -> TypeIntro {
        TypeIntro {
            name: name.into(),
            kind: type_kind::OBJECT.into(),
            role: role.into(),
            module: module.into(),
            fields,
            ..Default::default()
        }
    }

    fn input(name: &str, role: &str, fields: Vec<FieldIntro>) -> TypeIntro {
        TypeIntro {
            name: name.into(),
            kind: type_kind::INPUT_OBJECT.into(),
            role: role.into(),
            input_fields: fields,
            ..Default::default()
        }
    }

    fn scalar(name: &str) -> TypeIntro {
        TypeIntro {
            name: name.into(),
            kind: type_kind::SCALAR.into(),
            role: type_role::SCALAR.into(),
            ..Default::default()
        }
    }

    /// One `geo` module backed by the `osm` source: a `cities` table with
    /// filter, aggregation, and mutation types, a `geocode` function, and the
    /// synthetic join types. The meta summary adds an extension source and an
    /// empty source so pending-set filtering is observable.
    pub(crate) fn geo_fixture() -> (SchemaGraph, MetaSummary) {
        let mut cities = object(
            "cities",
            type_role::TABLE,
            "geo",
            vec![
                role_field("id", "Int", field_role::FIELD),
                role_field("name", "String", field_role::FIELD),
                role_field("population", "Int", field_role::FIELD),
            ],
        );
        cities.catalog = "osm".into();
        cities.description = "Cities of the world".into();

        let mut query_cities = role_field("cities", "cities", field_role::QUERY_DATA);
        query_cities.args = vec![arg("filter", "cities_filter_input"), arg("limit", "Int")];
        let mut query_by_pk = role_field("cities_by_pk", "cities", field_role::QUERY_ONE);
        query_by_pk.args = vec![arg("id", "Int")];
        let mut query_agg =
            role_field("cities_aggregation", "cities_aggregation", field_role::QUERY_AGGREGATE);
        query_agg.args = vec![arg("filter", "cities_filter_input")];

        let mut insert_cities = role_field("insert_cities", "cities", field_role::MUTATION_INSERT);
        insert_cities.args = vec![arg("data", "cities_mut_input_data")];
        let mut delete_cities = role_field("delete_cities", "cities", field_role::MUTATION_DELETE);
        delete_cities.args = vec![arg("filter", "cities_filter_input")];

        let mut geocode = role_field("geocode", "geocode_result", field_role::FUNCTION);
        geocode.catalog = "osm".into();
        geocode.description = "Resolve an address".into();
        geocode.args = vec![arg("addr", "String")];

        let mut agg_population = field("population", "int_agg");
        agg_population.args = vec![arg("distinct", "Boolean")];

        let mut join_cities = field("cities", "cities");
        join_cities.args = vec![arg("fields", "String")];

        let graph = SchemaGraph {
            types: vec![
                object(
                    "Query",
                    type_role::MODULE,
                    "",
                    vec![role_field("geo", "GeoQuery", field_role::SUBMODULE)],
                ),
                object(
                    "Mutation",
                    type_role::MODULE,
                    "",
                    vec![role_field("geo", "GeoMutation", field_role::SUBMODULE)],
                ),
                object(
                    "GeoQuery",
                    type_role::MODULE,
                    "geo",
                    vec![query_cities, query_by_pk, query_agg],
                ),
                object(
                    "GeoMutation",
                    type_role::MODULE,
                    "geo",
                    vec![insert_cities, delete_cities],
                ),
                object("GeoFunction", type_role::MODULE, "geo", vec![geocode]),
                cities,
                input(
                    "cities_filter_input",
                    type_role::FILTER,
                    vec![field("id", "int_filter"), field("name", "string_filter")],
                ),
                input(
                    "cities_list_filter_input",
                    type_role::FILTER,
                    vec![field("any_of", "cities_filter_input")],
                ),
                object(
                    "cities_aggregation",
                    type_role::AGGREGATIONS,
                    "geo",
                    vec![field("_rows_count", "Int"), agg_population],
                ),
                input(
                    "cities_mut_input_data",
                    "",
                    vec![field("name", "String"), field("population", "Int")],
                ),
                object(
                    "geocode_result",
                    "",
                    "geo",
                    vec![field("lat", "Float"), field("lon", "Float")],
                ),
                object(
                    JOIN_TYPE,
                    type_role::SYSTEM,
                    "",
                    vec![join_cities, field("cities_aggregation", "cities_aggregation")],
                ),
                object(
                    JOIN_AGGREGATION_TYPE,
                    type_role::SYSTEM,
                    "",
                    vec![field("cities", "cities_aggregation")],
                ),
                input("int_filter", type_role::SCALAR_FILTER, vec![field("eq", "Int")]),
                input(
                    "string_filter",
                    type_role::SCALAR_FILTER,
                    vec![field("eq", "String")],
                ),
                object(
                    "int_agg",
                    type_role::SCALAR_AGGREGATIONS,
                    "",
                    vec![field("sum", "Int")],
                ),
                scalar("Int"),
                scalar("String"),
                scalar("Float"),
                scalar("Boolean"),
            ],
            ..Default::default()
        };

        let meta: MetaSummary = serde_json::from_value(serde_json::json!({
            "modules": [
                {"name": "", "query_root": "Query", "mutation_root": "Mutation"},
                {
                    "name": "geo",
                    "description": "Geospatial data",
                    "query_root": "GeoQuery",
                    "mutation_root": "GeoMutation",
                    "function_root": "GeoFunction",
                    "data_objects": [{
                        "name": "cities",
                        "kind": "table",
                        "module": "geo",
                        "data_source": "osm",
                        "description": "Cities of the world",
                        "filter_type": "cities_filter_input",
                        "aggregation_type": "cities_aggregation",
                        "has_primary_key": true,
                        "columns": [
                            {"name": "id", "type": "Int", "is_primary_key": true},
                            {"name": "name", "type": "String", "description": "Official name"},
                            {"name": "population", "type": "Int"}
                        ],
                        "queries": [
                            {"name": "cities", "kind": "select",
                             "returned_type_name": "cities"},
                            {"name": "cities_by_pk", "kind": "select_one",
                             "returned_type_name": "cities"},
                            {"name": "cities_aggregation", "kind": "aggregate",
                             "returned_type_name": "cities_aggregation"}
                        ],
                        "mutations": {
                            "insert_mutation": "insert_cities",
                            "delete_mutation": "delete_cities",
                            "insert_data_type": "cities_mut_input_data"
                        }
                    }],
                    "functions": [{
                        "name": "geocode",
                        "description": "Resolve an address",
                        "data_source": "osm",
                        "arguments": [{"name": "addr", "type": "String"}],
                        "return_type": "geocode_result",
                        "return_type_fields": [
                            {"name": "lat", "type": "Float"},
                            {"name": "lon", "type": "Float"}
                        ]
                    }]
                }
            ],
            "data_sources": [
                {"name": "osm", "kind": "postgres",
                 "description": "OpenStreetMap snapshot"},
                {"name": "h3", "kind": "extension",
                 "description": "Spatial grid helpers"},
                {"name": "staging", "kind": "duckdb",
                 "description": "Empty staging source"}
            ]
        }))
        .expect("fixture meta");

        (graph, meta)
    }
}
