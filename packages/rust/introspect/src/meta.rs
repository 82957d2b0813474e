//! Resolved meta-summary model: the module tree, data sources, and fully
//! resolved data-object / function descriptors the upstream service computes
//! from its own schema. The closure walk and the summarization orchestrator
//! both navigate this model rather than re-deriving structure from the raw
//! introspection graph.

use serde::{Deserialize, Serialize};

use crate::schema::null_default;

/// Relation kinds carried on reference descriptors.
pub mod reference_kind {
    pub const ONE_TO_MANY: &str = "one_to_many";
    pub const MANY_TO_ONE: &str = "many_to_one";
    pub const MANY_TO_MANY: &str = "many_to_many";
}

// ---------------------------------------------------------------------------
// Meta summary
// ---------------------------------------------------------------------------

/// The resolved schema summary. Modules form a flat list of full dot paths in
/// which every prefix is present and the root module has the empty name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaSummary {
    #[serde(default, deserialize_with = "null_default")]
    pub modules: Vec<ModuleInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub data_sources: Vec<DataSourceInfo>,
}

impl MetaSummary {
    pub fn module(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn data_source(&self, name: &str) -> Option<&DataSourceInfo> {
        self.data_sources.iter().find(|d| d.name == name)
    }

    /// All data objects across all modules.
    pub fn data_objects(&self) -> impl Iterator<Item = &DataObjectInfo> {
        self.modules.iter().flat_map(|m| m.data_objects.iter())
    }

    /// Look up a table by dot path (`geo.osm.cities`, or a bare name for the
    /// root module).
    pub fn table(&self, path: &str) -> Option<&DataObjectInfo> {
        self.object_by_path(path, schemascribe_shared::types::type_role::TABLE)
    }

    /// Look up a view by dot path.
    pub fn view(&self, path: &str) -> Option<&DataObjectInfo> {
        self.object_by_path(path, schemascribe_shared::types::type_role::VIEW)
    }

    /// Look up a function by dot path.
    pub fn function(&self, path: &str) -> Option<&FunctionInfo> {
        let (module, name) = split_path(path);
        self.module(module)?.function(name)
    }

    /// Look up a mutation function by dot path.
    pub fn mutation_function(&self, path: &str) -> Option<&FunctionInfo> {
        let (module, name) = split_path(path);
        self.module(module)?.mutation_function(name)
    }

    fn object_by_path(&self, path: &str, kind: &str) -> Option<&DataObjectInfo> {
        let (module, name) = split_path(path);
        self.module(module)?
            .data_object(name)
            .filter(|o| o.kind == kind)
    }
}

/// Split a dot path into (module, leaf). A path without a dot belongs to the
/// root module.
pub fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('.').unwrap_or(("", path))
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// One module: its four root types and the objects and functions it owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    /// Type names of the module roots; empty when the module has no such root.
    #[serde(default, deserialize_with = "null_default")]
    pub query_root: String,
    #[serde(default, deserialize_with = "null_default")]
    pub mutation_root: String,
    #[serde(default, deserialize_with = "null_default")]
    pub function_root: String,
    #[serde(default, deserialize_with = "null_default")]
    pub mutation_function_root: String,
    #[serde(default, deserialize_with = "null_default")]
    pub disabled: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub data_objects: Vec<DataObjectInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub functions: Vec<FunctionInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub mutation_functions: Vec<FunctionInfo>,
}

impl ModuleInfo {
    pub fn data_object(&self, name: &str) -> Option<&DataObjectInfo> {
        self.data_objects.iter().find(|o| o.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn mutation_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.mutation_functions.iter().find(|f| f.name == name)
    }
}

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSourceInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub kind: String,
    /// Query-name prefix applied when the source is mounted as its own module.
    #[serde(default, deserialize_with = "null_default")]
    pub prefix: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub as_module: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub read_only: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub disabled: bool,
}

// ---------------------------------------------------------------------------
// Data objects
// ---------------------------------------------------------------------------

/// A resolved data object (table or view). `name` is the object's type name in
/// the schema graph; `module` is the owning module's dot path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataObjectInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// `table` or `view`.
    #[serde(default, deserialize_with = "null_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_default")]
    pub module: String,
    #[serde(default, deserialize_with = "null_default")]
    pub data_source: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub filter_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub aggregation_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub sub_aggregation_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub bucket_aggregation_type: String,
    #[serde(default)]
    pub arguments: Option<ArgumentsInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub columns: Vec<ColumnInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub references: Vec<ReferenceInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub subqueries: Vec<ReferenceInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub function_calls: Vec<FunctionCallInfo>,
    #[serde(default)]
    pub mutations: Option<MutationsInfo>,
    /// Root queries for this object, in upstream order.
    #[serde(default, deserialize_with = "null_default")]
    pub queries: Vec<QueryInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub has_geometry: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub has_primary_key: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub is_m2m: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub is_cube: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub is_hypertable: bool,
}

impl DataObjectInfo {
    /// Whether `name` is a declared column of this object, either directly or
    /// as an extra field of one. Fields of the object type that fail this
    /// check are relation or computed fields and expand shallowly.
    pub fn is_declared_column(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.name == name || c.extra_fields.iter().any(|e| e.name == name))
    }
}

/// A column, extra field, nested field, or function return field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, rename = "type", deserialize_with = "null_default")]
    pub type_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub is_primary_key: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub is_calculated: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub returns_array: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub extra_fields: Vec<ColumnInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub nested_fields: Vec<ColumnInfo>,
}

/// A reference or subquery descriptor; both share the shape. `module` +
/// `data_object` locate the target object, the `field_*` names locate the
/// query fields this relation adds to the owning object type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// One of [`reference_kind`]; empty for subqueries.
    #[serde(default, deserialize_with = "null_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_default")]
    pub module: String,
    #[serde(default, deserialize_with = "null_default")]
    pub data_object: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub field_data_query: String,
    #[serde(default, deserialize_with = "null_default")]
    pub field_agg_query: String,
    #[serde(default, deserialize_with = "null_default")]
    pub field_bucket_agg_query: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionCallInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// Field on the owning object type that performs the call.
    #[serde(default, deserialize_with = "null_default")]
    pub field_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub module: String,
    #[serde(default, deserialize_with = "null_default")]
    pub data_source: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationsInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub insert_mutation: String,
    #[serde(default, deserialize_with = "null_default")]
    pub update_mutation: String,
    #[serde(default, deserialize_with = "null_default")]
    pub delete_mutation: String,
    #[serde(default, deserialize_with = "null_default")]
    pub insert_data_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub update_data_type: String,
}

/// View-argument descriptor: the input type and its declared fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgumentsInfo {
    #[serde(default, rename = "type", deserialize_with = "null_default")]
    pub type_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub nested_fields: Vec<ColumnInfo>,
}

/// One root query of a data object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// One of the query kinds (`select`, `select_one`, `aggregate`, ...).
    #[serde(default, deserialize_with = "null_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_default")]
    pub returned_type_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub arguments: Vec<QueryArgInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryArgInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "null_default")]
    pub type_name: String,
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub data_source: String,
    #[serde(default, deserialize_with = "null_default")]
    pub arguments: Vec<FunctionArgInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub return_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub returns_array: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub return_type_fields: Vec<ColumnInfo>,
    #[serde(default, deserialize_with = "null_default")]
    pub aggregation_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub sub_aggregation_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub bucket_aggregation_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionArgInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "null_default")]
    pub type_name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> MetaSummary {
        serde_json::from_value(serde_json::json!({
            "modules": [
                {"name": "", "query_root": "Query", "mutation_root": "Mutation"},
                {
                    "name": "geo",
                    "description": "Geospatial data",
                    "query_root": "geo_query",
                    "functions": [
                        {"name": "distance", "return_type": "Float", "arguments": [
                            {"name": "from", "type": "geometry"},
                            {"name": "to", "type": "geometry"}
                        ]}
                    ],
                    "mutation_functions": [
                        {"name": "reproject", "return_type": "op_result"}
                    ]
                },
                {
                    "name": "geo.osm",
                    "query_root": "geo_osm_query",
                    "data_objects": [
                        {
                            "name": "osm_cities",
                            "kind": "table",
                            "module": "geo.osm",
                            "data_source": "osm",
                            "columns": [
                                {"name": "id", "type": "BigInt", "is_primary_key": true},
                                {"name": "geom", "type": "geometry", "extra_fields": [
                                    {"name": "area", "type": "Float"}
                                ]}
                            ],
                            "queries": [
                                {"name": "cities", "kind": "select", "returned_type_name": "osm_cities"},
                                {"name": "cities_by_pk", "kind": "select_one", "returned_type_name": "osm_cities"}
                            ],
                            "has_geometry": true
                        }
                    ]
                }
            ],
            "data_sources": [
                {"name": "osm", "kind": "postgres", "prefix": "osm", "as_module": true}
            ]
        }))
        .expect("decode meta fixture")
    }

    #[test]
    fn test_path_lookups() {
        let meta = fixture();
        assert!(meta.module("").is_some());
        assert!(meta.module("geo.osm").is_some());
        assert!(meta.table("geo.osm.osm_cities").is_some());
        // Wrong kind does not resolve.
        assert!(meta.view("geo.osm.osm_cities").is_none());
        assert!(meta.table("geo.osm_cities").is_none());
        assert!(meta.function("geo.distance").is_some());
        assert!(meta.mutation_function("geo.reproject").is_some());
        assert!(meta.function("geo.reproject").is_none());
    }

    #[test]
    fn test_split_path_root_leaf() {
        assert_eq!(split_path("geo.osm.cities"), ("geo.osm", "cities"));
        assert_eq!(split_path("cities"), ("", "cities"));
    }

    #[test]
    fn test_declared_column_covers_extra_fields() {
        let meta = fixture();
        let obj = meta.table("geo.osm.osm_cities").expect("object");
        assert!(obj.is_declared_column("id"));
        assert!(obj.is_declared_column("geom"));
        assert!(obj.is_declared_column("area"));
        assert!(!obj.is_declared_column("settlements"));
    }

    #[test]
    fn test_query_order_preserved() {
        let meta = fixture();
        let obj = meta.table("geo.osm.osm_cities").expect("object");
        let names: Vec<&str> = obj.queries.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, ["cities", "cities_by_pk"]);
    }
}
