//! Catalog row types and role vocabularies.
//!
//! Two families live here: `*Row` structs are catalog read shapes, `New*`
//! structs are the desired-state inputs the merge operations consume. Desired
//! rows carry `Option` descriptions: `None` means "leave the stored value
//! alone", so a patch reload can refresh structure without clobbering
//! summarizer output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic role tags carried on catalog types.
pub mod type_role {
    pub const MODULE: &str = "module";
    pub const TABLE: &str = "table";
    pub const VIEW: &str = "view";
    pub const FILTER: &str = "filter";
    pub const AGGREGATIONS: &str = "aggs";
    pub const VIEW_ARGUMENT: &str = "view_argument";
    pub const FUNCTION: &str = "function";
    pub const SYSTEM: &str = "system";
    pub const SCALAR: &str = "scalar";
    pub const SCALAR_FILTER: &str = "scalar_filter";
    pub const SCALAR_AGGREGATIONS: &str = "scalar_aggs";
}

/// Semantic role tags carried on catalog fields.
pub mod field_role {
    pub const SUBMODULE: &str = "submodule";
    pub const FIELD: &str = "field";
    pub const EXTRA_FIELD: &str = "extra_field";
    pub const REFERENCES_QUERY: &str = "references_query";
    pub const JOIN: &str = "join";
    pub const FUNCTION_CALL: &str = "function_call";
    pub const QUERY_DATA: &str = "query_data";
    pub const QUERY_ONE: &str = "query_one";
    pub const QUERY_AGGREGATE: &str = "query_agg";
    pub const QUERY_SUB_AGGREGATE: &str = "query_sub_agg";
    pub const QUERY_BUCKET_AGGREGATE: &str = "query_bucket_agg";
    pub const FUNCTION: &str = "function";
    pub const MUTATION_FUNCTION: &str = "mutation_function";
    pub const MUTATION_INSERT: &str = "mutation_insert";
    pub const MUTATION_UPDATE: &str = "mutation_update";
    pub const MUTATION_DELETE: &str = "mutation_delete";
}

/// Query kinds a data object exposes.
pub mod query_kind {
    pub const SELECT: &str = "select";
    pub const SELECT_ONE: &str = "select_one";
    pub const AGGREGATE: &str = "aggregate";
    pub const BUCKET_AGGREGATE: &str = "bucket_aggregate";
    pub const H3: &str = "h3";
    pub const JQ: &str = "jq";
}

/// Data-source kinds the engine branches on.
pub mod data_source_kind {
    /// Built-in extension sources are never summarized.
    pub const EXTENSION: &str = "extension";
}

// ---------------------------------------------------------------------------
// Catalog read shapes
// ---------------------------------------------------------------------------

/// A catalog `types` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRow {
    pub name: String,
    pub kind: String,
    pub role: String,
    pub module: String,
    pub catalog: String,
    pub description: String,
    pub long_description: String,
    pub is_summarized: bool,
    pub updated_at: DateTime<Utc>,
}

/// A catalog `fields` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRow {
    pub type_name: String,
    pub name: String,
    pub target_type: String,
    pub role: String,
    pub catalog: String,
    pub description: String,
    pub is_list: bool,
    pub is_non_null: bool,
    pub is_primary_key: bool,
    pub is_indexed: bool,
    pub is_excluded: bool,
    pub is_summarized: bool,
    pub updated_at: DateTime<Utc>,
}

/// A catalog `arguments` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentRow {
    pub type_name: String,
    pub field_name: String,
    pub name: String,
    pub target_type: String,
    pub description: String,
    pub default_value: String,
    pub is_list: bool,
    pub is_non_null: bool,
}

/// A catalog `modules` row. The root module has the empty name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRow {
    pub name: String,
    pub description: String,
    pub long_description: String,
    pub query_root: String,
    pub mutation_root: String,
    pub function_root: String,
    pub mutation_function_root: String,
    pub is_summarized: bool,
    pub is_disabled: bool,
}

impl ModuleRow {
    /// Depth of the module in the tree; the root module has depth 0.
    pub fn depth(&self) -> usize {
        if self.name.is_empty() {
            0
        } else {
            self.name.split('.').count()
        }
    }
}

/// A catalog `data_sources` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceRow {
    pub name: String,
    pub kind: String,
    pub prefix: String,
    pub description: String,
    pub long_description: String,
    pub as_module: bool,
    pub read_only: bool,
    pub disabled: bool,
    pub is_summarized: bool,
}

/// A catalog `data_objects` row with its ordered query list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataObjectRow {
    pub name: String,
    pub filter_type: String,
    pub args_type: String,
    pub queries: Vec<DataObjectQueryRow>,
}

/// One entry of a data object's query list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataObjectQueryRow {
    pub object_name: String,
    pub name: String,
    pub query_root: String,
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Desired-state (merge input) shapes
// ---------------------------------------------------------------------------

/// Desired state for a `types` row.
#[derive(Debug, Clone, Default)]
pub struct NewType {
    pub name: String,
    pub kind: String,
    pub role: String,
    pub module: String,
    pub catalog: String,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub summarized: Option<bool>,
}

/// Desired state for a `fields` row.
#[derive(Debug, Clone, Default)]
pub struct NewField {
    pub type_name: String,
    pub name: String,
    pub target_type: String,
    pub role: String,
    pub catalog: String,
    pub is_list: bool,
    pub is_non_null: bool,
    pub is_excluded: bool,
    pub description: Option<String>,
}

/// Desired state for an `arguments` row.
#[derive(Debug, Clone, Default)]
pub struct NewArgument {
    pub type_name: String,
    pub field_name: String,
    pub name: String,
    pub target_type: String,
    pub default_value: String,
    pub is_list: bool,
    pub is_non_null: bool,
    pub description: Option<String>,
}

/// Desired state for a `modules` row.
#[derive(Debug, Clone, Default)]
pub struct NewModule {
    pub name: String,
    pub query_root: String,
    pub mutation_root: String,
    pub function_root: String,
    pub mutation_function_root: String,
    pub disabled: bool,
    pub description: Option<String>,
}

/// Desired state for a `data_sources` row.
#[derive(Debug, Clone, Default)]
pub struct NewDataSource {
    pub name: String,
    pub kind: String,
    pub prefix: String,
    pub as_module: bool,
    pub read_only: bool,
    pub disabled: bool,
    pub description: Option<String>,
}

/// Desired state for a data object and its query list (replaced as a unit).
#[derive(Debug, Clone, Default)]
pub struct NewDataObject {
    pub name: String,
    pub filter_type: String,
    pub args_type: String,
    pub queries: Vec<NewDataObjectQuery>,
}

/// One query of a [`NewDataObject`], in upstream order.
#[derive(Debug, Clone, Default)]
pub struct NewDataObjectQuery {
    pub name: String,
    pub kind: String,
    pub query_root: String,
}
