//! Prompt templates, prompt inputs, and summary output shapes.
//!
//! Each summarization kind pairs a template with a typed input struct whose
//! field names are the template's placeholders, and a typed output struct the
//! model reply decodes into. Inputs borrow descriptor data from the resolved
//! summary wherever possible and serialize to JSON for template rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use schemascribe_introspect::MetaSummary;
use schemascribe_introspect::meta::{
    ArgumentsInfo, ColumnInfo, DataObjectInfo, FunctionArgInfo, FunctionCallInfo, FunctionInfo,
    MutationsInfo, QueryInfo, ReferenceInfo,
};
use schemascribe_pool::SummarizationTask;
use schemascribe_shared::{DataSourceRow, ModuleRow, Result, SchemaScribeError};

use crate::graph::RelatedGraph;

pub const SUMMARY_TEMPERATURE: f64 = 0.3;
pub const DATA_OBJECT_MAX_TOKENS: u32 = 16384;
pub const FUNCTION_MAX_TOKENS: u32 = 4096;
pub const DATA_SOURCE_MAX_TOKENS: u32 = 4096;
pub const MODULE_MAX_TOKENS: u32 = 2096;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

pub const SYSTEM_PROMPT: &str = "\
You are a technical writer producing reference documentation for a federated \
GraphQL data platform. You receive structured metadata about one schema \
element at a time and write concise, factual descriptions of it.

Rules:
- Describe only what the metadata supports; never invent columns, relations, \
or behavior.
- Write plain, direct language for engineers querying the schema.
- A short description is a single sentence. A long description is one or two \
paragraphs covering purpose, contents, and how the element relates to its \
neighbors.
- Respond with a single JSON object and nothing else: no markdown fences, no \
commentary, no trailing text.";

pub const DATA_OBJECT_TEMPLATE: &str = "\
Summarize the data object described below.

Object:
{{object}}

Columns:
{{columns}}

References to other objects:
{{references}}

Subqueries:
{{subqueries}}

Function calls:
{{function_calls}}

Root queries:
{{queries}}

Mutations:
{{mutations}}

View arguments:
{{arguments}}

Data source:
{{data_source_context}}

Module:
{{module_context}}

Related graph:
{{related_graph}}

Reply with a JSON object using these keys, omitting keys that do not apply:
- \"short\", \"long\": descriptions of the object itself
- \"aggregation_type_short\", \"aggregation_type_long\": for the aggregation type, if the object has one
- \"sub_aggregation_type_short\", \"sub_aggregation_type_long\": likewise for the sub-aggregation type
- \"bucket_aggregation_type_short\", \"bucket_aggregation_type_long\": likewise for the bucket aggregation type
- \"fields\": object mapping column name to description
- \"extra_fields\": object mapping extra field name to description
- \"filter\": {\"row\": description of the filter type, \"fields\": {field -> description}, \"references\": {reference -> description}}
- \"references\": object mapping reference name to {\"short\", \"filter\", \"select\", \"select_agg\", \"select_bucket_agg\"}
- \"subqueries\": same shape as \"references\"
- \"function_calls\": object mapping function call name to description
- \"arguments\": {\"short\": description of the arguments type, \"fields\": {argument -> description}}
- \"queries\": object mapping root query name to description
- \"mutations\": object mapping mutation name to description";

pub const FUNCTION_TEMPLATE: &str = "\
Summarize the schema function described below.

Function: {{name}}
Description: {{description}}
Returns: {{return_type}} (array: {{returns_array}})

Parameters:
{{parameters}}

Return type fields:
{{return_type_fields}}

Data source:
{{data_source_context}}

Module:
{{module_context}}

Reply with a JSON object using these keys:
- \"short\", \"long\": descriptions of the function
- \"parameters\": object mapping parameter name to description
- \"returns\": {\"short\": description of the return type, \"fields\": {field -> description}}";

pub const DATA_SOURCE_TEMPLATE: &str = "\
Summarize the data source described below.

Name: {{name}}
Kind: {{type}}
Description: {{description}}
Mounted as its own module: {{as_module}}
Read only: {{read_only}}

Tables:
{{tables}}

Views:
{{views}}

Functions:
{{functions}}

Submodules:
{{submodules}}

Reply with a JSON object with keys \"short\" and \"long\" describing what the
source contains and what it is useful for.";

pub const MODULE_TEMPLATE: &str = "\
Summarize the schema module described below. An empty module name denotes the
root module.

Module: {{name}}
Description: {{description}}

Tables:
{{tables}}

Views:
{{views}}

Functions:
{{functions}}

Mutation functions:
{{mut_functions}}

Submodules:
{{submodules}}

Data sources:
{{data_source_contexts}}

Reply with a JSON object using these keys:
- \"short\", \"long\": descriptions of the module
- \"query_type\": one sentence describing the module's query namespace
- \"mutation_type\": one sentence describing the mutation namespace
- \"function_type\": one sentence describing the function namespace
- \"mutation_function_type\": one sentence describing the mutation function namespace";

// ---------------------------------------------------------------------------
// Summary output shapes
// ---------------------------------------------------------------------------

/// Model reply for a data object. Missing keys decode as empty, and the
/// write-back skips empty values, so a partial reply degrades gracefully.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataObjectSummary {
    pub short: String,
    pub long: String,
    pub aggregation_type_short: String,
    pub aggregation_type_long: String,
    pub sub_aggregation_type_short: String,
    pub sub_aggregation_type_long: String,
    pub bucket_aggregation_type_short: String,
    pub bucket_aggregation_type_long: String,
    pub fields: BTreeMap<String, String>,
    pub extra_fields: BTreeMap<String, String>,
    pub filter: FilterSummary,
    pub references: BTreeMap<String, RelationSummary>,
    pub subqueries: BTreeMap<String, RelationSummary>,
    pub function_calls: BTreeMap<String, String>,
    pub arguments: ArgumentsSummary,
    pub queries: BTreeMap<String, String>,
    pub mutations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterSummary {
    pub row: String,
    pub fields: BTreeMap<String, String>,
    pub references: BTreeMap<String, String>,
}

/// Reply shape shared by references and subqueries: a description of the
/// relation plus texts for each query field the relation contributes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelationSummary {
    pub short: String,
    pub filter: String,
    pub select: String,
    pub select_agg: String,
    pub select_bucket_agg: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArgumentsSummary {
    pub short: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunctionSummary {
    pub short: String,
    pub long: String,
    pub parameters: BTreeMap<String, String>,
    pub returns: FunctionReturnsSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunctionReturnsSummary {
    pub short: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataSourceSummary {
    pub short: String,
    pub long: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModuleSummary {
    pub short: String,
    pub long: String,
    pub query_type: String,
    pub mutation_type: String,
    pub function_type: String,
    pub mutation_function_type: String,
}

/// Decode a model reply, tolerating a fenced code block around the JSON.
pub fn parse_summary<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(strip_fences(text))
        .map_err(|e| SchemaScribeError::Summarize(format!("decode summary reply: {e}")))
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

// ---------------------------------------------------------------------------
// Prompt inputs
// ---------------------------------------------------------------------------

/// Data-source line attached to object, function, and module prompts.
#[derive(Debug, Clone, Serialize)]
pub struct SourceContext {
    pub name: String,
    pub summary_text: String,
}

impl SourceContext {
    /// Context line for a catalog data source row.
    pub fn from_row(row: &DataSourceRow) -> Self {
        Self {
            name: row.name.clone(),
            summary_text: format!("{} ({})", row.description, row.kind),
        }
    }

    /// Stand-in for the built-in `core` sources, which carry no descriptor.
    fn core(name: &str) -> Self {
        Self {
            name: name.to_string(),
            summary_text: "Built-in core data source (runtime)".to_string(),
        }
    }
}

/// Name plus description, used for prompt listings.
#[derive(Debug, Clone, Serialize)]
pub struct NamedBrief {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
struct ObjectFacts<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    description: &'a str,
    has_primary_key: bool,
    has_geometry: bool,
    is_m2m: bool,
    is_cube: bool,
    is_hypertable: bool,
    has_aggregation_type: bool,
    has_sub_aggregation_type: bool,
    has_bucket_aggregation_type: bool,
}

#[derive(Debug, Serialize)]
struct ColumnFacts {
    name: String,
    description: String,
    #[serde(rename = "type")]
    type_name: String,
    is_primary_key: bool,
    is_array: bool,
    extra_fields: Vec<String>,
    nested_fields: Vec<ColumnFacts>,
}

#[derive(Debug, Serialize)]
struct ModuleContext<'a> {
    name: &'a str,
    overview: &'a str,
}

#[derive(Debug, Serialize)]
struct DataObjectInput<'a> {
    object: ObjectFacts<'a>,
    columns: Vec<ColumnFacts>,
    references: &'a [ReferenceInfo],
    subqueries: &'a [ReferenceInfo],
    function_calls: &'a [FunctionCallInfo],
    queries: &'a [QueryInfo],
    mutations: &'a Option<MutationsInfo>,
    arguments: &'a Option<ArgumentsInfo>,
    data_source_context: SourceContext,
    module_context: ModuleContext<'a>,
    related_graph: RelatedGraph,
}

#[derive(Debug, Serialize)]
struct FunctionInput<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a [FunctionArgInfo],
    return_type: &'a str,
    returns_array: bool,
    return_type_fields: Vec<ColumnFacts>,
    data_source_context: SourceContext,
    module_context: ModuleContext<'a>,
}

#[derive(Debug, Serialize)]
struct DataSourceInput<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    as_module: bool,
    read_only: bool,
    tables: Vec<NamedBrief>,
    views: Vec<NamedBrief>,
    functions: Vec<NamedBrief>,
    submodules: Vec<NamedBrief>,
}

#[derive(Debug, Serialize)]
struct ModuleInput<'a> {
    name: &'a str,
    description: &'a str,
    tables: BTreeMap<String, String>,
    views: BTreeMap<String, String>,
    functions: BTreeMap<String, String>,
    mut_functions: BTreeMap<String, String>,
    submodules: BTreeMap<String, String>,
    data_source_contexts: Vec<SourceContext>,
}

/// Build the prompt input for one data object.
pub fn data_object_input(
    meta: &MetaSummary,
    object: &DataObjectInfo,
    max_graph_depth: u32,
) -> Result<Value> {
    let input = DataObjectInput {
        object: ObjectFacts {
            name: &object.name,
            kind: &object.kind,
            description: &object.description,
            has_primary_key: object.has_primary_key,
            has_geometry: object.has_geometry,
            is_m2m: object.is_m2m,
            is_cube: object.is_cube,
            is_hypertable: object.is_hypertable,
            has_aggregation_type: !object.aggregation_type.is_empty(),
            has_sub_aggregation_type: !object.sub_aggregation_type.is_empty(),
            has_bucket_aggregation_type: !object.bucket_aggregation_type.is_empty(),
        },
        columns: object.columns.iter().map(column_facts).collect(),
        references: &object.references,
        subqueries: &object.subqueries,
        function_calls: &object.function_calls,
        queries: &object.queries,
        mutations: &object.mutations,
        arguments: &object.arguments,
        data_source_context: object_source_context(meta, object)?,
        module_context: module_context(meta, &object.module)?,
        related_graph: RelatedGraph::build(meta, object, max_graph_depth),
    };
    encode_input(&input)
}

/// Build the prompt input for one function or mutation function.
pub fn function_input(
    meta: &MetaSummary,
    module_name: &str,
    function: &FunctionInfo,
) -> Result<Value> {
    let input = FunctionInput {
        name: &function.name,
        description: &function.description,
        parameters: &function.arguments,
        return_type: &function.return_type,
        returns_array: function.returns_array,
        return_type_fields: function.return_type_fields.iter().map(column_facts).collect(),
        data_source_context: function_source_context(meta, module_name, function)?,
        module_context: module_context(meta, module_name)?,
    };
    encode_input(&input)
}

/// Build the prompt input for one data source from its catalog rows.
pub fn data_source_input(
    source: &DataSourceRow,
    tables: Vec<NamedBrief>,
    views: Vec<NamedBrief>,
    functions: Vec<NamedBrief>,
    submodules: Vec<NamedBrief>,
) -> Result<Value> {
    let input = DataSourceInput {
        name: &source.name,
        description: &source.description,
        kind: if source.kind.is_empty() {
            "unknown"
        } else {
            &source.kind
        },
        as_module: source.as_module,
        read_only: source.read_only,
        tables,
        views,
        functions,
        submodules,
    };
    encode_input(&input)
}

/// Build the prompt input for one module from its catalog rows.
pub fn module_input(
    module: &ModuleRow,
    tables: BTreeMap<String, String>,
    views: BTreeMap<String, String>,
    functions: BTreeMap<String, String>,
    mut_functions: BTreeMap<String, String>,
    submodules: BTreeMap<String, String>,
    data_source_contexts: Vec<SourceContext>,
) -> Result<Value> {
    let input = ModuleInput {
        name: &module.name,
        description: &module.description,
        tables,
        views,
        functions,
        mut_functions,
        submodules,
        data_source_contexts,
    };
    encode_input(&input)
}

fn encode_input<T: Serialize>(input: &T) -> Result<Value> {
    serde_json::to_value(input)
        .map_err(|e| SchemaScribeError::Summarize(format!("encode prompt input: {e}")))
}

fn column_facts(column: &ColumnInfo) -> ColumnFacts {
    let mut description = column.description.clone();
    if column.is_calculated {
        if description.is_empty() {
            description = "(calculated)".to_string();
        } else {
            description.push_str(" (calculated)");
        }
    }
    ColumnFacts {
        name: column.name.clone(),
        description,
        type_name: column.type_name.clone(),
        is_primary_key: column.is_primary_key,
        is_array: column.returns_array,
        extra_fields: column.extra_fields.iter().map(extra_field_line).collect(),
        nested_fields: column.nested_fields.iter().map(column_facts).collect(),
    }
}

fn extra_field_line(field: &ColumnInfo) -> String {
    if field.description.is_empty() {
        format!("{}: {}", field.name, field.type_name)
    } else {
        format!("{}: {} ({})", field.name, field.type_name, field.description)
    }
}

fn object_source_context(meta: &MetaSummary, object: &DataObjectInfo) -> Result<SourceContext> {
    match meta.data_source(&object.data_source) {
        Some(source) => Ok(SourceContext {
            name: source.name.clone(),
            summary_text: format!("{} ({})", source.description, source.kind),
        }),
        None if object.data_source.starts_with("core") => {
            Ok(SourceContext::core(&object.data_source))
        }
        None => Err(SchemaScribeError::schema(format!(
            "data source not found: {}",
            object.data_source
        ))),
    }
}

fn function_source_context(
    meta: &MetaSummary,
    module_name: &str,
    function: &FunctionInfo,
) -> Result<SourceContext> {
    match meta.data_source(&function.data_source) {
        Some(source) => Ok(SourceContext {
            name: source.name.clone(),
            summary_text: source.description.clone(),
        }),
        None if module_name.starts_with("core") => {
            Ok(SourceContext::core(&function.data_source))
        }
        None => Err(SchemaScribeError::schema(format!(
            "data source not found: {}",
            function.data_source
        ))),
    }
}

fn module_context<'a>(meta: &'a MetaSummary, name: &str) -> Result<ModuleContext<'a>> {
    let module = meta
        .module(name)
        .ok_or_else(|| SchemaScribeError::schema(format!("module not found: {name}")))?;
    Ok(ModuleContext {
        name: &module.name,
        overview: &module.description,
    })
}

// ---------------------------------------------------------------------------
// Task construction
// ---------------------------------------------------------------------------

pub fn data_object_task(input: Value) -> SummarizationTask {
    SummarizationTask {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt_template: DATA_OBJECT_TEMPLATE.to_string(),
        data: input,
        max_tokens: DATA_OBJECT_MAX_TOKENS,
        temperature: SUMMARY_TEMPERATURE,
    }
}

pub fn function_task(input: Value) -> SummarizationTask {
    SummarizationTask {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt_template: FUNCTION_TEMPLATE.to_string(),
        data: input,
        max_tokens: FUNCTION_MAX_TOKENS,
        temperature: SUMMARY_TEMPERATURE,
    }
}

pub fn data_source_task(input: Value) -> SummarizationTask {
    SummarizationTask {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt_template: DATA_SOURCE_TEMPLATE.to_string(),
        data: input,
        max_tokens: DATA_SOURCE_MAX_TOKENS,
        temperature: SUMMARY_TEMPERATURE,
    }
}

pub fn module_task(input: Value) -> SummarizationTask {
    SummarizationTask {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt_template: MODULE_TEMPLATE.to_string(),
        data: input,
        max_tokens: MODULE_MAX_TOKENS,
        temperature: SUMMARY_TEMPERATURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Placeholder names occurring in a template.
    fn placeholders(template: &str) -> Vec<&str> {
        template
            .split("{{")
            .skip(1)
            .map(|rest| rest.split("}}").next().unwrap().trim())
            .collect()
    }

    fn fixture() -> MetaSummary {
        serde_json::from_value(serde_json::json!({
            "modules": [{
                "name": "geo",
                "description": "Geospatial data",
                "query_root": "geo_query",
                "data_objects": [{
                    "name": "cities",
                    "kind": "table",
                    "module": "geo",
                    "data_source": "osm",
                    "description": "City records",
                    "aggregation_type": "cities_aggregation",
                    "columns": [
                        {"name": "id", "type": "BigInt", "is_primary_key": true},
                        {
                            "name": "area",
                            "type": "Float",
                            "is_calculated": true,
                            "description": "surface area"
                        },
                        {"name": "geom", "type": "geometry", "extra_fields": [
                            {"name": "centroid", "type": "geometry", "description": "center point"}
                        ]}
                    ],
                    "queries": [{"name": "cities", "kind": "select"}]
                }],
                "functions": [{
                    "name": "distance",
                    "data_source": "osm",
                    "return_type": "distance_result",
                    "arguments": [{"name": "from", "type": "geometry"}]
                }]
            }],
            "data_sources": [{
                "name": "osm",
                "kind": "postgres",
                "description": "OpenStreetMap extract"
            }]
        }))
        .expect("decode meta fixture")
    }

    #[test]
    fn object_input_covers_template_placeholders() {
        let meta = fixture();
        let object = meta.table("geo.cities").unwrap();
        let input = data_object_input(&meta, object, 2).unwrap();
        for key in placeholders(DATA_OBJECT_TEMPLATE) {
            assert!(input.get(key).is_some(), "missing input key {key:?}");
        }
    }

    #[test]
    fn function_input_covers_template_placeholders() {
        let meta = fixture();
        let function = meta.function("geo.distance").unwrap();
        let input = function_input(&meta, "geo", function).unwrap();
        for key in placeholders(FUNCTION_TEMPLATE) {
            assert!(input.get(key).is_some(), "missing input key {key:?}");
        }
    }

    #[test]
    fn data_source_input_covers_template_placeholders() {
        let row = DataSourceRow {
            name: "osm".into(),
            kind: String::new(),
            prefix: String::new(),
            description: "extract".into(),
            long_description: String::new(),
            as_module: true,
            read_only: true,
            disabled: false,
            is_summarized: false,
        };
        let input = data_source_input(&row, vec![], vec![], vec![], vec![]).unwrap();
        for key in placeholders(DATA_SOURCE_TEMPLATE) {
            assert!(input.get(key).is_some(), "missing input key {key:?}");
        }
        // Empty kinds degrade to a placeholder value.
        assert_eq!(input["type"], "unknown");
    }

    #[test]
    fn module_input_covers_template_placeholders() {
        let row = ModuleRow {
            name: "geo".into(),
            description: "Geospatial data".into(),
            long_description: String::new(),
            query_root: "geo_query".into(),
            mutation_root: String::new(),
            function_root: String::new(),
            mutation_function_root: String::new(),
            is_summarized: false,
            is_disabled: false,
        };
        let input = module_input(
            &row,
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeMap::new(),
            vec![],
        )
        .unwrap();
        for key in placeholders(MODULE_TEMPLATE) {
            assert!(input.get(key).is_some(), "missing input key {key:?}");
        }
    }

    #[test]
    fn calculated_columns_are_annotated() {
        let meta = fixture();
        let object = meta.table("geo.cities").unwrap();
        let input = data_object_input(&meta, object, 2).unwrap();
        let columns = input["columns"].as_array().unwrap();
        assert_eq!(columns[1]["description"], "surface area (calculated)");
        assert_eq!(
            columns[2]["extra_fields"][0],
            "centroid: geometry (center point)"
        );
        assert_eq!(input["object"]["has_aggregation_type"], true);
        assert_eq!(input["object"]["has_sub_aggregation_type"], false);
    }

    #[test]
    fn unknown_data_source_is_an_error_unless_core() {
        let meta = fixture();
        let mut object = meta.table("geo.cities").unwrap().clone();
        object.data_source = "nowhere".into();
        let err = data_object_input(&meta, &object, 1).unwrap_err();
        assert!(err.to_string().contains("data source not found"));

        object.data_source = "core.runtime".into();
        let input = data_object_input(&meta, &object, 1).unwrap();
        assert_eq!(input["data_source_context"]["name"], "core.runtime");
    }

    #[test]
    fn parse_summary_tolerates_fences() {
        let fenced = "```json\n{\"short\": \"a table\", \"long\": \"\"}\n```";
        let summary: DataSourceSummary = parse_summary(fenced).unwrap();
        assert_eq!(summary.short, "a table");

        let bare = "{\"short\": \"x\"}";
        let summary: DataSourceSummary = parse_summary(bare).unwrap();
        assert_eq!(summary.short, "x");

        assert!(parse_summary::<DataSourceSummary>("not json").is_err());
    }

    #[test]
    fn partial_object_reply_decodes() {
        let reply = "{\"short\": \"cities\", \"fields\": {\"id\": \"primary key\"}}";
        let summary: DataObjectSummary = parse_summary(reply).unwrap();
        assert_eq!(summary.short, "cities");
        assert_eq!(summary.fields["id"], "primary key");
        assert!(summary.mutations.is_empty());
        assert!(summary.filter.row.is_empty());
    }
}
