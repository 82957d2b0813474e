//! Catalog reconciliation: project the annotated schema graph and resolved
//! summary into catalog rows.
//!
//! [`reconcile`] walks the graph once and merges types, fields, and arguments,
//! then the summary's modules, data sources, and data objects. A [`Closure`]
//! scope restricts the walk to one object's or function's rows; `None`
//! reconciles everything. The merge mode decides what happens to rows that
//! already exist: [`MergeMode::Insert`] leaves them alone, [`MergeMode::Patch`]
//! refreshes their structural columns while preserving stored descriptions.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use schemascribe_catalog::{Catalog, MergeMode};
use schemascribe_closure::Closure;
use schemascribe_introspect::{MetaSummary, SchemaGraph};
use schemascribe_shared::naming::UNKNOWN_TYPE;
use schemascribe_shared::types::type_role;
use schemascribe_shared::{
    NewArgument, NewDataObject, NewDataObjectQuery, NewDataSource, NewField, NewModule, NewType,
    Result, SchemaScribeError,
};

/// Description to store for a merge in the given mode. Patch merges pass
/// `None` so summarized text survives a structural refresh.
fn merge_description(mode: MergeMode, text: &str) -> Option<String> {
    match mode {
        MergeMode::Insert => Some(text.to_string()),
        MergeMode::Patch => None,
    }
}

/// Drop the whole catalog and load it fresh from the graph and summary.
#[instrument(skip_all)]
pub async fn full_rebuild(
    catalog: &Catalog,
    graph: &SchemaGraph,
    meta: &MetaSummary,
) -> Result<()> {
    catalog.clear_all().await?;
    reconcile(catalog, graph, meta, None, MergeMode::Insert).await
}

/// Merge the graph and summary into the catalog, optionally scoped to a
/// closure.
#[instrument(skip_all, fields(scoped = scope.is_some(), mode = ?mode))]
pub async fn reconcile(
    catalog: &Catalog,
    graph: &SchemaGraph,
    meta: &MetaSummary,
    scope: Option<&Closure>,
    mode: MergeMode,
) -> Result<()> {
    // The Unknown sentinel backs every unnamed type reference, so it exists
    // before any field can point at it. Always insert-only.
    catalog
        .merge_type(
            &NewType {
                name: UNKNOWN_TYPE.to_string(),
                kind: "SCALAR".to_string(),
                role: type_role::SCALAR.to_string(),
                description: Some("Unknown type".to_string()),
                ..NewType::default()
            },
            MergeMode::Insert,
        )
        .await?;

    merge_graph_types(catalog, graph, scope, mode).await?;
    merge_modules(catalog, meta, scope).await?;
    merge_data_sources(catalog, meta, scope, mode).await?;
    merge_data_objects(catalog, meta, scope).await?;

    info!("catalog reconciled");
    Ok(())
}

async fn merge_graph_types(
    catalog: &Catalog,
    graph: &SchemaGraph,
    scope: Option<&Closure>,
    mode: MergeMode,
) -> Result<()> {
    let mut fields = Vec::new();
    let mut arguments = Vec::new();
    let mut seen_arguments: HashSet<String> = HashSet::new();

    for ty in &graph.types {
        if let Some(scope) = scope {
            if !scope.includes_type(&ty.name) {
                continue;
            }
        }

        catalog
            .merge_type(
                &NewType {
                    name: ty.name.clone(),
                    kind: ty.kind.clone(),
                    role: ty.role.clone(),
                    module: ty.module.clone(),
                    catalog: ty.catalog.clone(),
                    description: merge_description(mode, &ty.description),
                    long_description: None,
                    summarized: None,
                },
                mode,
            )
            .await?;

        for field in ty.catalog_fields() {
            if let Some(scope) = scope {
                if !scope.includes_field(&ty.name, &field.name) {
                    continue;
                }
            }

            fields.push(NewField {
                type_name: ty.name.clone(),
                name: field.name.clone(),
                target_type: field.type_ref.concrete_name().to_string(),
                role: field.role.clone(),
                catalog: field.catalog.clone(),
                is_list: field.type_ref.is_list(),
                is_non_null: field.type_ref.is_non_null(),
                is_excluded: field.exclude,
                description: merge_description(mode, &field.description),
            });

            for arg in &field.args {
                let key = format!("{}.{}.{}", ty.name, field.name, arg.name);
                if !seen_arguments.insert(key.clone()) {
                    return Err(SchemaScribeError::schema(format!(
                        "duplicate argument {key:?} in schema graph"
                    )));
                }
                arguments.push(NewArgument {
                    type_name: ty.name.clone(),
                    field_name: field.name.clone(),
                    name: arg.name.clone(),
                    target_type: arg.type_ref.concrete_name().to_string(),
                    default_value: arg.default_value.clone(),
                    is_list: arg.type_ref.is_list(),
                    is_non_null: arg.type_ref.is_non_null(),
                    description: merge_description(mode, &arg.description),
                });
            }
        }
    }

    debug!(
        fields = fields.len(),
        arguments = arguments.len(),
        "merging graph rows"
    );
    for field in &fields {
        catalog.merge_field(field, mode).await?;
    }
    for argument in &arguments {
        catalog.merge_argument(argument, mode).await?;
    }
    Ok(())
}

async fn merge_modules(catalog: &Catalog, meta: &MetaSummary, scope: Option<&Closure>) -> Result<()> {
    for module in &meta.modules {
        if let Some(scope) = scope {
            if !scope.includes_module(&module.name) {
                continue;
            }
        }
        // Modules are structural: insert missing ones, never touch existing
        // rows so their summaries survive any reload.
        catalog
            .merge_module(
                &NewModule {
                    name: module.name.clone(),
                    query_root: module.query_root.clone(),
                    mutation_root: module.mutation_root.clone(),
                    function_root: module.function_root.clone(),
                    mutation_function_root: module.mutation_function_root.clone(),
                    disabled: module.disabled,
                    description: Some(module.description.clone()),
                },
                MergeMode::Insert,
            )
            .await?;
    }
    Ok(())
}

async fn merge_data_sources(
    catalog: &Catalog,
    meta: &MetaSummary,
    scope: Option<&Closure>,
    mode: MergeMode,
) -> Result<()> {
    for source in &meta.data_sources {
        if let Some(scope) = scope {
            if !scope.includes_data_source(&source.name) {
                continue;
            }
        }
        catalog
            .merge_data_source(
                &NewDataSource {
                    name: source.name.clone(),
                    kind: source.kind.clone(),
                    prefix: source.prefix.clone(),
                    as_module: source.as_module,
                    read_only: source.read_only,
                    disabled: source.disabled,
                    description: merge_description(mode, &source.description),
                },
                mode,
            )
            .await?;
    }
    Ok(())
}

async fn merge_data_objects(
    catalog: &Catalog,
    meta: &MetaSummary,
    scope: Option<&Closure>,
) -> Result<()> {
    for object in meta.data_objects() {
        if let Some(scope) = scope {
            if !scope.includes_type(&object.name) {
                continue;
            }
        }

        let module = meta
            .module(&object.module)
            .filter(|m| !m.query_root.is_empty())
            .ok_or_else(|| {
                SchemaScribeError::schema(format!(
                    "module {:?} not found for data object {:?}",
                    object.module, object.name
                ))
            })?;

        let args_type = object
            .arguments
            .as_ref()
            .map(|a| a.type_name.clone())
            .unwrap_or_default();
        let queries = object
            .queries
            .iter()
            .map(|q| NewDataObjectQuery {
                name: q.name.clone(),
                kind: q.kind.clone(),
                query_root: module.query_root.clone(),
            })
            .collect();

        catalog
            .replace_data_object(&NewDataObject {
                name: object.name.clone(),
                filter_type: object.filter_type.clone(),
                args_type,
                queries,
            })
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{geo_fixture, test_catalog};
    use schemascribe_catalog::OwnerPredicate;

    #[tokio::test]
    async fn full_rebuild_projects_every_row() {
        let catalog = test_catalog().await;
        let (graph, meta) = geo_fixture();
        full_rebuild(&catalog, &graph, &meta).await.unwrap();

        let counts = catalog.counts().await.unwrap();
        assert_eq!(counts.types, 21);
        assert_eq!(counts.fields, 26);
        assert_eq!(counts.arguments, 9);
        assert_eq!(counts.modules, 2);
        assert_eq!(counts.data_sources, 3);
        assert_eq!(counts.data_objects, 1);
        assert_eq!(counts.types_summarized, 0);

        let sentinel = catalog.get_type(UNKNOWN_TYPE).await.unwrap().unwrap();
        assert_eq!(sentinel.role, type_role::SCALAR);

        let name = catalog.get_field("cities", "name").await.unwrap().unwrap();
        assert_eq!(name.target_type, "String");
        assert!(!name.is_summarized);

        let filter = catalog
            .get_argument("GeoQuery", "cities", "filter")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(filter.target_type, "cities_filter_input");

        let geo = catalog.get_module("geo").await.unwrap().unwrap();
        assert_eq!(geo.query_root, "GeoQuery");
        assert_eq!(geo.function_root, "GeoFunction");
    }

    #[tokio::test]
    async fn rebuild_twice_is_stable() {
        let catalog = test_catalog().await;
        let (graph, meta) = geo_fixture();
        full_rebuild(&catalog, &graph, &meta).await.unwrap();
        let first = catalog.counts().await.unwrap();
        full_rebuild(&catalog, &graph, &meta).await.unwrap();
        let second = catalog.counts().await.unwrap();
        assert_eq!(first.types, second.types);
        assert_eq!(first.fields, second.fields);
        assert_eq!(first.arguments, second.arguments);
        assert_eq!(first.data_objects, second.data_objects);
    }

    #[tokio::test]
    async fn patch_reconcile_keeps_summarized_text() {
        let catalog = test_catalog().await;
        let (graph, meta) = geo_fixture();
        full_rebuild(&catalog, &graph, &meta).await.unwrap();

        catalog
            .update_type_description("cities", "A short", "A long", true)
            .await
            .unwrap();
        catalog
            .update_field_description("cities", "name", "City name", true)
            .await
            .unwrap();

        reconcile(&catalog, &graph, &meta, None, MergeMode::Patch)
            .await
            .unwrap();

        let ty = catalog.get_type("cities").await.unwrap().unwrap();
        assert_eq!(ty.description, "A short");
        assert_eq!(ty.long_description, "A long");
        assert!(ty.is_summarized);
        let field = catalog.get_field("cities", "name").await.unwrap().unwrap();
        assert_eq!(field.description, "City name");
        assert!(field.is_summarized);
    }

    #[tokio::test]
    async fn scoped_reconcile_skips_rows_outside_the_closure() {
        let catalog = test_catalog().await;
        let (graph, meta) = geo_fixture();
        full_rebuild(&catalog, &graph, &meta).await.unwrap();

        // The function dispatch field and the function's return type are not
        // part of the cities closure; a scoped insert must not revive them.
        catalog
            .delete_fields_where(&[
                OwnerPredicate::field("GeoFunction", "geocode"),
                OwnerPredicate::owner("geocode_result"),
                OwnerPredicate::field("cities", "name"),
            ])
            .await
            .unwrap();

        let scope = schemascribe_closure::for_data_object(&graph, &meta, "cities").unwrap();
        reconcile(&catalog, &graph, &meta, Some(&scope), MergeMode::Insert)
            .await
            .unwrap();

        assert!(catalog.get_field("cities", "name").await.unwrap().is_some());
        assert!(
            catalog
                .get_field("GeoFunction", "geocode")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            catalog
                .get_field("geocode_result", "lat")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn duplicate_argument_is_fatal() {
        let catalog = test_catalog().await;
        let (mut graph, meta) = geo_fixture();
        let root = graph
            .types
            .iter_mut()
            .find(|t| t.name == "GeoQuery")
            .unwrap();
        let dup = root.fields[0].args[0].clone();
        root.fields[0].args.push(dup);

        let err = full_rebuild(&catalog, &graph, &meta).await.unwrap_err();
        assert!(err.to_string().contains("duplicate argument"));
        assert!(err.to_string().contains("GeoQuery.cities.filter"));
    }

    #[tokio::test]
    async fn duplicate_argument_is_fatal_on_a_scoped_reconcile() {
        let catalog = test_catalog().await;
        let (mut graph, meta) = geo_fixture();
        full_rebuild(&catalog, &graph, &meta).await.unwrap();

        let root = graph
            .types
            .iter_mut()
            .find(|t| t.name == "GeoQuery")
            .unwrap();
        let dup = root.fields[0].args[0].clone();
        root.fields[0].args.push(dup);

        let scope = schemascribe_closure::for_data_object(&graph, &meta, "cities").unwrap();
        let err = reconcile(&catalog, &graph, &meta, Some(&scope), MergeMode::Patch)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate argument"));
    }
}
