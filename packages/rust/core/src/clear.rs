//! Row removal ahead of a replace-mode reload.
//!
//! A replace reload deletes every field and argument row a data object or
//! function contributed before reinserting them from the fresh graph, so
//! columns dropped upstream disappear from the catalog. Type, module, and
//! data-source rows stay in place; only their field-level rows are cleared.
//! Arguments go first because they reference fields.

use tracing::{debug, instrument};

use schemascribe_catalog::{Catalog, OwnerPredicate};
use schemascribe_introspect::{MetaSummary, SchemaGraph};
use schemascribe_shared::naming::{
    H3_TYPE, JOIN_AGGREGATION_TYPE, JOIN_TYPE, SPATIAL_AGGREGATION_TYPE, SPATIAL_TYPE,
    data_source_prefix, list_filter_name,
};
use schemascribe_shared::{Result, SchemaScribeError};

/// Delete the field and argument rows belonging to one data object.
#[instrument(skip_all, fields(object = %name))]
pub async fn clear_data_object(
    catalog: &Catalog,
    graph: &SchemaGraph,
    meta: &MetaSummary,
    name: &str,
) -> Result<()> {
    let ty = graph.type_by_name(name).ok_or_else(|| {
        SchemaScribeError::schema(format!("type {name:?} not found in schema graph"))
    })?;
    let module = meta.module(&ty.module).ok_or_else(|| {
        SchemaScribeError::schema(format!("module {:?} not found in summary", ty.module))
    })?;
    let object = module.data_object(name).ok_or_else(|| {
        SchemaScribeError::schema(format!(
            "data object {name:?} not found in module {:?}",
            ty.module
        ))
    })?;

    let mut field_preds = Vec::new();
    let mut arg_preds = Vec::new();

    // Types the object owns outright lose all of their fields.
    field_preds.push(OwnerPredicate::owner(&object.name));
    arg_preds.push(OwnerPredicate::owner(&object.name));
    if !object.filter_type.is_empty() {
        field_preds.push(OwnerPredicate::owner(&object.filter_type));
        field_preds.push(OwnerPredicate::owner(list_filter_name(&object.filter_type)));
    }
    if let Some(arguments) = &object.arguments {
        if !arguments.type_name.is_empty() {
            field_preds.push(OwnerPredicate::owner(&arguments.type_name));
        }
    }
    for agg in [
        &object.aggregation_type,
        &object.sub_aggregation_type,
        &object.bucket_aggregation_type,
    ] {
        if !agg.is_empty() {
            field_preds.push(OwnerPredicate::owner(agg));
            arg_preds.push(OwnerPredicate::owner(agg));
        }
    }
    if let Some(mutations) = &object.mutations {
        if !mutations.insert_data_type.is_empty() {
            field_preds.push(OwnerPredicate::owner(&mutations.insert_data_type));
        }
        if !mutations.update_data_type.is_empty() {
            field_preds.push(OwnerPredicate::owner(&mutations.update_data_type));
        }
    }

    // Root query fields the object contributes.
    if !module.query_root.is_empty() {
        for query in &object.queries {
            field_preds.push(OwnerPredicate::field(&module.query_root, &query.name));
            arg_preds.push(OwnerPredicate::field(&module.query_root, &query.name));
        }
    }

    // Root mutation fields.
    if !module.mutation_root.is_empty() {
        if let Some(mutations) = &object.mutations {
            for mutation in [
                &mutations.insert_mutation,
                &mutations.update_mutation,
                &mutations.delete_mutation,
            ] {
                if !mutation.is_empty() {
                    field_preds.push(OwnerPredicate::field(&module.mutation_root, mutation));
                    arg_preds.push(OwnerPredicate::field(&module.mutation_root, mutation));
                }
            }
        }
    }

    // Query fields projected into the synthetic join and spatial types.
    let prefix = meta
        .data_source(&object.data_source)
        .map(|ds| data_source_prefix(ds.as_module, &ds.prefix))
        .unwrap_or_default();
    for query in &object.queries {
        let field_name = format!("{prefix}{}", query.name);
        for synthetic in [JOIN_TYPE, JOIN_AGGREGATION_TYPE] {
            field_preds.push(OwnerPredicate::field(synthetic, &field_name));
            arg_preds.push(OwnerPredicate::field(synthetic, &field_name));
        }
        if object.has_geometry {
            for synthetic in [SPATIAL_TYPE, SPATIAL_AGGREGATION_TYPE, H3_TYPE] {
                field_preds.push(OwnerPredicate::field(synthetic, &field_name));
                arg_preds.push(OwnerPredicate::field(synthetic, &field_name));
            }
        }
    }

    let arguments_deleted = catalog.delete_arguments_where(&arg_preds).await?;
    let fields_deleted = catalog.delete_fields_where(&field_preds).await?;
    debug!(arguments_deleted, fields_deleted, "cleared data object rows");
    Ok(())
}

/// Delete the field and argument rows belonging to one function or mutation
/// function.
#[instrument(skip_all, fields(module = %module_name, function = %name))]
pub async fn clear_function(
    catalog: &Catalog,
    meta: &MetaSummary,
    module_name: &str,
    name: &str,
) -> Result<()> {
    let module = meta.module(module_name).ok_or_else(|| {
        SchemaScribeError::schema(format!("module {module_name:?} not found in summary"))
    })?;
    let (function, is_mutation) = match module.function(name) {
        Some(f) => (f, false),
        None => match module.mutation_function(name) {
            Some(f) => (f, true),
            None => {
                return Err(SchemaScribeError::schema(format!(
                    "function {name:?} not found in module {module_name:?}"
                )));
            }
        },
    };

    let mut field_preds = Vec::new();
    let mut arg_preds = Vec::new();

    if !function.return_type.is_empty() {
        field_preds.push(OwnerPredicate::owner(&function.return_type));
        arg_preds.push(OwnerPredicate::owner(&function.return_type));
    }
    // Argument input types lose their fields but carry no nested arguments.
    for arg in &function.arguments {
        if !arg.type_name.is_empty() {
            field_preds.push(OwnerPredicate::owner(&arg.type_name));
        }
    }
    for agg in [
        &function.aggregation_type,
        &function.sub_aggregation_type,
        &function.bucket_aggregation_type,
    ] {
        if !agg.is_empty() {
            field_preds.push(OwnerPredicate::owner(agg));
            arg_preds.push(OwnerPredicate::owner(agg));
        }
    }

    let root = if is_mutation {
        &module.mutation_function_root
    } else {
        &module.function_root
    };
    if !root.is_empty() {
        field_preds.push(OwnerPredicate::field(root, name));
        arg_preds.push(OwnerPredicate::field(root, name));
    }

    let arguments_deleted = catalog.delete_arguments_where(&arg_preds).await?;
    let fields_deleted = catalog.delete_fields_where(&field_preds).await?;
    debug!(arguments_deleted, fields_deleted, "cleared function rows");
    Ok(())
}
