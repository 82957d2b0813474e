//! Closure computation for partial catalog reloads.
//!
//! Reloading a single data object or function must touch exactly the catalog
//! rows that belong to it: the object type itself, the derived filter and
//! aggregation types, every type reachable through its declared columns, the
//! module root fields that dispatch to it, and the synthetic join types it
//! contributes query fields to. [`for_data_object`] and [`for_function`] walk
//! the schema graph and summary once and return that set as a [`Closure`],
//! which reconciliation then uses as its scope.
//!
//! Two traversal depths apply. Types reachable through a declared column are
//! expanded transitively with all of their fields ("deep"). Types reachable
//! only through relation or query fields are recorded by name without their
//! fields ("shallow"), because they belong to another data object and its own
//! reload owns them.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use schemascribe_introspect::meta::{DataObjectInfo, MetaSummary, ModuleInfo};
use schemascribe_introspect::schema::{SchemaGraph, TypeIntro};
use schemascribe_shared::naming::{
    H3_TYPE, JOIN_AGGREGATION_TYPE, JOIN_TYPE, ROWS_COUNT_FIELD, SPATIAL_AGGREGATION_TYPE,
    SPATIAL_FIELD, SPATIAL_TYPE, UNKNOWN_TYPE, data_source_prefix, list_filter_name,
};
use schemascribe_shared::types::query_kind;
use schemascribe_shared::{Result, SchemaScribeError};

/// Field name under which function namespaces hang off the root query and
/// mutation types.
const FUNCTION_NAMESPACE_FIELD: &str = "function";

// ---------------------------------------------------------------------------
// Closure
// ---------------------------------------------------------------------------

/// The set of catalog rows one root reaches.
///
/// `types` lists every type name in scope. `fields` holds, per type that was
/// expanded or selectively marked, the field names in scope; a type present in
/// `types` but absent from `fields` was recorded shallowly and keeps whatever
/// fields the catalog already has for it.
#[derive(Debug, Clone, Default)]
pub struct Closure {
    pub types: BTreeSet<String>,
    pub fields: BTreeMap<String, BTreeSet<String>>,
    pub modules: BTreeSet<String>,
    pub data_sources: BTreeSet<String>,
}

impl Closure {
    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains(name)
    }

    /// Whether a field of a type is in scope. Only meaningful for types that
    /// have a fields entry; shallow types constrain nothing field-level.
    pub fn contains_field(&self, type_name: &str, field_name: &str) -> bool {
        self.fields
            .get(type_name)
            .is_some_and(|fields| fields.contains(field_name))
    }

    pub fn has_field_entry(&self, type_name: &str) -> bool {
        self.fields.contains_key(type_name)
    }

    /// Scope check for partial loads: an empty dimension constrains nothing.
    pub fn includes_type(&self, name: &str) -> bool {
        self.types.is_empty() || self.types.contains(name)
    }

    /// Scope check for a field under partial loads. With a non-empty field
    /// map the owning type must have an entry and the entry must name the
    /// field; shallow-recorded types therefore keep only their marked fields.
    pub fn includes_field(&self, type_name: &str, field_name: &str) -> bool {
        self.fields.is_empty() || self.contains_field(type_name, field_name)
    }

    pub fn includes_module(&self, name: &str) -> bool {
        self.modules.is_empty() || self.modules.contains(name)
    }

    pub fn includes_data_source(&self, name: &str) -> bool {
        self.data_sources.is_empty() || self.data_sources.contains(name)
    }

    fn record_type(&mut self, name: &str) {
        self.types.insert(name.to_string());
    }

    /// Start a fresh field set for a type, dropping marks from any earlier
    /// pass over the same name.
    fn begin_fields(&mut self, name: &str) {
        self.fields.insert(name.to_string(), BTreeSet::new());
    }

    fn ensure_fields(&mut self, name: &str) {
        self.fields.entry(name.to_string()).or_default();
    }

    fn mark_field(&mut self, type_name: &str, field_name: &str) {
        self.fields
            .entry(type_name.to_string())
            .or_default()
            .insert(field_name.to_string());
    }
}

/// Compute the closure for one data object, addressed by its type name.
pub fn for_data_object(graph: &SchemaGraph, meta: &MetaSummary, name: &str) -> Result<Closure> {
    let mut walk = ClosureWalk::new(graph, meta);
    walk.add_data_object(name)?;
    let closure = walk.into_closure();
    debug!(
        object = name,
        types = closure.types.len(),
        modules = closure.modules.len(),
        "computed data object closure"
    );
    Ok(closure)
}

/// Compute the closure for one function or mutation function of a module.
pub fn for_function(
    graph: &SchemaGraph,
    meta: &MetaSummary,
    module: &str,
    name: &str,
) -> Result<Closure> {
    let mut walk = ClosureWalk::new(graph, meta);
    walk.add_function(module, name)?;
    let closure = walk.into_closure();
    debug!(
        module,
        function = name,
        types = closure.types.len(),
        "computed function closure"
    );
    Ok(closure)
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// One traversal over the graph and summary, accumulating a [`Closure`].
pub struct ClosureWalk<'a> {
    graph: &'a SchemaGraph,
    meta: &'a MetaSummary,
    closure: Closure,
}

impl<'a> ClosureWalk<'a> {
    pub fn new(graph: &'a SchemaGraph, meta: &'a MetaSummary) -> Self {
        Self {
            graph,
            meta,
            closure: Closure::default(),
        }
    }

    pub fn into_closure(self) -> Closure {
        self.closure
    }

    /// Add a data object and everything it reaches to the closure.
    pub fn add_data_object(&mut self, name: &str) -> Result<()> {
        let graph = self.graph;
        let meta = self.meta;
        let ty = self.require_type(name, "type")?;
        let module = meta.module(&ty.module).ok_or_else(|| {
            SchemaScribeError::schema(format!("module {:?} not found in summary", ty.module))
        })?;
        let object = module.data_object(name).ok_or_else(|| {
            SchemaScribeError::schema(format!(
                "data object {name:?} not found in module {:?}",
                ty.module
            ))
        })?;

        // The object type itself: declared columns expand deeply, everything
        // else (references, subqueries, joins) only records the target names.
        self.closure.record_type(name);
        self.closure.begin_fields(name);
        let mut has_spatial = false;
        for field in ty.catalog_fields() {
            if field.name == SPATIAL_FIELD && field.type_ref.concrete_name() == SPATIAL_TYPE {
                has_spatial = true;
            }
            self.closure.mark_field(name, &field.name);
            if !object.is_declared_column(&field.name) {
                self.closure.record_type(field.type_ref.concrete_name());
                for arg in &field.args {
                    self.closure.record_type(arg.type_ref.concrete_name());
                }
                continue;
            }
            self.expand(field.type_ref.concrete_name())?;
            for arg in &field.args {
                self.expand(arg.type_ref.concrete_name())?;
            }
        }

        // Filter input type, same declared-vs-foreign split, then the derived
        // list filter. The list filter only exists for objects reachable as
        // list-valued subqueries, so a missing one is skipped.
        if !object.filter_type.is_empty() {
            let filter_ty = self.require_type(&object.filter_type, "filter type")?;
            self.closure.record_type(&object.filter_type);
            self.closure.begin_fields(&object.filter_type);
            for field in filter_ty.catalog_fields() {
                self.closure.mark_field(&object.filter_type, &field.name);
                if !object.is_declared_column(&field.name) {
                    self.closure.record_type(field.type_ref.concrete_name());
                    continue;
                }
                self.expand(field.type_ref.concrete_name())?;
            }
            let list_filter = list_filter_name(&object.filter_type);
            self.force_expand_if_present(&list_filter)?;
        }

        // Parameterized views carry an arguments input type.
        if let Some(arguments) = &object.arguments {
            if !arguments.type_name.is_empty() {
                self.force_expand_if_present(&arguments.type_name)?;
            }
        }

        if !object.aggregation_type.is_empty() {
            self.add_aggregation_type(object, &object.aggregation_type, "aggregation type")?;
        }
        if !object.sub_aggregation_type.is_empty() {
            self.add_aggregation_type(
                object,
                &object.sub_aggregation_type,
                "sub-aggregation type",
            )?;
        }

        // Bucket aggregations reuse the scalar aggregation machinery, so only
        // the field names are in scope, not their targets.
        if !object.bucket_aggregation_type.is_empty() {
            let bucket_ty =
                self.require_type(&object.bucket_aggregation_type, "bucket-aggregation type")?;
            self.closure.record_type(&object.bucket_aggregation_type);
            self.closure.begin_fields(&object.bucket_aggregation_type);
            for field in bucket_ty.catalog_fields() {
                self.closure
                    .mark_field(&object.bucket_aggregation_type, &field.name);
            }
        }

        // Root query fields of the owning module that dispatch to this
        // object. Returned types are shallow; the objects they name own them.
        if !module.query_root.is_empty() {
            self.closure.record_type(&module.query_root);
            self.closure.ensure_fields(&module.query_root);
            for query in &object.queries {
                self.closure.mark_field(&module.query_root, &query.name);
                if !query.returned_type_name.is_empty() {
                    self.closure.record_type(&query.returned_type_name);
                }
                for arg in &query.arguments {
                    self.expand_if_present(&arg.type_name)?;
                }
            }
        }

        // Mutation root fields plus the insert and update payload types.
        if !module.mutation_root.is_empty() {
            if let Some(mutations) = &object.mutations {
                self.closure.record_type(&module.mutation_root);
                self.closure.ensure_fields(&module.mutation_root);
                if !mutations.insert_mutation.is_empty() {
                    self.closure
                        .mark_field(&module.mutation_root, &mutations.insert_mutation);
                    if let Some(insert_ty) = graph.type_by_name(&mutations.insert_data_type) {
                        self.closure.record_type(&mutations.insert_data_type);
                        self.closure.begin_fields(&mutations.insert_data_type);
                        for field in insert_ty.catalog_fields() {
                            self.closure
                                .mark_field(&mutations.insert_data_type, &field.name);
                            if !object.is_declared_column(&field.name) {
                                self.closure.record_type(field.type_ref.concrete_name());
                                continue;
                            }
                            self.expand(field.type_ref.concrete_name())?;
                        }
                    }
                }
                if !mutations.update_mutation.is_empty() {
                    self.closure
                        .mark_field(&module.mutation_root, &mutations.update_mutation);
                    self.expand_if_present(&mutations.update_data_type)?;
                }
                if !mutations.delete_mutation.is_empty() {
                    self.closure
                        .mark_field(&module.mutation_root, &mutations.delete_mutation);
                }
            }
        }

        // Function namespace types stay shallow: the object does not own
        // their fields, it merely shares the module with them.
        if !module.function_root.is_empty() {
            self.closure.record_type(&module.function_root);
        }
        if !module.mutation_function_root.is_empty() {
            self.closure.record_type(&module.mutation_function_root);
        }

        self.add_module_chain(&module.name)?;

        let prefix = match meta.data_source(&object.data_source) {
            Some(source) => {
                self.closure.data_sources.insert(source.name.clone());
                data_source_prefix(source.as_module, &source.prefix)
            }
            None => String::new(),
        };

        // Synthetic join types collect one query field per list query of
        // every object; single-row lookups never appear there.
        self.closure.record_type(JOIN_TYPE);
        self.closure.ensure_fields(JOIN_TYPE);
        self.closure.record_type(JOIN_AGGREGATION_TYPE);
        self.closure.ensure_fields(JOIN_AGGREGATION_TYPE);
        if has_spatial {
            for synthetic in [SPATIAL_TYPE, SPATIAL_AGGREGATION_TYPE, H3_TYPE] {
                self.closure.record_type(synthetic);
                self.closure.ensure_fields(synthetic);
            }
        }
        for query in &object.queries {
            if query.kind == query_kind::SELECT_ONE {
                continue;
            }
            let field_name = format!("{prefix}{}", query.name);
            self.closure.mark_field(JOIN_TYPE, &field_name);
            self.closure.mark_field(JOIN_AGGREGATION_TYPE, &field_name);
            if has_spatial {
                self.closure.mark_field(SPATIAL_TYPE, &field_name);
                self.closure.mark_field(SPATIAL_AGGREGATION_TYPE, &field_name);
                self.closure.mark_field(H3_TYPE, &field_name);
            }
        }
        Ok(())
    }

    /// Add a function or mutation function and everything it reaches.
    pub fn add_function(&mut self, module_name: &str, name: &str) -> Result<()> {
        let meta = self.meta;
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

        // Return and argument types may be shared scalars or types owned by
        // other objects, so missing ones are skipped rather than fatal.
        self.force_expand_if_present(&function.return_type)?;
        for arg in &function.arguments {
            self.expand_if_present(&arg.type_name)?;
        }
        if !function.aggregation_type.is_empty() {
            self.force_expand_if_present(&function.aggregation_type)?;
        }
        if !function.sub_aggregation_type.is_empty() {
            self.force_expand_if_present(&function.sub_aggregation_type)?;
        }
        if !function.bucket_aggregation_type.is_empty() {
            self.force_expand_if_present(&function.bucket_aggregation_type)?;
        }

        let root = if is_mutation {
            &module.mutation_function_root
        } else {
            &module.function_root
        };
        if !root.is_empty() {
            self.closure.record_type(root);
            self.closure.mark_field(root, name);
        }

        self.add_module_chain(&module.name)?;

        if !function.data_source.is_empty() {
            self.closure
                .data_sources
                .insert(function.data_source.clone());
        }
        Ok(())
    }

    /// Deep expansion: record a type, every field, and recurse into each
    /// field and argument target until the reachable set is closed.
    ///
    /// An unresolvable name is fatal, with one exception: the `Unknown`
    /// sentinel stands in for unnamed type references and is recorded as a
    /// leaf even when the graph does not declare it.
    pub fn expand(&mut self, type_name: &str) -> Result<()> {
        let graph = self.graph;
        if type_name == UNKNOWN_TYPE && graph.type_by_name(type_name).is_none() {
            self.closure.record_type(type_name);
            return Ok(());
        }
        let ty = self.require_type(type_name, "type")?;
        if self.closure.types.contains(type_name) {
            return Ok(());
        }
        self.closure.record_type(type_name);
        self.closure.ensure_fields(type_name);
        for field in ty.catalog_fields() {
            self.closure.mark_field(type_name, &field.name);
            for arg in &field.args {
                let target = arg.type_ref.concrete_name();
                if !self.closure.types.contains(target) {
                    self.expand(target)?;
                }
            }
            let target = field.type_ref.concrete_name();
            if !self.closure.types.contains(target) {
                self.expand(target)?;
            }
        }
        Ok(())
    }

    /// Expand a type even when an earlier shallow pass already recorded it,
    /// so its fields entry gets filled in.
    fn force_expand(&mut self, type_name: &str) -> Result<()> {
        self.closure.types.remove(type_name);
        self.expand(type_name)
    }

    /// Speculative expansion of a name that may not exist in the graph.
    fn expand_if_present(&mut self, type_name: &str) -> Result<()> {
        if self.graph.type_by_name(type_name).is_none() {
            debug!(type_name, "referenced type not in schema graph, skipping");
            return Ok(());
        }
        self.expand(type_name)
    }

    fn force_expand_if_present(&mut self, type_name: &str) -> Result<()> {
        if self.graph.type_by_name(type_name).is_none() {
            debug!(type_name, "derived type not in schema graph, skipping");
            return Ok(());
        }
        self.force_expand(type_name)
    }

    /// Aggregation types mirror the object's columns plus scalar roll-up
    /// fields like `_rows_count`, which expand deeply alongside the declared
    /// columns.
    fn add_aggregation_type(
        &mut self,
        object: &DataObjectInfo,
        type_name: &str,
        what: &str,
    ) -> Result<()> {
        let ty = self.require_type(type_name, what)?;
        self.closure.record_type(type_name);
        self.closure.begin_fields(type_name);
        for field in ty.catalog_fields() {
            self.closure.mark_field(type_name, &field.name);
            if !object.is_declared_column(&field.name) && field.name != ROWS_COUNT_FIELD {
                self.closure.record_type(field.type_ref.concrete_name());
                for arg in &field.args {
                    self.closure.record_type(arg.type_ref.concrete_name());
                }
                continue;
            }
            self.expand(field.type_ref.concrete_name())?;
            for arg in &field.args {
                self.expand(arg.type_ref.concrete_name())?;
            }
        }
        Ok(())
    }

    /// Walk the module path from the root down, putting every ancestor in
    /// scope and marking the submodule dispatch field each parent root type
    /// carries for its child. Root-level roots additionally expose the
    /// function namespace under a literal `function` field.
    fn add_module_chain(&mut self, module_name: &str) -> Result<()> {
        let meta = self.meta;
        let default_root = ModuleInfo::default();
        let root = meta.module("").unwrap_or(&default_root);
        let mut parent = root;
        self.closure.modules.insert(String::new());
        let segments: Vec<&str> = module_name.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            let child_name = segments[..=i].join(".");
            self.closure.modules.insert(child_name.clone());
            let child = if child_name.is_empty() {
                root
            } else {
                meta.module(&child_name).ok_or_else(|| {
                    SchemaScribeError::schema(format!(
                        "parent module {child_name:?} not found in summary"
                    ))
                })?
            };
            if !parent.query_root.is_empty() {
                self.closure.record_type(&parent.query_root);
                self.closure.ensure_fields(&parent.query_root);
                if !child.query_root.is_empty() {
                    self.closure.mark_field(&parent.query_root, segment);
                }
                if !parent.function_root.is_empty() && parent.name.is_empty() {
                    self.closure
                        .mark_field(&parent.query_root, FUNCTION_NAMESPACE_FIELD);
                }
            }
            if !parent.mutation_root.is_empty() {
                self.closure.record_type(&parent.mutation_root);
                self.closure.ensure_fields(&parent.mutation_root);
                if !child.mutation_root.is_empty() {
                    self.closure.mark_field(&parent.mutation_root, segment);
                }
                if !parent.mutation_function_root.is_empty() && parent.name.is_empty() {
                    self.closure
                        .mark_field(&parent.mutation_root, FUNCTION_NAMESPACE_FIELD);
                }
            }
            if !parent.function_root.is_empty() {
                self.closure.record_type(&parent.function_root);
                if !child.function_root.is_empty() {
                    self.closure.mark_field(&parent.function_root, segment);
                }
            }
            if !parent.mutation_function_root.is_empty() {
                self.closure.record_type(&parent.mutation_function_root);
                if !child.mutation_function_root.is_empty() {
                    self.closure
                        .mark_field(&parent.mutation_function_root, segment);
                }
            }
            parent = child;
        }
        Ok(())
    }

    fn require_type(&self, type_name: &str, what: &str) -> Result<&'a TypeIntro> {
        let graph = self.graph;
        graph.type_by_name(type_name).ok_or_else(|| {
            SchemaScribeError::schema(format!("{what} {type_name:?} not found in schema graph"))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
