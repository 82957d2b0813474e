//! Three-phase summarization orchestrator.
//!
//! Phase 1 summarizes data objects and functions, phase 2 data sources,
//! phase 3 modules. Later phases fold the earlier results into their prompts,
//! which is why the phases run sequentially while the tasks inside a phase
//! fan out concurrently. Each task acquires a pool connection before doing
//! any work, so the pool capacity bounds in-flight tasks as well as provider
//! calls. A failed task is logged and counted; it never aborts the run.
//! Tasks live in a [`JoinSet`], so dropping the run mid-phase aborts whatever
//! is still in flight and releases its pool permit.
//!
//! Modules are walked one tree level at a time, deepest first, so a parent
//! module's prompt and dispatch fields see its children's finished summaries.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};
use tracing::{debug, info, instrument, warn};

use schemascribe_catalog::Catalog;
use schemascribe_introspect::MetaSummary;
use schemascribe_introspect::meta::{DataObjectInfo, ReferenceInfo};
use schemascribe_pool::Pool;
use schemascribe_shared::naming::{H3_TYPE, JOIN_TYPE, SPATIAL_TYPE, data_source_prefix};
use schemascribe_shared::types::{data_source_kind, field_role, query_kind, type_role};
use schemascribe_shared::{
    DataSourceRow, FieldRow, ModuleRow, Result, SchemaScribeError, TypeRow,
};

use crate::pipeline::ProgressReporter;
use crate::prompts::{
    self, DataObjectSummary, DataSourceSummary, FunctionSummary, ModuleSummary, NamedBrief,
    RelationSummary, SourceContext,
};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-kind task counts for one summarization run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl TaskCounts {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Succeeded => self.succeeded += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Result of [`summarize_all`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SummarizeReport {
    pub data_objects: TaskCounts,
    pub functions: TaskCounts,
    pub data_sources: TaskCounts,
    pub modules: TaskCounts,
}

impl SummarizeReport {
    pub fn succeeded(&self) -> usize {
        self.data_objects.succeeded
            + self.functions.succeeded
            + self.data_sources.succeeded
            + self.modules.succeeded
    }

    pub fn failed(&self) -> usize {
        self.data_objects.failed
            + self.functions.failed
            + self.data_sources.failed
            + self.modules.failed
    }

    fn counts_mut(&mut self, kind: TaskKind) -> &mut TaskCounts {
        match kind {
            TaskKind::DataObject => &mut self.data_objects,
            TaskKind::Function => &mut self.functions,
            TaskKind::DataSource => &mut self.data_sources,
            TaskKind::Module => &mut self.modules,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TaskKind {
    DataObject,
    Function,
    DataSource,
    Module,
}

impl TaskKind {
    fn label(self) -> &'static str {
        match self {
            TaskKind::DataObject => "data object",
            TaskKind::Function => "function",
            TaskKind::DataSource => "data source",
            TaskKind::Module => "module",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TaskOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// One phase's fan-out. The inner [`JoinSet`] aborts every remaining task
/// when the batch is dropped, so cancelling the orchestrating future also
/// cancels outstanding provider calls and blocked pool-acquire waiters.
struct TaskBatch {
    tasks: JoinSet<Result<()>>,
    labels: HashMap<Id, (TaskKind, String)>,
}

impl TaskBatch {
    fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            labels: HashMap::new(),
        }
    }

    fn spawn<F>(&mut self, kind: TaskKind, name: String, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let id = self.tasks.spawn(task).id();
        self.labels.insert(id, (kind, name));
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Summarize everything the catalog still has pending.
#[instrument(skip_all, fields(max_graph_depth = max_graph_depth))]
pub async fn summarize_all(
    catalog: &Arc<Catalog>,
    meta: &Arc<MetaSummary>,
    pool: &Pool,
    max_graph_depth: u32,
    progress: &dyn ProgressReporter,
) -> Result<SummarizeReport> {
    let mut report = SummarizeReport::default();

    // --- Phase 1: data objects and functions ---
    let pending_objects = catalog.types_pending_summary().await?;
    let pending_functions = catalog.function_fields_pending().await?;
    if pending_objects.is_empty() && pending_functions.is_empty() {
        info!("no data objects or functions pending summarization");
    } else {
        progress.phase("Summarizing data objects and functions");
        let mut batch = TaskBatch::new();
        for row in pending_objects {
            let catalog = Arc::clone(catalog);
            let meta = Arc::clone(meta);
            let pool = pool.clone();
            batch.spawn(TaskKind::DataObject, object_path(&row), async move {
                summarize_data_object(&catalog, &meta, &pool, max_graph_depth, &row).await
            });
        }
        for row in pending_functions {
            let catalog = Arc::clone(catalog);
            let meta = Arc::clone(meta);
            let pool = pool.clone();
            batch.spawn(TaskKind::Function, row.name.clone(), async move {
                summarize_function(&catalog, &meta, &pool, &row).await
            });
        }
        drain(batch, progress, &mut report).await;
    }

    // --- Phase 2: data sources ---
    let mut pending_sources = catalog.data_sources_pending().await?;
    pending_sources.retain(|s| s.kind != data_source_kind::EXTENSION);
    if pending_sources.is_empty() {
        info!("no data sources pending summarization");
    } else {
        progress.phase("Summarizing data sources");
        let mut batch = TaskBatch::new();
        for row in pending_sources {
            let catalog = Arc::clone(catalog);
            let pool = pool.clone();
            batch.spawn(TaskKind::DataSource, row.name.clone(), async move {
                summarize_data_source(&catalog, &pool, &row).await
            });
        }
        drain(batch, progress, &mut report).await;
    }

    // --- Phase 3: modules, deepest level first ---
    let pending_modules = catalog.modules_pending().await?;
    if pending_modules.is_empty() {
        info!("no modules pending summarization");
    } else {
        progress.phase("Summarizing modules");
        let mut levels: BTreeMap<usize, Vec<ModuleRow>> = BTreeMap::new();
        for row in pending_modules {
            levels.entry(row.depth()).or_default().push(row);
        }
        for (_, level) in levels.into_iter().rev() {
            let mut batch = TaskBatch::new();
            for row in level {
                let catalog = Arc::clone(catalog);
                let pool = pool.clone();
                batch.spawn(TaskKind::Module, row.name.clone(), async move {
                    summarize_module(&catalog, &pool, &row).await
                });
            }
            drain(batch, progress, &mut report).await;
        }
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "summarization run finished"
    );
    Ok(report)
}

/// Await a batch of tasks, counting outcomes without aborting on failures.
async fn drain(mut batch: TaskBatch, progress: &dyn ProgressReporter, report: &mut SummarizeReport) {
    let total = batch.tasks.len();
    let mut finished = 0;
    while let Some(joined) = batch.tasks.join_next_with_id().await {
        finished += 1;
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => {
                let id = e.id();
                (id, Err(SchemaScribeError::Summarize(format!("task panicked: {e}"))))
            }
        };
        let Some((kind, name)) = batch.labels.remove(&id) else {
            continue;
        };
        let outcome = match result {
            Ok(()) => TaskOutcome::Succeeded,
            Err(e) if e.is_no_data() => {
                debug!(kind = kind.label(), name, "nothing to summarize");
                TaskOutcome::Skipped
            }
            Err(e) => {
                warn!(kind = kind.label(), name, error = %e, "summarization task failed");
                TaskOutcome::Failed
            }
        };
        report.counts_mut(kind).record(outcome);
        progress.task_completed(
            kind.label(),
            &name,
            matches!(outcome, TaskOutcome::Succeeded),
            finished,
            total,
        );
    }
}

fn object_path(row: &TypeRow) -> String {
    if row.module.is_empty() {
        row.name.clone()
    } else {
        format!("{}.{}", row.module, row.name)
    }
}

// ---------------------------------------------------------------------------
// Data object tasks
// ---------------------------------------------------------------------------

async fn summarize_data_object(
    catalog: &Catalog,
    meta: &MetaSummary,
    pool: &Pool,
    max_graph_depth: u32,
    row: &TypeRow,
) -> Result<()> {
    let connection = pool.acquire().await?;
    let path = object_path(row);
    let object = if row.role == type_role::VIEW {
        meta.view(&path)
    } else {
        meta.table(&path)
    }
    .ok_or_else(|| {
        SchemaScribeError::schema(format!("data object {path:?} not found in summary"))
    })?;

    let input = prompts::data_object_input(meta, object, max_graph_depth)?;
    let reply = connection.summarize(&prompts::data_object_task(input)).await?;
    let summary: DataObjectSummary = prompts::parse_summary(&reply)?;
    apply_data_object_summary(catalog, meta, object, &summary).await
}

async fn apply_data_object_summary(
    catalog: &Catalog,
    meta: &MetaSummary,
    object: &DataObjectInfo,
    summary: &DataObjectSummary,
) -> Result<()> {
    let has_agg = !object.aggregation_type.is_empty();
    let has_sub_agg = !object.sub_aggregation_type.is_empty();

    // Column and extra-field descriptions, mirrored onto the aggregation
    // types that repeat the same field names.
    for (name, text) in summary.fields.iter().chain(summary.extra_fields.iter()) {
        catalog
            .update_field_description(&object.name, name, text, true)
            .await?;
        if has_agg {
            catalog
                .update_field_description(&object.aggregation_type, name, text, true)
                .await?;
        }
        if has_sub_agg {
            catalog
                .update_field_description(&object.sub_aggregation_type, name, text, true)
                .await?;
        }
    }

    // Filter type: per-field texts, then the row description.
    if !object.filter_type.is_empty() {
        for (name, text) in summary
            .filter
            .fields
            .iter()
            .chain(summary.filter.references.iter())
        {
            catalog
                .update_field_description(&object.filter_type, name, text, true)
                .await?;
        }
        catalog
            .update_type_description(&object.filter_type, &summary.filter.row, "", true)
            .await?;
    }

    // Relation query fields.
    for reference in &object.references {
        let Some(text) = summary.references.get(&reference.name) else {
            debug!(object = %object.name, reference = %reference.name, "no summary for reference");
            continue;
        };
        apply_relation_summary(catalog, object, reference, text, true).await?;
    }
    for subquery in &object.subqueries {
        let Some(text) = summary.subqueries.get(&subquery.name) else {
            debug!(object = %object.name, subquery = %subquery.name, "no summary for subquery");
            continue;
        };
        apply_relation_summary(catalog, object, subquery, text, false).await?;
    }

    // Function call fields.
    for call in &object.function_calls {
        let Some(text) = summary.function_calls.get(&call.name) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        catalog
            .update_field_description(&object.name, &call.field_name, text, true)
            .await?;
        if has_agg {
            catalog
                .update_field_description(&object.aggregation_type, &call.field_name, text, true)
                .await?;
        }
    }

    // Root query fields, plus the synthetic join and spatial projections for
    // kinds that appear there.
    let module_row = catalog.get_module(&object.module).await?.ok_or_else(|| {
        SchemaScribeError::schema(format!("module {:?} not found in catalog", object.module))
    })?;
    let prefix = meta
        .data_source(&object.data_source)
        .map(|ds| data_source_prefix(ds.as_module, &ds.prefix))
        .unwrap_or_default();
    for query in &object.queries {
        let Some(text) = summary.queries.get(&query.name) else {
            debug!(object = %object.name, query = %query.name, "no summary for query");
            continue;
        };
        catalog
            .update_field_description(&module_row.query_root, &query.name, text, true)
            .await?;
        if matches!(
            query.kind.as_str(),
            query_kind::SELECT_ONE | query_kind::H3 | query_kind::JQ
        ) {
            continue;
        }
        let field_name = format!("{prefix}{}", query.name);
        for synthetic in [JOIN_TYPE, SPATIAL_TYPE, H3_TYPE] {
            catalog
                .update_field_description(synthetic, &field_name, text, true)
                .await?;
        }
    }

    // Mutation root fields.
    if object.mutations.is_some()
        && !summary.mutations.is_empty()
        && !module_row.mutation_root.is_empty()
    {
        for (name, text) in &summary.mutations {
            if text.is_empty() {
                continue;
            }
            catalog
                .update_field_description(&module_row.mutation_root, name, text, true)
                .await?;
        }
    }

    // View arguments.
    if let Some(arguments) = &object.arguments {
        if !summary.arguments.short.is_empty() {
            for field in &arguments.nested_fields {
                let Some(text) = summary.arguments.fields.get(&field.name) else {
                    continue;
                };
                catalog
                    .update_field_description(&arguments.type_name, &field.name, text, true)
                    .await?;
            }
            catalog
                .update_type_description(&arguments.type_name, &summary.arguments.short, "", true)
                .await?;
        }
    }

    // The object type last, so a failure above leaves it pending for a rerun.
    catalog
        .update_type_description(&object.name, &summary.short, &summary.long, true)
        .await?;
    if has_agg && !summary.aggregation_type_short.is_empty() {
        catalog
            .update_type_description(
                &object.aggregation_type,
                &summary.aggregation_type_short,
                &summary.aggregation_type_long,
                true,
            )
            .await?;
    }
    if has_sub_agg && !summary.sub_aggregation_type_short.is_empty() {
        catalog
            .update_type_description(
                &object.sub_aggregation_type,
                &summary.sub_aggregation_type_short,
                &summary.sub_aggregation_type_long,
                true,
            )
            .await?;
    }
    if !object.bucket_aggregation_type.is_empty()
        && !summary.bucket_aggregation_type_short.is_empty()
    {
        catalog
            .update_type_description(
                &object.bucket_aggregation_type,
                &summary.bucket_aggregation_type_short,
                &summary.bucket_aggregation_type_long,
                true,
            )
            .await?;
    }
    Ok(())
}

/// Write one relation's texts onto the owning object and its aggregation
/// types. References require a named aggregation query field before the
/// object-level aggregation text applies; subqueries do not carry that guard.
async fn apply_relation_summary(
    catalog: &Catalog,
    object: &DataObjectInfo,
    relation: &ReferenceInfo,
    text: &RelationSummary,
    require_agg_field: bool,
) -> Result<()> {
    if !text.select.is_empty() {
        catalog
            .update_field_description(&object.name, &relation.field_data_query, &text.select, true)
            .await?;
    }
    if !text.select_agg.is_empty() && (!require_agg_field || !relation.field_agg_query.is_empty()) {
        catalog
            .update_field_description(
                &object.name,
                &relation.field_agg_query,
                &text.select_agg,
                true,
            )
            .await?;
    }
    if !text.select_bucket_agg.is_empty() && !relation.field_bucket_agg_query.is_empty() {
        catalog
            .update_field_description(
                &object.name,
                &relation.field_bucket_agg_query,
                &text.select_bucket_agg,
                true,
            )
            .await?;
    }
    if !object.aggregation_type.is_empty() && !text.select.is_empty() {
        catalog
            .update_field_description(
                &object.aggregation_type,
                &relation.field_data_query,
                &text.select,
                true,
            )
            .await?;
        if !relation.field_agg_query.is_empty() {
            catalog
                .update_field_description(
                    &object.aggregation_type,
                    &relation.field_agg_query,
                    &text.select_agg,
                    true,
                )
                .await?;
        }
    }
    // Sub-aggregation types expose relations under the data field name but
    // return aggregated shapes, so they take the aggregation text.
    if !object.sub_aggregation_type.is_empty()
        && !relation.field_agg_query.is_empty()
        && !text.select_agg.is_empty()
    {
        catalog
            .update_field_description(
                &object.sub_aggregation_type,
                &relation.field_data_query,
                &text.select_agg,
                true,
            )
            .await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Function tasks
// ---------------------------------------------------------------------------

async fn summarize_function(
    catalog: &Catalog,
    meta: &MetaSummary,
    pool: &Pool,
    row: &FieldRow,
) -> Result<()> {
    let connection = pool.acquire().await?;
    let module_row = catalog
        .module_by_root_type(&row.type_name)
        .await?
        .ok_or_else(|| {
            SchemaScribeError::schema(format!(
                "module with root type {:?} not found in catalog",
                row.type_name
            ))
        })?;
    let path = if module_row.name.is_empty() {
        row.name.clone()
    } else {
        format!("{}.{}", module_row.name, row.name)
    };
    let function = meta
        .function(&path)
        .or_else(|| meta.mutation_function(&path))
        .ok_or_else(|| {
            SchemaScribeError::schema(format!("function {path:?} not found in summary"))
        })?;

    let input = prompts::function_input(meta, &module_row.name, function)?;
    let reply = connection.summarize(&prompts::function_task(input)).await?;
    let summary: FunctionSummary = prompts::parse_summary(&reply)?;

    catalog
        .update_field_description(&row.type_name, &row.name, &summary.long, true)
        .await?;
    for argument in &function.arguments {
        let Some(text) = summary.parameters.get(&argument.name) else {
            continue;
        };
        catalog
            .update_argument_description(&row.type_name, &row.name, &argument.name, text)
            .await?;
    }
    if !summary.returns.fields.is_empty() {
        catalog
            .update_type_description(
                &function.return_type,
                &summary.returns.short,
                &summary.long,
                true,
            )
            .await?;
    }
    for field in &function.return_type_fields {
        let Some(text) = summary.returns.fields.get(&field.name) else {
            continue;
        };
        catalog
            .update_field_description(&function.return_type, &field.name, text, true)
            .await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Data source tasks
// ---------------------------------------------------------------------------

async fn summarize_data_source(
    catalog: &Catalog,
    pool: &Pool,
    row: &DataSourceRow,
) -> Result<()> {
    let connection = pool.acquire().await?;
    let tables = type_briefs(catalog.data_source_types(&row.name, type_role::TABLE).await?);
    let views = type_briefs(catalog.data_source_types(&row.name, type_role::VIEW).await?);
    let functions: Vec<NamedBrief> = catalog
        .data_source_function_fields(&row.name)
        .await?
        .into_iter()
        .map(|f| NamedBrief {
            name: f.name,
            description: f.description,
        })
        .collect();
    let submodules: Vec<NamedBrief> = catalog
        .data_source_modules(&row.name)
        .await?
        .into_iter()
        .map(|m| NamedBrief {
            name: m.name,
            description: m.description,
        })
        .collect();
    // A source no object or function references has nothing to say.
    if tables.is_empty() && views.is_empty() && functions.is_empty() {
        return Err(SchemaScribeError::NoData);
    }

    let input = prompts::data_source_input(row, tables, views, functions, submodules)?;
    let reply = connection.summarize(&prompts::data_source_task(input)).await?;
    let summary: DataSourceSummary = prompts::parse_summary(&reply)?;
    catalog
        .update_data_source_description(&row.name, &summary.short, &summary.long, true)
        .await?;
    Ok(())
}

fn type_briefs(rows: Vec<TypeRow>) -> Vec<NamedBrief> {
    rows.into_iter()
        .map(|r| NamedBrief {
            name: r.name,
            description: r.description,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Module tasks
// ---------------------------------------------------------------------------

async fn summarize_module(catalog: &Catalog, pool: &Pool, row: &ModuleRow) -> Result<()> {
    let connection = pool.acquire().await?;
    let tables = catalog
        .module_types_by_role(&row.name, type_role::TABLE)
        .await?;
    let views = catalog
        .module_types_by_role(&row.name, type_role::VIEW)
        .await?;
    let roots: Vec<String> = [
        &row.query_root,
        &row.mutation_root,
        &row.function_root,
        &row.mutation_function_root,
    ]
    .into_iter()
    .filter(|r| !r.is_empty())
    .cloned()
    .collect();
    let functions = catalog
        .module_root_fields(&roots, field_role::FUNCTION)
        .await?;
    let mut_functions = catalog
        .module_root_fields(&roots, field_role::MUTATION_FUNCTION)
        .await?;
    let submodules = catalog
        .module_root_fields(&roots, field_role::SUBMODULE)
        .await?;

    // Data sources referenced by the module's own rows, plus the source the
    // module may be a mount of.
    let mut referenced: BTreeSet<String> = BTreeSet::new();
    for t in tables.iter().chain(views.iter()) {
        if !t.catalog.is_empty() {
            referenced.insert(t.catalog.clone());
        }
    }
    for f in functions.iter().chain(mut_functions.iter()) {
        if !f.catalog.is_empty() {
            referenced.insert(f.catalog.clone());
        }
    }
    let mut names: Vec<String> = vec![row.name.clone()];
    names.extend(referenced.iter().cloned());
    let mut sources = catalog.data_sources_by_names(&names).await?;
    sources.retain(|s| !(s.name == row.name && !s.as_module && !referenced.contains(&s.name)));
    let contexts: Vec<SourceContext> = sources.iter().map(SourceContext::from_row).collect();

    let input = prompts::module_input(
        row,
        brief_map(tables.iter().map(|t| (&t.name, &t.description))),
        brief_map(views.iter().map(|t| (&t.name, &t.description))),
        brief_map(functions.iter().map(|f| (&f.name, &f.description))),
        brief_map(mut_functions.iter().map(|f| (&f.name, &f.description))),
        brief_map(submodules.iter().map(|f| (&f.name, &f.description))),
        contexts,
    )?;
    let reply = connection.summarize(&prompts::module_task(input)).await?;
    let summary: ModuleSummary = prompts::parse_summary(&reply)?;
    apply_module_summary(catalog, row, &summary).await
}

fn brief_map<'a>(
    rows: impl Iterator<Item = (&'a String, &'a String)>,
) -> BTreeMap<String, String> {
    rows.map(|(name, description)| (name.clone(), description.clone()))
        .collect()
}

async fn apply_module_summary(
    catalog: &Catalog,
    module: &ModuleRow,
    summary: &ModuleSummary,
) -> Result<()> {
    // Root type descriptions.
    let root_texts = [
        (&module.query_root, &summary.query_type),
        (&module.mutation_root, &summary.mutation_type),
        (&module.function_root, &summary.function_type),
        (&module.mutation_function_root, &summary.mutation_function_type),
    ];
    for (root, text) in root_texts {
        if !root.is_empty() && !text.is_empty() {
            catalog.update_type_description(root, text, "", true).await?;
        }
    }

    // Propagate root summaries onto the parent's submodule dispatch fields.
    if let Some((parent_name, leaf)) = module.name.rsplit_once('.') {
        let parent = catalog.get_module(parent_name).await?.ok_or_else(|| {
            SchemaScribeError::schema(format!(
                "parent module {parent_name:?} not found in catalog"
            ))
        })?;
        let parent_roots = [
            (&parent.query_root, &summary.query_type),
            (&parent.mutation_root, &summary.mutation_type),
            (&parent.function_root, &summary.function_type),
            (&parent.mutation_function_root, &summary.mutation_function_type),
        ];
        for (root, text) in parent_roots {
            if !root.is_empty() && !text.is_empty() {
                catalog.update_field_description(root, leaf, text, true).await?;
            }
        }
    }

    if !summary.short.is_empty() || !summary.long.is_empty() {
        catalog
            .update_module_description(&module.name, &summary.short, &summary.long, true)
            .await?;
    }
    Ok(())
}
