//! End-to-end operations: introspect → closure → reconcile → summarize.
//!
//! Each operation takes the application config and builds its own upstream
//! client, catalog handle, and provider pool, so callers (the CLI, tests)
//! hold nothing but the config and a progress sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use schemascribe_catalog::{Catalog, CatalogCounts, MergeMode};
use schemascribe_introspect::{Introspector, IntrospectorOptions};
use schemascribe_pool::{Pool, PoolOptions};
use schemascribe_shared::Result;
use schemascribe_shared::config::{AppConfig, catalog_db_path, summarize_api_key};
use schemascribe_shared::types::data_source_kind;

use crate::summarize::{self, SummarizeReport};
use crate::{clear, sync};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting operation status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when one summarization task finishes.
    fn task_completed(&self, kind: &str, name: &str, ok: bool, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn task_completed(&self, _kind: &str, _name: &str, _ok: bool, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Modes and results
// ---------------------------------------------------------------------------

/// How a reload treats rows that already exist in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMode {
    /// Drop the element's field and argument rows first, then insert fresh
    /// ones. Type and module rows keep their stored descriptions.
    Replace,
    /// Update rows in place. Stored description text survives, so earlier
    /// summarizer output is kept while the structure refreshes.
    Patch,
}

impl ReloadMode {
    fn merge_mode(self) -> MergeMode {
        match self {
            ReloadMode::Replace => MergeMode::Insert,
            ReloadMode::Patch => MergeMode::Patch,
        }
    }
}

/// Result of the `rebuild` operation.
#[derive(Debug, Clone)]
pub struct RebuildResult {
    /// Catalog row counts after the rebuild.
    pub counts: CatalogCounts,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Point-in-time catalog counts plus pending summarization work.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub counts: CatalogCounts,
    pub pending_data_objects: usize,
    pub pending_functions: usize,
    pub pending_data_sources: usize,
    pub pending_modules: usize,
}

impl StatusReport {
    pub fn pending_total(&self) -> usize {
        self.pending_data_objects
            + self.pending_functions
            + self.pending_data_sources
            + self.pending_modules
    }
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

fn introspector(config: &AppConfig) -> Result<Introspector> {
    let auth_token = if config.upstream.auth_token_env.is_empty() {
        None
    } else {
        std::env::var(&config.upstream.auth_token_env)
            .ok()
            .filter(|v| !v.is_empty())
    };
    Introspector::new(IntrospectorOptions {
        endpoint: config.upstream.endpoint.clone(),
        auth_token,
        timeout_secs: config.upstream.timeout_secs,
        cache_ttl_secs: config.upstream.cache_ttl_secs,
    })
}

async fn open_catalog(config: &AppConfig) -> Result<Catalog> {
    let path = catalog_db_path(config)?;
    if config.catalog.read_only {
        Catalog::open_readonly(&path).await
    } else {
        Catalog::open(&path).await
    }
}

fn build_pool(config: &AppConfig) -> Result<Pool> {
    let api_key = summarize_api_key(config)?;
    let base_url = if config.summarize.base_url.is_empty() {
        None
    } else {
        Some(config.summarize.base_url.clone())
    };
    Pool::new(PoolOptions {
        provider: config.summarize.provider.clone(),
        model: config.summarize.model.clone(),
        base_url,
        api_key,
        max_connections: config.summarize.max_connections,
        timeout_secs: config.summarize.timeout_secs,
    })
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Drop the catalog and load it fresh from the upstream schema.
#[instrument(skip_all, fields(endpoint = %config.upstream.endpoint))]
pub async fn rebuild(
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<RebuildResult> {
    let start = Instant::now();

    // --- Phase 1: Fetch upstream ---
    progress.phase("Fetching upstream schema");
    let introspector = introspector(config)?;
    let graph = introspector.fetch_schema_graph().await?;
    let meta = introspector.fetch_meta_summary().await?;
    info!(
        types = graph.types.len(),
        modules = meta.modules.len(),
        data_sources = meta.data_sources.len(),
        "fetched upstream schema"
    );

    // --- Phase 2: Rebuild catalog ---
    progress.phase("Rebuilding catalog");
    let catalog = open_catalog(config).await?;
    sync::full_rebuild(&catalog, &graph, &meta).await?;

    let counts = catalog.counts().await?;
    let elapsed = start.elapsed();
    info!(
        types = counts.types,
        fields = counts.fields,
        arguments = counts.arguments,
        elapsed_ms = elapsed.as_millis() as u64,
        "catalog rebuilt"
    );
    Ok(RebuildResult { counts, elapsed })
}

/// Reload a single data object from upstream, scoped by its closure.
#[instrument(skip_all, fields(object = %name, mode = ?mode))]
pub async fn reload_data_object(
    config: &AppConfig,
    name: &str,
    mode: ReloadMode,
    progress: &dyn ProgressReporter,
) -> Result<CatalogCounts> {
    // --- Phase 1: Fetch upstream ---
    progress.phase("Fetching upstream schema");
    let introspector = introspector(config)?;
    let graph = introspector.fetch_schema_graph().await?;
    let meta = introspector.fetch_meta_summary().await?;

    // --- Phase 2: Scoped reconcile ---
    progress.phase("Reconciling data object");
    let catalog = open_catalog(config).await?;
    if mode == ReloadMode::Replace {
        clear::clear_data_object(&catalog, &graph, &meta, name).await?;
    }
    let scope = schemascribe_closure::for_data_object(&graph, &meta, name)?;
    sync::reconcile(&catalog, &graph, &meta, Some(&scope), mode.merge_mode()).await?;
    catalog.counts().await
}

/// Reload a single function or mutation function from upstream.
#[instrument(skip_all, fields(module = %module, function = %name, mode = ?mode))]
pub async fn reload_function(
    config: &AppConfig,
    module: &str,
    name: &str,
    mode: ReloadMode,
    progress: &dyn ProgressReporter,
) -> Result<CatalogCounts> {
    // --- Phase 1: Fetch upstream ---
    progress.phase("Fetching upstream schema");
    let introspector = introspector(config)?;
    let graph = introspector.fetch_schema_graph().await?;
    let meta = introspector.fetch_meta_summary().await?;

    // --- Phase 2: Scoped reconcile ---
    progress.phase("Reconciling function");
    let catalog = open_catalog(config).await?;
    if mode == ReloadMode::Replace {
        clear::clear_function(&catalog, &meta, module, name).await?;
    }
    let scope = schemascribe_closure::for_function(&graph, &meta, module, name)?;
    sync::reconcile(&catalog, &graph, &meta, Some(&scope), mode.merge_mode()).await?;
    catalog.counts().await
}

/// Summarize everything the catalog has pending.
#[instrument(skip_all, fields(
    provider = %config.summarize.provider,
    model = %config.summarize.model,
))]
pub async fn summarize(
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<SummarizeReport> {
    let pool = build_pool(config)?;
    let catalog = Arc::new(open_catalog(config).await?);

    // The summary feeds prompt context (relations, data sources, modules),
    // so it is fetched once up front rather than per task.
    progress.phase("Fetching upstream summary");
    let introspector = introspector(config)?;
    let meta = Arc::new(introspector.fetch_meta_summary().await?);

    summarize::summarize_all(
        &catalog,
        &meta,
        &pool,
        config.summarize.max_graph_depth,
        progress,
    )
    .await
}

/// Inspect the catalog without touching upstream or the provider.
pub async fn status(config: &AppConfig) -> Result<StatusReport> {
    let path = catalog_db_path(config)?;
    let catalog = Catalog::open_readonly(&path).await?;
    let counts = catalog.counts().await?;
    let pending_data_objects = catalog.types_pending_summary().await?.len();
    let pending_functions = catalog.function_fields_pending().await?.len();
    let mut pending_sources = catalog.data_sources_pending().await?;
    pending_sources.retain(|s| s.kind != data_source_kind::EXTENSION);
    let pending_modules = catalog.modules_pending().await?.len();
    Ok(StatusReport {
        counts,
        pending_data_objects,
        pending_functions,
        pending_data_sources: pending_sources.len(),
        pending_modules,
    })
}
