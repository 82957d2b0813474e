//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use schemascribe_catalog::Catalog;
use schemascribe_core::pipeline::{self, ProgressReporter, ReloadMode};
use schemascribe_core::summarize::TaskCounts;
use schemascribe_shared::{
    AppConfig, catalog_db_path, init_config, load_config, load_config_from, validate_api_key,
    validate_config,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SchemaScribe: mirror an upstream schema into a searchable catalog.
#[derive(Parser)]
#[command(
    name = "schemascribe",
    version,
    about = "Mirror an upstream schema graph into a local catalog and summarize it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path (defaults to ~/.schemascribe/schemascribe.toml).
    #[arg(long, global = true, env = "SCHEMASCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Drop the catalog and rebuild it from the upstream schema.
    Rebuild,

    /// Reload one element from upstream without touching the rest.
    Reload {
        /// What to reload.
        #[command(subcommand)]
        target: ReloadTarget,
    },

    /// Write model-generated descriptions for everything still pending.
    Summarize,

    /// Full-text search over the catalog.
    Search {
        /// Search query (FTS5 syntax).
        query: String,

        /// Restrict to one entity kind: type, module, or data_source.
        #[arg(short, long)]
        kind: Option<String>,

        /// Maximum results per page.
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Results to skip (for paging).
        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Show catalog counts and pending summarization work.
    Status,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Reload targets.
#[derive(Subcommand)]
pub(crate) enum ReloadTarget {
    /// Reload a data object (table or view) and its derived types.
    Object {
        /// Data object name as stored in the catalog.
        name: String,

        /// Merge into existing rows instead of clearing them first.
        #[arg(long)]
        patch: bool,
    },

    /// Reload a function or mutation function.
    Function {
        /// Dotted path, e.g. `geo.geocode` (no dot means the root module).
        path: String,

        /// Merge into existing rows instead of clearing them first.
        #[arg(long)]
        patch: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "schemascribe=info",
        1 => "schemascribe=debug",
        _ => "schemascribe=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone();
    let config_path = config_path.as_deref();
    match cli.command {
        Command::Rebuild => cmd_rebuild(config_path).await,
        Command::Reload { target } => match target {
            ReloadTarget::Object { name, patch } => {
                cmd_reload_object(config_path, &name, patch).await
            }
            ReloadTarget::Function { path, patch } => {
                cmd_reload_function(config_path, &path, patch).await
            }
        },
        Command::Summarize => cmd_summarize(config_path).await,
        Command::Search {
            query,
            kind,
            limit,
            offset,
        } => cmd_search(config_path, &query, kind.as_deref(), limit, offset).await,
        Command::Status => cmd_status(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

fn reload_mode(patch: bool) -> ReloadMode {
    if patch {
        ReloadMode::Patch
    } else {
        ReloadMode::Replace
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_rebuild(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    validate_config(&config)?;

    info!(endpoint = %config.upstream.endpoint, "rebuilding catalog");

    let reporter = CliProgress::new();
    let result = pipeline::rebuild(&config, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Catalog rebuilt!");
    println!("  Types:        {}", result.counts.types);
    println!("  Fields:       {}", result.counts.fields);
    println!("  Arguments:    {}", result.counts.arguments);
    println!("  Modules:      {}", result.counts.modules);
    println!("  Data sources: {}", result.counts.data_sources);
    println!("  Data objects: {}", result.counts.data_objects);
    println!("  Time:         {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_reload_object(config_path: Option<&Path>, name: &str, patch: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    validate_config(&config)?;
    let mode = reload_mode(patch);

    info!(object = name, ?mode, "reloading data object");

    let reporter = CliProgress::new();
    let counts = pipeline::reload_data_object(&config, name, mode, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Reloaded data object '{name}'");
    println!(
        "  Catalog now holds {} types, {} fields, {} arguments.",
        counts.types, counts.fields, counts.arguments
    );
    println!();

    Ok(())
}

async fn cmd_reload_function(config_path: Option<&Path>, path: &str, patch: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    validate_config(&config)?;
    let mode = reload_mode(patch);

    // A path without a dot names a root-module function.
    let (module, name) = match path.rsplit_once('.') {
        Some((module, name)) => (module, name),
        None => ("", path),
    };

    info!(module, function = name, ?mode, "reloading function");

    let reporter = CliProgress::new();
    let counts = pipeline::reload_function(&config, module, name, mode, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Reloaded function '{path}'");
    println!(
        "  Catalog now holds {} types, {} fields, {} arguments.",
        counts.types, counts.fields, counts.arguments
    );
    println!();

    Ok(())
}

async fn cmd_summarize(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    validate_config(&config)?;
    // Fail on a missing API key before opening anything.
    validate_api_key(&config)?;

    info!(
        provider = %config.summarize.provider,
        model = %config.summarize.model,
        "summarizing catalog"
    );

    let start = Instant::now();
    let reporter = CliProgress::new();
    let report = pipeline::summarize(&config, &reporter).await?;
    reporter.finish();

    println!();
    println!("  Summarization complete!");
    println!("  Data objects: {}", format_counts(&report.data_objects));
    println!("  Functions:    {}", format_counts(&report.functions));
    println!("  Data sources: {}", format_counts(&report.data_sources));
    println!("  Modules:      {}", format_counts(&report.modules));
    println!("  Time:         {:.1}s", start.elapsed().as_secs_f64());
    println!();

    if report.failed() > 0 {
        println!(
            "  {} target(s) failed and stay pending; re-run `schemascribe summarize` to retry.",
            report.failed()
        );
        println!();
    }

    Ok(())
}

async fn cmd_search(
    config_path: Option<&Path>,
    query: &str,
    kind: Option<&str>,
    limit: u32,
    offset: u32,
) -> Result<()> {
    if let Some(kind) = kind {
        if !matches!(kind, "type" | "module" | "data_source") {
            return Err(eyre!(
                "invalid kind '{kind}': expected 'type', 'module', or 'data_source'"
            ));
        }
    }

    let config = resolve_config(config_path)?;
    let path = catalog_db_path(&config)?;
    let catalog = Catalog::open_readonly(&path).await?;

    let page = catalog.search(query, kind, limit, offset).await?;
    if page.items.is_empty() {
        println!("  No matches for '{query}'.");
        return Ok(());
    }

    println!("  {} match(es) for '{query}':", page.total);
    for item in &page.items {
        println!("  {:<13} {}", format!("[{}]", item.kind), item.name);
    }
    if (offset as u64 + page.items.len() as u64) < page.total {
        println!(
            "  ... {} more; use --offset {}",
            page.total - offset as u64 - page.items.len() as u64,
            offset + limit
        );
    }

    Ok(())
}

async fn cmd_status(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let path = catalog_db_path(&config)?;
    let report = pipeline::status(&config).await?;

    println!();
    println!("  Catalog: {}", path.display());
    println!(
        "  Types:        {} ({} summarized)",
        report.counts.types, report.counts.types_summarized
    );
    println!("  Fields:       {}", report.counts.fields);
    println!("  Arguments:    {}", report.counts.arguments);
    println!(
        "  Modules:      {} ({} summarized)",
        report.counts.modules, report.counts.modules_summarized
    );
    println!("  Data sources: {}", report.counts.data_sources);
    println!("  Data objects: {}", report.counts.data_objects);
    println!();
    if report.pending_total() == 0 {
        println!("  Nothing pending; the catalog is fully summarized.");
    } else {
        println!(
            "  Pending summaries: {} objects, {} functions, {} sources, {} modules.",
            report.pending_data_objects,
            report.pending_functions,
            report.pending_data_sources,
            report.pending_modules
        );
    }
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn format_counts(counts: &TaskCounts) -> String {
    let mut parts = vec![format!("{} ok", counts.succeeded)];
    if counts.failed > 0 {
        parts.push(format!("{} failed", counts.failed));
    }
    if counts.skipped > 0 {
        parts.push(format!("{} skipped", counts.skipped));
    }
    parts.join(", ")
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn task_completed(&self, kind: &str, name: &str, ok: bool, current: usize, total: usize) {
        if !ok {
            self.spinner.println(format!("  failed: {kind} '{name}'"));
        }
        self.spinner
            .set_message(format!("Summarizing [{current}/{total}] {kind} '{name}'"));
    }
}
