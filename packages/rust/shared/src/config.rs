//! Application configuration for SchemaScribe.
//!
//! User config lives at `~/.schemascribe/schemascribe.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaScribeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "schemascribe.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".schemascribe";

/// Provider tags the summarizer pool knows how to construct.
const KNOWN_PROVIDERS: &[&str] = &["openai", "anthropic", "custom"];

// ---------------------------------------------------------------------------
// Config structs (matching schemascribe.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream schema/query service.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Local catalog database.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Summarization provider and limits.
    #[serde(default)]
    pub summarize: SummarizeConfig,
}

/// `[upstream]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Query endpoint of the upstream service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding a bearer token; empty for anonymous access.
    #[serde(default)]
    pub auth_token_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,

    /// Result cache-lifetime hint attached to every upstream request, seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_token_env: String::new(),
            timeout_secs: default_upstream_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080/query".into()
}
fn default_upstream_timeout_secs() -> u64 {
    30
}
fn default_cache_ttl_secs() -> u64 {
    300
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to the catalog database file. A leading `~/` expands to home.
    #[serde(default = "default_catalog_path")]
    pub path: String,

    /// Open the catalog read-only (search works, reconciliation does not).
    #[serde(default)]
    pub read_only: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            read_only: false,
        }
    }
}

fn default_catalog_path() -> String {
    "~/.schemascribe/catalog.db".into()
}

/// `[summarize]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeConfig {
    /// Provider tag: "openai", "anthropic", or "custom" (OpenAI-compatible).
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL for the "custom" provider; ignored otherwise.
    #[serde(default)]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum concurrently held provider connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_summarize_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum depth of the related-object graph attached to object prompts.
    #[serde(default = "default_max_graph_depth")]
    pub max_graph_depth: u32,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: String::new(),
            api_key_env: default_api_key_env(),
            max_connections: default_max_connections(),
            timeout_secs: default_summarize_timeout_secs(),
            max_graph_depth: default_max_graph_depth(),
        }
    }
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_max_connections() -> u32 {
    4
}
fn default_summarize_timeout_secs() -> u64 {
    120
}
fn default_max_graph_depth() -> u32 {
    2
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.schemascribe/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SchemaScribeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.schemascribe/schemascribe.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SchemaScribeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SchemaScribeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SchemaScribeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SchemaScribeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SchemaScribeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the catalog database path, expanding a leading `~/`.
pub fn catalog_db_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.catalog.path;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| SchemaScribeError::config("could not determine home directory"))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Validate config values that would otherwise fail deep inside an operation.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    url::Url::parse(&config.upstream.endpoint).map_err(|e| {
        SchemaScribeError::config(format!(
            "invalid upstream endpoint {:?}: {e}",
            config.upstream.endpoint
        ))
    })?;

    let provider = config.summarize.provider.as_str();
    if !KNOWN_PROVIDERS.contains(&provider) {
        return Err(SchemaScribeError::config(format!(
            "unknown provider {provider:?}, expected one of {KNOWN_PROVIDERS:?}"
        )));
    }
    if provider == "custom" && config.summarize.base_url.is_empty() {
        return Err(SchemaScribeError::config(
            "provider \"custom\" requires summarize.base_url",
        ));
    }
    if config.summarize.max_connections == 0 {
        return Err(SchemaScribeError::config(
            "summarize.max_connections must be at least 1",
        ));
    }
    Ok(())
}

/// Check that the summarization API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    summarize_api_key(config).map(drop)
}

/// Read the summarization API key from the configured environment variable.
pub fn summarize_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.summarize.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SchemaScribeError::config(format!(
            "summarization API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("endpoint"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.summarize.max_connections, 4);
        assert_eq!(parsed.upstream.cache_ttl_secs, 300);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[upstream]
endpoint = "https://schema.example.com/query"

[summarize]
provider = "anthropic"
model = "claude-sonnet-4"
api_key_env = "ANTHROPIC_API_KEY"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.upstream.endpoint, "https://schema.example.com/query");
        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(config.summarize.provider, "anthropic");
        assert_eq!(config.summarize.max_graph_depth, 2);
        assert!(!config.catalog.read_only);
    }

    #[test]
    fn validate_rejects_bad_endpoint() {
        let mut config = AppConfig::default();
        config.upstream.endpoint = "not a url".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validate_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        config.summarize.provider = "gemini".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.summarize.max_connections = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.summarize.api_key_env = "SSCRIBE_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
