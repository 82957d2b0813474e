//! Bounded connection pool for text-generation providers.
//!
//! Summarization fans out over many catalog entries, but provider APIs meter
//! both requests and concurrency, so all calls go through one [`Pool`] with a
//! fixed number of slots. [`Pool::acquire`] awaits a free slot and hands out a
//! [`Connection`] that holds it until dropped; the semaphore bounds in-flight
//! provider calls no matter how many tasks are spawned on top.
//!
//! Three providers are supported: `openai` and `anthropic` against their
//! public APIs, and `custom` for any OpenAI-compatible endpoint behind an
//! explicit base URL. The differences stay inside this crate; callers only
//! see [`SummarizationTask`] in and raw text out.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};

use schemascribe_shared::{Result, SchemaScribeError};

/// Default timeout in seconds for one provider call.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Fallback max-tokens for providers that require the field.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Version header value the Anthropic API requires.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("SchemaScribe/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Supported text-generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    /// OpenAI-compatible endpoint behind an explicit base URL.
    Custom,
}

impl Provider {
    /// Parse the configuration tag. Unknown tags are rejected here so a typo
    /// surfaces at startup instead of on the first summarization call.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "custom" => Ok(Self::Custom),
            other => Err(SchemaScribeError::config(format!(
                "unknown summarization provider {other:?} (expected openai, anthropic or custom)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Pool options
// ---------------------------------------------------------------------------

/// Configuration for the provider pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Provider tag: `openai`, `anthropic` or `custom`.
    pub provider: String,
    /// Model identifier passed through to the provider.
    pub model: String,
    /// Base URL override. Required for `custom`, optional for the others
    /// (used to point tests at a local server).
    pub base_url: Option<String>,
    /// Resolved API credential.
    pub api_key: String,
    /// Number of pool slots, i.e. the in-flight call bound.
    pub max_connections: u32,
    /// Timeout for one provider call in seconds.
    pub timeout_secs: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: String::new(),
            max_connections: 4,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Fixed-capacity pool of provider connections.
#[derive(Debug, Clone)]
pub struct Pool {
    semaphore: Arc<Semaphore>,
    client: Client,
    provider: Provider,
    model: String,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl Pool {
    pub fn new(opts: PoolOptions) -> Result<Self> {
        let provider = Provider::from_tag(&opts.provider)?;
        if opts.max_connections == 0 {
            return Err(SchemaScribeError::config(
                "pool capacity must be at least 1",
            ));
        }
        let endpoint = resolve_endpoint(provider, opts.base_url.as_deref())?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SchemaScribeError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(opts.max_connections as usize)),
            client,
            provider,
            model: opts.model,
            endpoint,
            api_key: opts.api_key,
            timeout: Duration::from_secs(opts.timeout_secs),
        })
    }

    /// Wait for a free slot and return a connection holding it. The slot is
    /// released when the connection drops, on every exit path.
    pub async fn acquire(&self) -> Result<Connection> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SchemaScribeError::Summarize("connection pool closed".into()))?;
        debug!(
            available = self.semaphore.available_permits(),
            "pool slot acquired"
        );
        Ok(Connection {
            _permit: permit,
            client: self.client.clone(),
            provider: self.provider,
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            timeout: self.timeout,
        })
    }

    /// Number of currently free slots.
    pub fn free_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

fn resolve_endpoint(provider: Provider, base_url: Option<&str>) -> Result<String> {
    let base = match (provider, base_url) {
        (_, Some(url)) if !url.is_empty() => url.trim_end_matches('/').to_string(),
        (Provider::Custom, _) => {
            return Err(SchemaScribeError::config(
                "custom provider requires summarize.base_url",
            ));
        }
        (Provider::OpenAi, _) => OPENAI_BASE_URL.to_string(),
        (Provider::Anthropic, _) => ANTHROPIC_BASE_URL.to_string(),
    };
    let path = match provider {
        Provider::OpenAi | Provider::Custom => "chat/completions",
        Provider::Anthropic => "messages",
    };
    Ok(format!("{base}/{path}"))
}

// ---------------------------------------------------------------------------
// Tasks and connections
// ---------------------------------------------------------------------------

/// One summarization request: prompts, template data, and call limits.
#[derive(Debug, Clone)]
pub struct SummarizationTask {
    pub system_prompt: String,
    /// User prompt with `{{key}}` placeholders resolved against `data`.
    /// Dotted keys traverse nested objects.
    pub user_prompt_template: String,
    pub data: Value,
    /// Token cap for the reply; 0 leaves the provider default (Anthropic
    /// always receives a cap since its API requires one).
    pub max_tokens: u32,
    /// Sampling temperature; 0.0 leaves the provider default.
    pub temperature: f64,
}

/// One pool slot bound to the configured provider.
pub struct Connection {
    _permit: OwnedSemaphorePermit,
    client: Client,
    provider: Provider,
    model: String,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Deserialize)]
struct OpenAiReply {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Deserialize)]
struct AnthropicReply {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl Connection {
    /// Render the task's user prompt and run one provider call under a fresh
    /// per-call timeout. Returns the raw reply text; parsing it into the
    /// caller's expected output shape stays with the caller.
    #[instrument(skip_all, fields(provider = ?self.provider, model = %self.model))]
    pub async fn summarize(&self, task: &SummarizationTask) -> Result<String> {
        let user_prompt = render_template(&task.user_prompt_template, &task.data)?;
        let temperature = (task.temperature > 0.0).then_some(task.temperature);

        let request = match self.provider {
            Provider::OpenAi | Provider::Custom => {
                let body = OpenAiRequest {
                    model: &self.model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: &task.system_prompt,
                        },
                        ChatMessage {
                            role: "user",
                            content: &user_prompt,
                        },
                    ],
                    max_tokens: (task.max_tokens > 0).then_some(task.max_tokens),
                    temperature,
                };
                self.client
                    .post(&self.endpoint)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            }
            Provider::Anthropic => {
                let body = AnthropicRequest {
                    model: &self.model,
                    system: &task.system_prompt,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: &user_prompt,
                    }],
                    max_tokens: if task.max_tokens > 0 {
                        task.max_tokens
                    } else {
                        DEFAULT_MAX_TOKENS
                    },
                    temperature,
                };
                self.client
                    .post(&self.endpoint)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            }
        };

        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SchemaScribeError::Summarize(format!("{}: {e}", self.endpoint)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SchemaScribeError::Summarize(format!(
                "{}: HTTP {status}",
                self.endpoint
            )));
        }

        match self.provider {
            Provider::OpenAi | Provider::Custom => {
                let reply: OpenAiReply = response.json().await.map_err(|e| {
                    SchemaScribeError::Summarize(format!("decode provider reply: {e}"))
                })?;
                let choice = reply.choices.into_iter().next().ok_or_else(|| {
                    SchemaScribeError::Summarize("provider reply has no choices".into())
                })?;
                Ok(choice.message.content)
            }
            Provider::Anthropic => {
                let reply: AnthropicReply = response.json().await.map_err(|e| {
                    SchemaScribeError::Summarize(format!("decode provider reply: {e}"))
                })?;
                let text: String = reply
                    .content
                    .iter()
                    .filter(|block| block.kind == "text")
                    .map(|block| block.text.as_str())
                    .collect();
                if text.is_empty() {
                    return Err(SchemaScribeError::Summarize(
                        "provider reply has no text content".into(),
                    ));
                }
                Ok(text)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt templates
// ---------------------------------------------------------------------------

/// Fill `{{key}}` placeholders from a JSON object. String values are inserted
/// verbatim, everything else pretty-printed as JSON. An unresolvable key is
/// an error so template/data drift fails the task instead of producing a
/// silently truncated prompt.
fn render_template(template: &str, data: &Value) -> Result<String> {
    static PLACEHOLDER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("valid regex"));

    let mut missing: Option<String> = None;
    let rendered = PLACEHOLDER_RE.replace_all(template, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        match lookup(data, key) {
            Some(value) => value_text(value),
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });
    if let Some(key) = missing {
        return Err(SchemaScribeError::Summarize(format!(
            "prompt template references unknown key {key:?}"
        )));
    }
    Ok(rendered.into_owned())
}

fn lookup<'v>(data: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool_for(server: &wiremock::MockServer, provider: &str) -> Pool {
        Pool::new(PoolOptions {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            base_url: Some(server.uri()),
            api_key: "sekret".to_string(),
            max_connections: 2,
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn echo_task() -> SummarizationTask {
        SummarizationTask {
            system_prompt: "You describe schemas.".to_string(),
            user_prompt_template: "Describe {{name}} in {{meta.module}}".to_string(),
            data: serde_json::json!({"name": "cities", "meta": {"module": "geo"}}),
            max_tokens: 256,
            temperature: 0.3,
        }
    }

    #[test]
    fn template_fills_nested_placeholders() {
        let out = render_template(
            "object {{name}} of {{meta.module}}: {{meta.columns}}",
            &serde_json::json!({
                "name": "cities",
                "meta": {"module": "geo", "columns": ["name", "pop"]}
            }),
        )
        .unwrap();
        assert!(out.starts_with("object cities of geo: "));
        assert!(out.contains("\"pop\""));
    }

    #[test]
    fn template_missing_key_is_error() {
        let err = render_template("{{name}} {{ghost}}", &serde_json::json!({"name": "x"}))
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let result = Pool::new(PoolOptions {
            provider: "mistral".to_string(),
            ..Default::default()
        });
        assert!(result.unwrap_err().to_string().contains("mistral"));
    }

    #[test]
    fn custom_provider_requires_base_url() {
        let result = Pool::new(PoolOptions {
            provider: "custom".to_string(),
            base_url: None,
            ..Default::default()
        });
        assert!(result.unwrap_err().to_string().contains("base_url"));
    }

    #[tokio::test]
    async fn openai_call_sends_bearer_and_parses_choice() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .and(wiremock::matchers::header("authorization", "Bearer sekret"))
            .and(wiremock::matchers::body_string_contains("Describe cities in geo"))
            .and(wiremock::matchers::body_string_contains("\"max_tokens\":256"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "a table of cities"}}]
                }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let pool = pool_for(&server, "custom");
        let conn = pool.acquire().await.unwrap();
        let text = conn.summarize(&echo_task()).await.unwrap();
        assert_eq!(text, "a table of cities");
    }

    #[tokio::test]
    async fn anthropic_call_uses_api_key_header() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/messages"))
            .and(wiremock::matchers::header("x-api-key", "sekret"))
            .and(wiremock::matchers::header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "content": [
                        {"type": "text", "text": "a table"},
                        {"type": "text", "text": " of cities"}
                    ]
                }),
            ))
            .mount(&server)
            .await;

        let pool = pool_for(&server, "anthropic");
        let conn = pool.acquire().await.unwrap();
        let text = conn.summarize(&echo_task()).await.unwrap();
        assert_eq!(text, "a table of cities");
    }

    #[tokio::test]
    async fn error_status_fails_the_call() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let pool = pool_for(&server, "custom");
        let conn = pool.acquire().await.unwrap();
        let err = conn.summarize(&echo_task()).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn malformed_reply_is_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("not json at all"),
            )
            .mount(&server)
            .await;

        let pool = pool_for(&server, "custom");
        let conn = pool.acquire().await.unwrap();
        let err = conn.summarize(&echo_task()).await.unwrap_err();
        assert!(err.to_string().contains("decode provider reply"));
    }

    #[tokio::test]
    async fn capacity_bounds_concurrent_connections() {
        let pool = Pool::new(PoolOptions {
            provider: "openai".to_string(),
            api_key: "sekret".to_string(),
            max_connections: 2,
            ..Default::default()
        })
        .unwrap();

        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let live = live.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _conn = pool.acquire().await.unwrap();
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                live.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.free_slots(), 2);
    }

    #[tokio::test]
    async fn dropping_connection_frees_the_slot() {
        let pool = Pool::new(PoolOptions {
            provider: "openai".to_string(),
            api_key: "sekret".to_string(),
            max_connections: 1,
            ..Default::default()
        })
        .unwrap();

        let first = pool.acquire().await.unwrap();
        drop(first);
        let again = tokio::time::timeout(Duration::from_millis(100), pool.acquire())
            .await
            .expect("slot was not released");
        assert!(again.is_ok());
    }
}
