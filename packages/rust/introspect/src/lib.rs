//! Upstream schema introspection client.
//!
//! SchemaScribe talks to the upstream schema service over its HTTP document
//! interface: POST `{query, variables}`, response `{data, errors}`. Three
//! read-only requests cover everything the engine needs: the full annotated
//! introspection graph, the resolved meta summary, and a short single-type
//! shape. Every request carries a cache-lifetime hint so repeated runs do not
//! force upstream recompilation.

pub mod meta;
pub mod schema;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use schemascribe_shared::{Result, SchemaScribeError};

pub use meta::MetaSummary;
pub use schema::{SchemaGraph, TypeIntro, TypeRef, TypeShort};

/// Default timeout in seconds for upstream requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cache-lifetime hint in seconds attached to upstream requests.
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// User-Agent string for upstream requests.
const USER_AGENT: &str = concat!("SchemaScribe/", env!("CARGO_PKG_VERSION"));

/// Full annotated introspection graph. Type references unwrap four levels of
/// wrapping, which covers every list/non-null shape upstream produces.
const SCHEMA_GRAPH_QUERY: &str = r#"
query schemaGraph($ttl: Int!) {
  __schema @cache(ttl: $ttl) {
    description
    queryType { name }
    mutationType { name }
    types { ...type_info }
  }
}

fragment type_info on __Type {
  name
  description
  kind
  role
  module
  catalog
  enumValues {
    name
    description
  }
  inputFields {
    name
    description
    type { name kind ofType { name kind ofType { name kind ofType { name kind } } } }
  }
  fields {
    name
    description
    role
    catalog
    exclude
    args {
      name
      description
      defaultValue
      type { name kind ofType { name kind ofType { name kind ofType { name kind } } } }
    }
    type { name kind ofType { name kind ofType { name kind ofType { name kind } } } }
  }
}
"#;

/// Resolved module tree, data sources, and object/function descriptors.
const META_SUMMARY_QUERY: &str = r#"
query metaSummary($ttl: Int!) {
  meta {
    summary @cache(ttl: $ttl)
  }
}
"#;

/// Minimal shape of one type.
const TYPE_SHORT_QUERY: &str = r#"
query typeShort($name: String!, $ttl: Int!) {
  __type(name: $name) @cache(ttl: $ttl) {
    name
    kind
    role
    catalog
    fields {
      name
      args { name }
    }
    inputFields { name }
    enumValues { name }
  }
}
"#;

// ---------------------------------------------------------------------------
// Introspector options
// ---------------------------------------------------------------------------

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct IntrospectorOptions {
    /// Upstream query endpoint URL.
    pub endpoint: String,
    /// Bearer credential, when the upstream requires one.
    pub auth_token: Option<String>,
    /// Timeout for upstream requests in seconds.
    pub timeout_secs: u64,
    /// Cache-lifetime hint in seconds attached to every request.
    pub cache_ttl_secs: u64,
}

impl Default for IntrospectorOptions {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/query".to_string(),
            auth_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Introspector
// ---------------------------------------------------------------------------

/// Read-only client for the upstream schema service.
#[derive(Debug, Clone)]
pub struct Introspector {
    client: Client,
    endpoint: Url,
    auth_token: Option<String>,
    cache_ttl_secs: u64,
}

/// Response envelope of the upstream document interface.
#[derive(Debug, Deserialize)]
struct QueryReply {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    message: String,
}

impl Introspector {
    pub fn new(opts: IntrospectorOptions) -> Result<Self> {
        let endpoint = Url::parse(&opts.endpoint).map_err(|e| {
            SchemaScribeError::config(format!("invalid upstream endpoint {:?}: {e}", opts.endpoint))
        })?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| SchemaScribeError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            auth_token: opts.auth_token,
            cache_ttl_secs: opts.cache_ttl_secs,
        })
    }

    /// Fetch the full annotated introspection graph.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn fetch_schema_graph(&self) -> Result<SchemaGraph> {
        let mut data = self.query(SCHEMA_GRAPH_QUERY, serde_json::json!({})).await?;
        let raw = data
            .pointer_mut("/__schema")
            .map(Value::take)
            .ok_or_else(|| SchemaScribeError::Network("upstream response has no __schema".into()))?;
        let graph: SchemaGraph = serde_json::from_value(raw)
            .map_err(|e| SchemaScribeError::Network(format!("decode schema graph: {e}")))?;
        info!(types = graph.types.len(), "schema graph fetched");
        Ok(graph)
    }

    /// Fetch the resolved meta summary.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn fetch_meta_summary(&self) -> Result<MetaSummary> {
        let mut data = self.query(META_SUMMARY_QUERY, serde_json::json!({})).await?;
        let raw = data
            .pointer_mut("/meta/summary")
            .map(Value::take)
            .ok_or_else(|| {
                SchemaScribeError::Network("upstream response has no meta summary".into())
            })?;
        let summary: MetaSummary = serde_json::from_value(raw)
            .map_err(|e| SchemaScribeError::Network(format!("decode meta summary: {e}")))?;
        info!(
            modules = summary.modules.len(),
            data_sources = summary.data_sources.len(),
            "meta summary fetched"
        );
        Ok(summary)
    }

    /// Fetch the short shape of a single type. Returns `None` when the type is
    /// not visible upstream.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn fetch_type_short(&self, name: &str) -> Result<Option<TypeShort>> {
        let mut data = self
            .query(TYPE_SHORT_QUERY, serde_json::json!({ "name": name }))
            .await?;
        let raw = data
            .pointer_mut("/__type")
            .map(Value::take)
            .unwrap_or(Value::Null);
        if raw.is_null() {
            debug!("type not visible upstream");
            return Ok(None);
        }
        let short: TypeShort = serde_json::from_value(raw)
            .map_err(|e| SchemaScribeError::Network(format!("decode type shape: {e}")))?;
        Ok(Some(short))
    }

    /// POST one document and return the `data` value. A 2xx reply carrying a
    /// non-empty `errors` array counts as a transport failure.
    async fn query(&self, document: &str, mut variables: Value) -> Result<Value> {
        if let Value::Object(vars) = &mut variables {
            vars.insert("ttl".to_string(), Value::from(self.cache_ttl_secs));
        }

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&serde_json::json!({ "query": document, "variables": variables }));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SchemaScribeError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SchemaScribeError::Network(format!(
                "{}: HTTP {status}",
                self.endpoint
            )));
        }

        let reply: QueryReply = response
            .json()
            .await
            .map_err(|e| SchemaScribeError::Network(format!("decode upstream response: {e}")))?;

        if !reply.errors.is_empty() {
            let messages: Vec<&str> = reply.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(SchemaScribeError::Network(format!(
                "upstream errors: {}",
                messages.join("; ")
            )));
        }

        reply
            .data
            .ok_or_else(|| SchemaScribeError::Network("upstream response has no data".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn introspector_for(server: &wiremock::MockServer) -> Introspector {
        Introspector::new(IntrospectorOptions {
            endpoint: format!("{}/query", server.uri()),
            auth_token: Some("sekret".to_string()),
            ..Default::default()
        })
        .expect("build introspector")
    }

    fn graph_body() -> serde_json::Value {
        serde_json::json!({
            "data": {
                "__schema": {
                    "description": null,
                    "queryType": {"name": "Query"},
                    "mutationType": null,
                    "types": [
                        {
                            "name": "Query",
                            "kind": "OBJECT",
                            "role": "module",
                            "fields": [
                                {
                                    "name": "cities",
                                    "role": "query_data",
                                    "args": [
                                        {
                                            "name": "filter",
                                            "defaultValue": null,
                                            "type": {"name": "cities_filter_input", "kind": "INPUT_OBJECT"}
                                        }
                                    ],
                                    "type": {
                                        "name": null,
                                        "kind": "LIST",
                                        "ofType": {"name": "cities", "kind": "OBJECT"}
                                    }
                                }
                            ]
                        },
                        {
                            "name": "cities",
                            "kind": "OBJECT",
                            "role": "table",
                            "module": "",
                            "catalog": "osm",
                            "fields": [
                                {
                                    "name": "id",
                                    "role": "field",
                                    "type": {
                                        "name": null,
                                        "kind": "NON_NULL",
                                        "ofType": {"name": "BigInt", "kind": "SCALAR"}
                                    }
                                }
                            ]
                        }
                    ]
                }
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_schema_graph() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/query"))
            .and(wiremock::matchers::body_string_contains("__schema"))
            .and(wiremock::matchers::header("authorization", "Bearer sekret"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(graph_body()))
            .mount(&server)
            .await;

        let intro = introspector_for(&server);
        let graph = intro.fetch_schema_graph().await.expect("fetch graph");

        assert_eq!(graph.types.len(), 2);
        assert_eq!(graph.query_type.as_ref().map(|t| t.name.as_str()), Some("Query"));
        let cities = graph.type_by_name("cities").expect("cities type");
        assert_eq!(cities.role, "table");
        assert_eq!(cities.catalog, "osm");
        let id = &cities.fields[0];
        assert_eq!(id.type_ref.concrete_name(), "BigInt");
        assert!(id.type_ref.is_non_null());

        let root = graph.type_by_name("Query").expect("root type");
        assert!(root.fields[0].type_ref.is_list());
        assert_eq!(root.fields[0].args[0].type_ref.concrete_name(), "cities_filter_input");
    }

    #[tokio::test]
    async fn test_fetch_meta_summary() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/query"))
            .and(wiremock::matchers::body_string_contains("metaSummary"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "meta": {
                        "summary": {
                            "modules": [
                                {"name": "", "query_root": "Query"},
                                {"name": "geo", "query_root": "geo_query"}
                            ],
                            "data_sources": [{"name": "osm", "kind": "postgres"}]
                        }
                    }
                }
            })))
            .mount(&server)
            .await;

        let intro = introspector_for(&server);
        let summary = intro.fetch_meta_summary().await.expect("fetch summary");
        assert_eq!(summary.modules.len(), 2);
        assert!(summary.module("geo").is_some());
        assert_eq!(summary.data_sources[0].kind, "postgres");
    }

    #[tokio::test]
    async fn test_fetch_type_short_missing_type() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/query"))
            .and(wiremock::matchers::body_string_contains("\"name\":\"ghost\""))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"__type": null}
            })))
            .mount(&server)
            .await;

        let intro = introspector_for(&server);
        let short = intro.fetch_type_short("ghost").await.expect("query");
        assert!(short.is_none());
    }

    #[tokio::test]
    async fn test_errors_array_is_transport_failure() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/query"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": null,
                "errors": [{"message": "schema is compiling"}]
            })))
            .mount(&server)
            .await;

        let intro = introspector_for(&server);
        let err = intro.fetch_schema_graph().await.expect_err("must fail");
        match err {
            SchemaScribeError::Network(msg) => assert!(msg.contains("schema is compiling")),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/query"))
            .respond_with(wiremock::ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let intro = introspector_for(&server);
        let err = intro.fetch_meta_summary().await.expect_err("must fail");
        assert!(matches!(err, SchemaScribeError::Network(_)));
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let err = Introspector::new(IntrospectorOptions {
            endpoint: "not a url".to_string(),
            ..Default::default()
        })
        .expect_err("must fail");
        assert!(matches!(err, SchemaScribeError::Config { .. }));
    }
}
