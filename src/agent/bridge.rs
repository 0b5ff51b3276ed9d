//! Tool bridge: one discoverable tool namespace over heterogeneous providers.
//!
//! Agents see a flat list of [`ToolDefinition`]s and call
//! [`ToolBridge::invoke`] with the model's raw [`ToolCall`]. The bridge
//! parses arguments, routes the call to the owning [`ToolProvider`], and
//! returns a [`ToolInvocation`] record whether the call succeeded or not.
//!
//! Providers that are not safe for concurrent use get a per-provider async
//! mutex, so their calls are serialized across every agent of every
//! orchestration sharing the bridge.
//!
//! The bridge does not time calls out; the worker owns that bound.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::tool::{ToolCall, ToolDefinition, ToolInvocation};
use crate::error::{AgentError, ToolError, ToolErrorKind};

/// Largest accepted argument payload, in bytes.
pub const MAX_ARGUMENT_BYTES: usize = 64 * 1024;

/// A backend exposing one or more tools.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Tools this provider serves.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Runs `tool` with already-parsed parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] with the matching kind on failure.
    async fn invoke(&self, tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError>;

    /// Whether calls from different agents may overlap.
    fn concurrent_safe(&self) -> bool {
        true
    }
}

struct Registered {
    provider: Arc<dyn ToolProvider>,
    gate: Option<Mutex<()>>,
}

/// Registry and dispatcher for all tool providers.
#[derive(Default)]
pub struct ToolBridge {
    providers: Vec<Registered>,
    routes: HashMap<String, usize>,
    definitions: Vec<ToolDefinition>,
}

impl std::fmt::Debug for ToolBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.definitions.iter().map(|d| d.name.as_str()).collect();
        f.debug_struct("ToolBridge")
            .field("providers", &self.providers.len())
            .field("tools", &names)
            .finish()
    }
}

impl ToolBridge {
    /// Creates an empty bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bridge with the built-in tools plus any tools declared in
    /// `tools_file`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] if the manifest cannot be read
    /// or declares a duplicate tool name.
    pub fn with_defaults(tools_file: Option<&Path>) -> Result<Self, AgentError> {
        let mut bridge = Self::new();
        bridge.register(Arc::new(ClockProvider))?;
        if let Some(path) = tools_file {
            bridge.register(Arc::new(HttpToolProvider::from_manifest(path)?))?;
        }
        Ok(bridge)
    }

    /// Adds a provider and its tools.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] if any tool name is already
    /// registered; nothing is added in that case.
    pub fn register(&mut self, provider: Arc<dyn ToolProvider>) -> Result<(), AgentError> {
        let defs = provider.definitions();

        let mut seen = std::collections::HashSet::new();
        for def in &defs {
            if self.routes.contains_key(&def.name) || !seen.insert(def.name.as_str()) {
                return Err(AgentError::Configuration {
                    message: format!(
                        "duplicate tool name `{}` from provider `{}`",
                        def.name,
                        provider.name()
                    ),
                });
            }
        }

        let slot = self.providers.len();
        for def in &defs {
            self.routes.insert(def.name.clone(), slot);
        }
        debug!(
            provider = provider.name(),
            tools = defs.len(),
            serialized = !provider.concurrent_safe(),
            "registered tool provider"
        );
        self.definitions.extend(defs);
        let gate = (!provider.concurrent_safe()).then(|| Mutex::new(()));
        self.providers.push(Registered { provider, gate });
        Ok(())
    }

    /// All tool definitions in registration order.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Executes one model-requested tool call.
    ///
    /// Never fails: errors are recorded on the returned invocation.
    pub async fn invoke(&self, call: &ToolCall) -> ToolInvocation {
        let start = Instant::now();

        let (parameters, result) = match parse_arguments(&call.name, &call.arguments) {
            Ok(params) => {
                let result = self.dispatch(&call.name, &params).await;
                (params, result)
            }
            Err(e) => (Map::new(), Err(e)),
        };

        let latency = start.elapsed();
        match &result {
            Ok(_) => debug!(
                tool = %call.name,
                call_id = %call.id,
                elapsed_ms = %latency.as_millis(),
                "tool call succeeded"
            ),
            Err(e) => debug!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed"),
        }

        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        ToolInvocation {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            parameters,
            result,
            error,
            latency,
        }
    }

    async fn dispatch(&self, tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
        let Some(registered) = self.routes.get(tool).and_then(|&i| self.providers.get(i)) else {
            return Err(ToolError::new(
                tool,
                ToolErrorKind::NotFound,
                "no such tool is registered",
            ));
        };

        if let Some(gate) = &registered.gate {
            let _guard = gate.lock().await;
            registered.provider.invoke(tool, params).await
        } else {
            registered.provider.invoke(tool, params).await
        }
    }

    /// Builds the record for a call abandoned after `after`.
    pub fn timed_out(call: &ToolCall, after: Duration) -> ToolInvocation {
        ToolInvocation {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            parameters: parse_arguments(&call.name, &call.arguments).unwrap_or_default(),
            result: None,
            error: Some(ToolError::new(
                &call.name,
                ToolErrorKind::Timeout,
                format!("no result within {}ms", after.as_millis()),
            )),
            latency: after,
        }
    }
}

/// Parses the model's JSON argument string into a parameter map.
fn parse_arguments(tool: &str, raw: &str) -> Result<Map<String, Value>, ToolError> {
    if raw.len() > MAX_ARGUMENT_BYTES {
        return Err(ToolError::new(
            tool,
            ToolErrorKind::InvalidArguments,
            format!(
                "arguments are {} bytes, limit is {MAX_ARGUMENT_BYTES}",
                raw.len()
            ),
        ));
    }
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(ToolError::new(
            tool,
            ToolErrorKind::InvalidArguments,
            format!("expected a JSON object, got {other}"),
        )),
        Err(e) => Err(ToolError::new(
            tool,
            ToolErrorKind::InvalidArguments,
            format!("arguments are not valid JSON: {e}"),
        )),
    }
}

/// Built-in provider for the current time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockProvider;

#[async_trait]
impl ToolProvider for ClockProvider {
    fn name(&self) -> &str {
        "clock"
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "current_time".to_string(),
            description: "Returns the current UTC date and time. Use it to anchor \
                          phrases like 'recent' or 'this year'."
                .to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }]
    }

    async fn invoke(&self, tool: &str, _params: &Map<String, Value>) -> Result<Value, ToolError> {
        if tool != "current_time" {
            return Err(ToolError::new(tool, ToolErrorKind::NotFound, "unknown clock tool"));
        }
        let now = chrono::Utc::now();
        Ok(json!({
            "utc": now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "unixSeconds": now.timestamp(),
        }))
    }
}

/// One remote tool declared in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpToolSpec {
    /// Tool name exposed to the model.
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// JSON Schema for the parameters.
    #[serde(default = "empty_schema")]
    pub parameters: Value,
    /// URL receiving `POST {tool, parameters}`.
    pub endpoint: String,
    /// Whether calls may overlap across agents.
    #[serde(default = "default_true")]
    pub concurrent_safe: bool,
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    Wrapped { tools: Vec<HttpToolSpec> },
    Bare(Vec<HttpToolSpec>),
}

/// Remote tools reached over HTTP.
///
/// The provider is serialized as a whole if any of its tools is declared
/// not concurrent-safe.
pub struct HttpToolProvider {
    client: reqwest::Client,
    tools: Vec<HttpToolSpec>,
}

impl std::fmt::Debug for HttpToolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpToolProvider")
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl HttpToolProvider {
    /// Creates a provider for the given tool specs.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] if the HTTP client cannot be built.
    pub fn new(tools: Vec<HttpToolSpec>) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("heavy-rs/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AgentError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, tools })
    }

    /// Loads tool specs from a JSON manifest: either an array of specs or
    /// `{"tools": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Configuration`] if the file cannot be read or parsed.
    pub fn from_manifest(path: &Path) -> Result<Self, AgentError> {
        let raw = std::fs::read_to_string(path).map_err(|e| AgentError::Configuration {
            message: format!("cannot read tools file {}: {e}", path.display()),
        })?;
        let manifest: Manifest =
            serde_json::from_str(&raw).map_err(|e| AgentError::Configuration {
                message: format!("invalid tools file {}: {e}", path.display()),
            })?;
        let tools = match manifest {
            Manifest::Wrapped { tools } | Manifest::Bare(tools) => tools,
        };
        Self::new(tools)
    }

    fn classify(tool: &str, err: &reqwest::Error) -> ToolError {
        let kind = if err.is_connect() || err.is_timeout() {
            ToolErrorKind::Unavailable
        } else {
            ToolErrorKind::Execution
        };
        ToolError::new(tool, kind, err.to_string())
    }
}

#[async_trait]
impl ToolProvider for HttpToolProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect()
    }

    fn concurrent_safe(&self) -> bool {
        self.tools.iter().all(|t| t.concurrent_safe)
    }

    async fn invoke(&self, tool: &str, params: &Map<String, Value>) -> Result<Value, ToolError> {
        let Some(spec) = self.tools.iter().find(|t| t.name == tool) else {
            return Err(ToolError::new(tool, ToolErrorKind::NotFound, "not in manifest"));
        };

        let response = self
            .client
            .post(&spec.endpoint)
            .json(&json!({"tool": tool, "parameters": params}))
            .send()
            .await
            .map_err(|e| Self::classify(tool, &e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Self::classify(tool, &e))?;

        if status.is_server_error() {
            warn!(tool, status = status.as_u16(), "remote tool unavailable");
            return Err(ToolError::new(
                tool,
                ToolErrorKind::Unavailable,
                format!("HTTP {status}"),
            ));
        }
        if !status.is_success() {
            return Err(ToolError::new(
                tool,
                ToolErrorKind::Execution,
                format!("HTTP {status}: {body}"),
            ));
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use super::*;

    struct EchoProvider {
        tools: Vec<&'static str>,
        safe: bool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: StdMutex<Vec<String>>,
    }

    impl EchoProvider {
        fn new(tools: Vec<&'static str>, safe: bool) -> Self {
            Self {
                tools,
                safe,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ToolProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn definitions(&self) -> Vec<ToolDefinition> {
            self.tools
                .iter()
                .map(|n| ToolDefinition {
                    name: (*n).to_string(),
                    description: "echo".to_string(),
                    parameters: empty_schema(),
                })
                .collect()
        }

        fn concurrent_safe(&self) -> bool {
            self.safe
        }

        async fn invoke(
            &self,
            tool: &str,
            params: &Map<String, Value>,
        ) -> Result<Value, ToolError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(tool.to_string());
            Ok(Value::Object(params.clone()))
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut bridge = ToolBridge::new();
        assert!(bridge.register(Arc::new(EchoProvider::new(vec!["a"], true))).is_ok());
        let dup = bridge.register(Arc::new(EchoProvider::new(vec!["b", "a"], true)));
        assert!(matches!(dup, Err(AgentError::Configuration { .. })));
        // the rejected provider's other tools are not half-registered
        assert_eq!(bridge.definitions().len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_parses_arguments() {
        let mut bridge = ToolBridge::new();
        bridge
            .register(Arc::new(EchoProvider::new(vec!["echo"], true)))
            .unwrap_or_else(|e| unreachable!("{e}"));

        let inv = bridge.invoke(&call("echo", r#"{"q":"wind"}"#)).await;
        assert!(inv.is_ok());
        assert_eq!(inv.parameters.get("q"), Some(&json!("wind")));
        assert_eq!(inv.result, Some(json!({"q": "wind"})));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool_is_not_found() {
        let bridge = ToolBridge::new();
        let inv = bridge.invoke(&call("missing", "{}")).await;
        assert_eq!(inv.error.map(|e| e.kind), Some(ToolErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_invoke_rejects_bad_arguments() {
        let mut bridge = ToolBridge::new();
        bridge
            .register(Arc::new(EchoProvider::new(vec!["echo"], true)))
            .unwrap_or_else(|e| unreachable!("{e}"));

        let not_json = bridge.invoke(&call("echo", "{oops")).await;
        assert_eq!(
            not_json.error.map(|e| e.kind),
            Some(ToolErrorKind::InvalidArguments)
        );

        let array = bridge.invoke(&call("echo", "[1,2]")).await;
        assert_eq!(array.error.map(|e| e.kind), Some(ToolErrorKind::InvalidArguments));

        let huge = format!(r#"{{"q":"{}"}}"#, "x".repeat(MAX_ARGUMENT_BYTES));
        let oversized = bridge.invoke(&call("echo", &huge)).await;
        assert_eq!(
            oversized.error.map(|e| e.kind),
            Some(ToolErrorKind::InvalidArguments)
        );
    }

    #[tokio::test]
    async fn test_unsafe_provider_is_serialized() {
        let provider = Arc::new(EchoProvider::new(vec!["browser"], false));
        let mut bridge = ToolBridge::new();
        bridge
            .register(provider.clone())
            .unwrap_or_else(|e| unreachable!("{e}"));
        let bridge = Arc::new(bridge);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let bridge = Arc::clone(&bridge);
                tokio::spawn(async move { bridge.invoke(&call("browser", "{}")).await })
            })
            .collect();
        for h in handles {
            let _ = h.await;
        }

        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(
            provider
                .calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len(),
            4
        );
    }

    #[tokio::test]
    async fn test_safe_provider_runs_concurrently() {
        let provider = Arc::new(EchoProvider::new(vec!["lookup"], true));
        let mut bridge = ToolBridge::new();
        bridge
            .register(provider.clone())
            .unwrap_or_else(|e| unreachable!("{e}"));
        let bridge = Arc::new(bridge);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let bridge = Arc::clone(&bridge);
                tokio::spawn(async move { bridge.invoke(&call("lookup", "{}")).await })
            })
            .collect();
        for h in handles {
            let _ = h.await;
        }

        assert!(provider.max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_clock_provider() {
        let bridge = ToolBridge::with_defaults(None).unwrap_or_else(|e| unreachable!("{e}"));
        let inv = bridge.invoke(&call("current_time", "")).await;
        assert!(inv.is_ok());
        let utc = inv
            .result
            .as_ref()
            .and_then(|v| v.get("utc"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        assert!(utc.ends_with('Z'));
    }

    #[test]
    fn test_manifest_formats() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| unreachable!("{e}"));
        let bare = dir.path().join("bare.json");
        std::fs::write(
            &bare,
            r#"[{"name":"search","description":"web search","endpoint":"http://127.0.0.1:9/search"}]"#,
        )
        .unwrap_or_else(|e| unreachable!("{e}"));
        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(
            &wrapped,
            r#"{"tools":[{"name":"browser","description":"drive a browser","endpoint":"http://127.0.0.1:9/b","concurrent_safe":false}]}"#,
        )
        .unwrap_or_else(|e| unreachable!("{e}"));

        let bare = HttpToolProvider::from_manifest(&bare).unwrap_or_else(|e| unreachable!("{e}"));
        assert!(bare.concurrent_safe());
        assert_eq!(bare.definitions()[0].parameters["type"], "object");

        let wrapped =
            HttpToolProvider::from_manifest(&wrapped).unwrap_or_else(|e| unreachable!("{e}"));
        assert!(!wrapped.concurrent_safe());
    }

    #[test]
    fn test_manifest_missing_file() {
        let result = HttpToolProvider::from_manifest(Path::new("/nonexistent/tools.json"));
        assert!(matches!(result, Err(AgentError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_http_tool_connection_refused_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap_or_else(|e| unreachable!("{e}"));
        let addr = listener.local_addr().unwrap_or_else(|e| unreachable!("{e}"));
        drop(listener);

        let provider = HttpToolProvider::new(vec![HttpToolSpec {
            name: "search".to_string(),
            description: "web search".to_string(),
            parameters: empty_schema(),
            endpoint: format!("http://{addr}/search"),
            concurrent_safe: true,
        }])
        .unwrap_or_else(|e| unreachable!("{e}"));

        let err = provider.invoke("search", &Map::new()).await.err();
        assert_eq!(err.map(|e| e.kind), Some(ToolErrorKind::Unavailable));
    }

    #[test]
    fn test_timed_out_record() {
        let inv = ToolBridge::timed_out(&call("slow", r#"{"n":1}"#), Duration::from_millis(50));
        assert_eq!(inv.error.map(|e| e.kind), Some(ToolErrorKind::Timeout));
        assert_eq!(inv.parameters.get("n"), Some(&json!(1)));
        assert_eq!(inv.latency, Duration::from_millis(50));
    }
}
