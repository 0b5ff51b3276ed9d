//! Orchestration configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default ceiling on concurrent agents per call (`MAX_AGENTS`).
pub const DEFAULT_MAX_AGENTS: usize = 8;
/// Default model-call ceiling per agent.
const DEFAULT_MAX_STEPS: usize = 10;
/// Default per-agent timeout in seconds.
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 180;
/// Default whole-call timeout in seconds.
const DEFAULT_OVERALL_TIMEOUT_SECS: u64 = 300;
/// Default latency bound for one inference call.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
/// Default latency bound for one tool call.
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
/// Default worker max tokens.
const DEFAULT_WORKER_MAX_TOKENS: u32 = 4096;
/// Default question generator max tokens.
const DEFAULT_QUESTION_MAX_TOKENS: u32 = 1024;
/// Default synthesizer max tokens.
const DEFAULT_SYNTHESIZER_MAX_TOKENS: u32 = 4096;
/// Default high-capacity model.
const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o";
/// Default low-capacity model.
const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";

/// Configuration for the orchestration core.
#[derive(Debug, Clone)]
pub struct HeavyConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the primary endpoint.
    pub api_key: String,
    /// Optional base URL override for the primary endpoint.
    pub base_url: Option<String>,
    /// High-capacity model.
    pub primary_model: String,
    /// Low-capacity model used for the single retry and when the primary is down.
    pub fallback_model: String,
    /// API key for the fallback endpoint (defaults to `api_key`).
    pub fallback_api_key: Option<String>,
    /// Base URL for the fallback endpoint (defaults to `base_url`).
    pub fallback_base_url: Option<String>,
    /// Admission ceiling on `agentCount`.
    pub max_agents: usize,
    /// Agent count used when a request omits one. `None` means dynamic sizing.
    pub default_agent_count: Option<usize>,
    /// Per-agent timeout armed at `Pending → Running`.
    pub per_agent_timeout: Duration,
    /// Whole-call timeout for the execute phase.
    pub overall_timeout: Duration,
    /// Latency bound for one inference call.
    pub request_timeout: Duration,
    /// Latency bound for one tool call.
    pub tool_timeout: Duration,
    /// Model-call ceiling per agent.
    pub max_steps: usize,
    /// Maximum tokens for worker responses.
    pub worker_max_tokens: u32,
    /// Maximum tokens for the question generator.
    pub question_max_tokens: u32,
    /// Maximum tokens for the synthesizer.
    pub synthesizer_max_tokens: u32,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<PathBuf>,
    /// JSON manifest of remote HTTP tools.
    pub tools_file: Option<PathBuf>,
}

impl HeavyConfig {
    /// Creates a new builder for `HeavyConfig`.
    #[must_use]
    pub fn builder() -> HeavyConfigBuilder {
        HeavyConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`HeavyConfig`].
#[derive(Debug, Clone, Default)]
pub struct HeavyConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    primary_model: Option<String>,
    fallback_model: Option<String>,
    fallback_api_key: Option<String>,
    fallback_base_url: Option<String>,
    max_agents: Option<usize>,
    default_agent_count: Option<usize>,
    per_agent_timeout: Option<Duration>,
    overall_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    max_steps: Option<usize>,
    worker_max_tokens: Option<u32>,
    question_max_tokens: Option<u32>,
    synthesizer_max_tokens: Option<u32>,
    prompt_dir: Option<PathBuf>,
    tools_file: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}

impl HeavyConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("HEAVY_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("HEAVY_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("HEAVY_BASE_URL"))
                .ok();
        }
        if self.primary_model.is_none() {
            self.primary_model = std::env::var("HEAVY_PRIMARY_MODEL").ok();
        }
        if self.fallback_model.is_none() {
            self.fallback_model = std::env::var("HEAVY_FALLBACK_MODEL").ok();
        }
        if self.fallback_api_key.is_none() {
            self.fallback_api_key = std::env::var("HEAVY_FALLBACK_API_KEY").ok();
        }
        if self.fallback_base_url.is_none() {
            self.fallback_base_url = std::env::var("HEAVY_FALLBACK_BASE_URL").ok();
        }
        if self.max_agents.is_none() {
            self.max_agents = env_parse("HEAVY_MAX_AGENTS");
        }
        if self.default_agent_count.is_none() {
            self.default_agent_count = env_parse("HEAVY_AGENT_COUNT");
        }
        if self.per_agent_timeout.is_none() {
            self.per_agent_timeout = env_secs("HEAVY_AGENT_TIMEOUT_SECS");
        }
        if self.overall_timeout.is_none() {
            self.overall_timeout = env_secs("HEAVY_TIMEOUT_SECS");
        }
        if self.request_timeout.is_none() {
            self.request_timeout = env_secs("HEAVY_REQUEST_TIMEOUT_SECS");
        }
        if self.tool_timeout.is_none() {
            self.tool_timeout = env_secs("HEAVY_TOOL_TIMEOUT_SECS");
        }
        if self.max_steps.is_none() {
            self.max_steps = env_parse("HEAVY_MAX_STEPS");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("HEAVY_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.tools_file.is_none() {
            self.tools_file = std::env::var("HEAVY_TOOLS_FILE").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the primary model.
    #[must_use]
    pub fn primary_model(mut self, model: impl Into<String>) -> Self {
        self.primary_model = Some(model.into());
        self
    }

    /// Sets the fallback model.
    #[must_use]
    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(model.into());
        self
    }

    /// Sets the fallback endpoint base URL.
    #[must_use]
    pub fn fallback_base_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(url.into());
        self
    }

    /// Sets the admission ceiling on agents per call.
    #[must_use]
    pub const fn max_agents(mut self, n: usize) -> Self {
        self.max_agents = Some(n);
        self
    }

    /// Sets the agent count used when a request omits one.
    #[must_use]
    pub const fn default_agent_count(mut self, n: usize) -> Self {
        self.default_agent_count = Some(n);
        self
    }

    /// Sets the per-agent timeout.
    #[must_use]
    pub const fn per_agent_timeout(mut self, duration: Duration) -> Self {
        self.per_agent_timeout = Some(duration);
        self
    }

    /// Sets the whole-call timeout.
    #[must_use]
    pub const fn overall_timeout(mut self, duration: Duration) -> Self {
        self.overall_timeout = Some(duration);
        self
    }

    /// Sets the latency bound for one inference call.
    #[must_use]
    pub const fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Sets the latency bound for one tool call.
    #[must_use]
    pub const fn tool_timeout(mut self, duration: Duration) -> Self {
        self.tool_timeout = Some(duration);
        self
    }

    /// Sets the model-call ceiling per agent.
    #[must_use]
    pub const fn max_steps(mut self, n: usize) -> Self {
        self.max_steps = Some(n);
        self
    }

    /// Sets the worker max tokens.
    #[must_use]
    pub const fn worker_max_tokens(mut self, n: u32) -> Self {
        self.worker_max_tokens = Some(n);
        self
    }

    /// Sets the question generator max tokens.
    #[must_use]
    pub const fn question_max_tokens(mut self, n: u32) -> Self {
        self.question_max_tokens = Some(n);
        self
    }

    /// Sets the synthesizer max tokens.
    #[must_use]
    pub const fn synthesizer_max_tokens(mut self, n: u32) -> Self {
        self.synthesizer_max_tokens = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the remote tool manifest path.
    #[must_use]
    pub fn tools_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tools_file = Some(path.into());
        self
    }

    /// Builds the [`HeavyConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::Configuration`] for a zero agent ceiling, step budget
    /// or timeout.
    pub fn build(self) -> Result<HeavyConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let config = HeavyConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            primary_model: self
                .primary_model
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model: self
                .fallback_model
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            fallback_api_key: self.fallback_api_key,
            fallback_base_url: self.fallback_base_url,
            max_agents: self.max_agents.unwrap_or(DEFAULT_MAX_AGENTS),
            default_agent_count: self.default_agent_count,
            per_agent_timeout: self
                .per_agent_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_AGENT_TIMEOUT_SECS)),
            overall_timeout: self
                .overall_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_OVERALL_TIMEOUT_SECS)),
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            tool_timeout: self
                .tool_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)),
            max_steps: self.max_steps.unwrap_or(DEFAULT_MAX_STEPS),
            worker_max_tokens: self.worker_max_tokens.unwrap_or(DEFAULT_WORKER_MAX_TOKENS),
            question_max_tokens: self
                .question_max_tokens
                .unwrap_or(DEFAULT_QUESTION_MAX_TOKENS),
            synthesizer_max_tokens: self
                .synthesizer_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIZER_MAX_TOKENS),
            prompt_dir: self.prompt_dir,
            tools_file: self.tools_file,
        };

        if config.max_agents == 0 {
            return Err(AgentError::Configuration {
                message: "max_agents must be at least 1".to_string(),
            });
        }
        if config.max_steps == 0 {
            return Err(AgentError::Configuration {
                message: "max_steps must be at least 1".to_string(),
            });
        }
        let timeouts = [
            ("per_agent_timeout", config.per_agent_timeout),
            ("overall_timeout", config.overall_timeout),
            ("request_timeout", config.request_timeout),
            ("tool_timeout", config.tool_timeout),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(AgentError::Configuration {
                message: format!("{name} must be non-zero"),
            });
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = HeavyConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_agents, DEFAULT_MAX_AGENTS);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.primary_model, DEFAULT_PRIMARY_MODEL);
        assert_eq!(config.fallback_model, DEFAULT_FALLBACK_MODEL);
        assert!(config.default_agent_count.is_none());
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = HeavyConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = HeavyConfig::builder()
            .api_key("key")
            .primary_model("big")
            .fallback_model("small")
            .max_agents(4)
            .max_steps(3)
            .overall_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.primary_model, "big");
        assert_eq!(config.fallback_model, "small");
        assert_eq!(config.max_agents, 4);
        assert_eq!(config.max_steps, 3);
        assert_eq!(config.overall_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_rejects_zero_agents() {
        let result = HeavyConfig::builder().api_key("k").max_agents(0).build();
        assert!(matches!(result, Err(AgentError::Configuration { .. })));
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = HeavyConfig::builder()
            .api_key("k")
            .tool_timeout(Duration::ZERO)
            .build();
        let Err(AgentError::Configuration { message }) = result else {
            unreachable!()
        };
        assert!(message.contains("tool_timeout"));
    }
}
