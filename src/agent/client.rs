//! Provider factory and the tiered inference client.
//!
//! [`InferenceClient`] owns two endpoints: a high-capacity primary and a
//! low-capacity fallback. Every completion is bounded by the configured
//! request timeout. A failed [`InferenceClient::probe`] marks the primary
//! down and routes all primary-tier requests to the fallback for the rest
//! of the client's lifetime.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::config::HeavyConfig;
use crate::agent::message::{ChatRequest, ChatResponse};
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Creates an [`LlmProvider`] for the named backend.
///
/// # Supported Providers
///
/// - `"openai"` (default): OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(
    name: &str,
    api_key: &str,
    base_url: Option<&str>,
) -> Result<Arc<dyn LlmProvider>, AgentError> {
    match name {
        "openai" => Ok(Arc::new(OpenAiProvider::new(api_key, base_url))),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Which model an inference request targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// The high-capacity model.
    #[default]
    Primary,
    /// The low-capacity model.
    Fallback,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// A provider paired with the model it serves.
#[derive(Clone)]
pub struct Endpoint {
    /// Transport for this endpoint.
    pub provider: Arc<dyn LlmProvider>,
    /// Model name sent with each request.
    pub model: String,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Tiered, timeout-bounded access to the inference backends.
///
/// Shared by reference across all workers of an orchestration.
#[derive(Debug)]
pub struct InferenceClient {
    primary: Endpoint,
    fallback: Endpoint,
    request_timeout: Duration,
    primary_down: AtomicBool,
}

impl InferenceClient {
    /// Creates a client from explicit endpoints.
    pub const fn new(primary: Endpoint, fallback: Endpoint, request_timeout: Duration) -> Self {
        Self {
            primary,
            fallback,
            request_timeout,
            primary_down: AtomicBool::new(false),
        }
    }

    /// Builds both endpoints from configuration.
    ///
    /// The fallback reuses the primary transport unless its own key or
    /// base URL is configured.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedProvider`] for an unknown provider.
    pub fn from_config(config: &HeavyConfig) -> Result<Self, AgentError> {
        let primary = create_provider(&config.provider, &config.api_key, config.base_url.as_deref())?;

        let fallback = if config.fallback_api_key.is_some() || config.fallback_base_url.is_some() {
            let key = config.fallback_api_key.as_deref().unwrap_or(&config.api_key);
            let url = config
                .fallback_base_url
                .as_deref()
                .or(config.base_url.as_deref());
            create_provider(&config.provider, key, url)?
        } else {
            Arc::clone(&primary)
        };

        Ok(Self::new(
            Endpoint::new(primary, config.primary_model.clone()),
            Endpoint::new(fallback, config.fallback_model.clone()),
            config.request_timeout,
        ))
    }

    /// The tier a request for `tier` is actually served by.
    pub fn resolve(&self, tier: ModelTier) -> ModelTier {
        match tier {
            ModelTier::Primary if self.primary_down.load(Ordering::Acquire) => ModelTier::Fallback,
            other => other,
        }
    }

    /// The endpoint serving `tier` after routing.
    pub fn endpoint(&self, tier: ModelTier) -> &Endpoint {
        match self.resolve(tier) {
            ModelTier::Primary => &self.primary,
            ModelTier::Fallback => &self.fallback,
        }
    }

    /// Whether the primary endpoint is still in rotation.
    pub fn primary_available(&self) -> bool {
        !self.primary_down.load(Ordering::Acquire)
    }

    /// Checks the primary backend and takes it out of rotation if the
    /// health check fails or times out. Returns the resulting availability.
    pub async fn probe(&self) -> bool {
        let check = tokio::time::timeout(self.request_timeout, self.primary.provider.health_check());
        let outcome = match check.await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout {
                after: self.request_timeout,
            }),
        };

        match outcome {
            Ok(()) => {
                debug!(model = %self.primary.model, "primary endpoint healthy");
                true
            }
            Err(e) => {
                warn!(
                    model = %self.primary.model,
                    fallback = %self.fallback.model,
                    error = %e,
                    "primary endpoint unavailable, routing to fallback"
                );
                self.primary_down.store(true, Ordering::Release);
                false
            }
        }
    }

    /// Runs one completion against `tier`, bounded by the request timeout.
    ///
    /// Dropping the returned future aborts the in-flight request.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or [`AgentError::Timeout`] when the
    /// request timeout elapses first.
    pub async fn complete(
        &self,
        tier: ModelTier,
        request: &ChatRequest,
    ) -> Result<ChatResponse, AgentError> {
        let endpoint = self.endpoint(tier);
        debug!(
            tier = %self.resolve(tier),
            model = %endpoint.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "inference request"
        );

        tokio::time::timeout(
            self.request_timeout,
            endpoint.provider.chat(&endpoint.model, request),
        )
        .await
        .map_err(|_| AgentError::Timeout {
            after: self.request_timeout,
        })?
    }
}
