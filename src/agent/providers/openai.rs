//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, vLLM, Ollama's
//! compatibility layer) via the base URL override.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequest, FunctionCall, FunctionObject,
    ResponseFormat,
};
use async_trait::async_trait;

use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::{ToolCall, ToolDefinition};
use crate::error::AgentError;

/// `OpenAI`-compatible LLM provider.
///
/// Wraps the `async-openai` client, which pools HTTP connections internally
/// and is safe to share across concurrent agent workers.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a provider for the given API key and optional base URL.
    #[must_use]
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);

        if let Some(base_url) = base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// Maps one conversation message onto the SDK's tagged message enum.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        let text = msg.content.clone();
        match msg.role {
            Role::System => ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(text),
                name: None,
            }
            .into(),
            Role::User => ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(text),
                name: None,
            }
            .into(),
            Role::Tool => ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(text),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }
            .into(),
            Role::Assistant => {
                // interim text next to tool calls is kept; an empty string is not sent
                let content = (!text.is_empty())
                    .then(|| ChatCompletionRequestAssistantMessageContent::Text(text));
                let tool_calls = (!msg.tool_calls.is_empty())
                    .then(|| msg.tool_calls.iter().map(sdk_tool_call).collect());

                #[allow(deprecated)]
                let assistant = ChatCompletionRequestAssistantMessage {
                    content,
                    name: None,
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                };
                assistant.into()
            }
        }
    }

    /// Builds the SDK request for `model`.
    fn build_request(model: &str, request: &ChatRequest) -> CreateChatCompletionRequest {
        let settings = request.settings;
        let tools = (!request.tools.is_empty())
            .then(|| request.tools.iter().map(sdk_tool).collect());

        CreateChatCompletionRequest {
            model: model.to_string(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            temperature: Some(settings.temperature).filter(|&t| t != 0.0),
            max_completion_tokens: Some(settings.max_tokens),
            response_format: settings.json_mode.then_some(ResponseFormat::JsonObject),
            tools,
            ..Default::default()
        }
    }

    /// Maps an SDK error, keeping the HTTP status when the transport exposes one.
    fn map_error(err: &OpenAIError) -> AgentError {
        let status = match err {
            OpenAIError::Reqwest(inner) => inner.status().map(|s| s.as_u16()),
            _ => None,
        };
        AgentError::ApiRequest {
            message: err.to_string(),
            status,
        }
    }
}

fn sdk_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

fn sdk_tool(def: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: def.name.clone(),
            description: Some(def.description.clone()),
            parameters: Some(def.parameters.clone()),
            strict: None,
        },
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(model, request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| Self::map_error(&e))?;

        let Some(choice) = response.choices.first() else {
            return Err(AgentError::ResponseParse {
                message: "response contained no choices".to_string(),
                content: String::new(),
            });
        };

        let tool_calls = choice.message.tool_calls.as_deref().map_or_else(Vec::new, |calls| {
            calls
                .iter()
                .map(|call| ToolCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                })
                .collect()
        });
        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            usage: usage.unwrap_or_default(),
            tool_calls,
            finish_reason: choice
                .finish_reason
                .as_ref()
                .map(|reason| format!("{reason:?}").to_lowercase()),
        })
    }

    async fn health_check(&self) -> Result<(), AgentError> {
        self.client
            .models()
            .list()
            .await
            .map(|_| ())
            .map_err(|e| Self::map_error(&e))
    }
}
