//! OpenAI-compatible chat completions provider.
//!
//! Speaks the `/chat/completions` dialect with function calling, which is
//! what Groq and most hosted inference services expose. Features:
//! - Bearer authentication
//! - Tool definitions as `{"type": "function", "function": {...}}`
//! - Tool-use-failure detection: a 400 response flagged as a malformed
//!   tool invocation surfaces as `ProviderError::ToolUseFailed` with the
//!   provider's `failed_generation` text preserved

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use ironmind_core::error::ProviderError;
use ironmind_core::message::{Message, Role};
use ironmind_core::provider::{
    ChatProvider, ChatRequest, ChatResponse, ToolChoice, ToolDefinition, Usage,
};
use ironmind_core::tool::ToolCall;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible chat completions provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider with the given API key and request timeout.
    pub fn new(api_key: impl Into<String>, timeout: std::time::Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "openai_compat".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Use a custom base URL (proxies, self-hosted endpoints, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert the reasoning window to wire messages.
    fn to_api_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|msg| match msg.role {
                Role::System => serde_json::json!({
                    "role": "system",
                    "content": msg.content,
                }),
                Role::User => serde_json::json!({
                    "role": "user",
                    "content": msg.content,
                }),
                Role::Assistant => {
                    if msg.tool_calls.is_empty() {
                        serde_json::json!({
                            "role": "assistant",
                            "content": msg.content,
                        })
                    } else {
                        let calls: Vec<serde_json::Value> = msg
                            .tool_calls
                            .iter()
                            .map(|tc| {
                                serde_json::json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.arguments.to_string(),
                                    },
                                })
                            })
                            .collect();
                        serde_json::json!({
                            "role": "assistant",
                            "content": msg.content,
                            "tool_calls": calls,
                        })
                    }
                }
                Role::Tool => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "name": msg.name,
                    "content": msg.content,
                }),
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                })
            })
            .collect()
    }

    fn tool_choice_value(choice: ToolChoice) -> &'static str {
        match choice {
            ToolChoice::Auto => "auto",
            ToolChoice::Required => "required",
            ToolChoice::None => "none",
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    failed_generation: Option<String>,
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = serde_json::json!(Self::tool_choice_value(request.tool_choice));
        }

        debug!(model = %request.model, messages = request.messages.len(), "Sending chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_secs: 5 });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed("Invalid API key".into()));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();

            // A 400 flagged as a malformed tool invocation routes to the
            // reasoner's recovery path with the raw generation preserved.
            if status == 400 {
                if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&error_body) {
                    if let Some(detail) = parsed.error {
                        if detail.code.as_deref() == Some("tool_use_failed")
                            || detail
                                .message
                                .as_deref()
                                .is_some_and(|m| m.contains("tool use") || m.contains("tool call"))
                        {
                            return Err(ProviderError::ToolUseFailed {
                                message: detail
                                    .message
                                    .unwrap_or_else(|| "malformed tool invocation".into()),
                                failed_generation: detail.failed_generation,
                            });
                        }
                    }
                }
            }

            warn!(status, body = %error_body, "Chat API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse chat response: {e}"),
        })?;

        let choice = api_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "Response contained no choices".into(),
            })?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments).unwrap_or_default(),
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            usage: api_resp.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: api_resp.model.unwrap_or(request.model),
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_convert_to_wire_format() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::user("baca file README.md"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "filesystem".into(),
                    arguments: serde_json::json!({"operation": "read", "path": "README.md"}),
                }],
            ),
            Message::tool_observation("call_1", "filesystem", "Success: contents"),
        ];

        let wire = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "filesystem");
        // Arguments are serialized as a JSON string on the wire
        assert!(wire[2]["tool_calls"][0]["function"]["arguments"]
            .as_str()
            .unwrap()
            .contains("README.md"));
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn tools_convert_to_function_definitions() {
        let tools = vec![ToolDefinition {
            name: "shell".into(),
            description: "Run a command".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}, "required": []}),
        }];
        let wire = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(wire[0]["type"], "function");
        assert_eq!(wire[0]["function"]["name"], "shell");
    }

    #[test]
    fn tool_choice_values() {
        assert_eq!(OpenAiCompatProvider::tool_choice_value(ToolChoice::Auto), "auto");
        assert_eq!(
            OpenAiCompatProvider::tool_choice_value(ToolChoice::Required),
            "required"
        );
        assert_eq!(OpenAiCompatProvider::tool_choice_value(ToolChoice::None), "none");
    }

    #[test]
    fn error_body_parses_failed_generation() {
        let body = r#"{"error": {"message": "Failed to call a function", "code": "tool_use_failed", "failed_generation": "print('hi')"}}"#;
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap();
        let detail = parsed.error.unwrap();
        assert_eq!(detail.code.as_deref(), Some("tool_use_failed"));
        assert_eq!(detail.failed_generation.as_deref(), Some("print('hi')"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("key", std::time::Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9999/v1/");
        assert_eq!(provider.base_url, "http://localhost:9999/v1");
    }
}
