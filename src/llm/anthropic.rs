//! Anthropic Messages API 兼容客户端
//!
//! 通过 reqwest 直接调用 `{base_url}/v1/messages`（可配置 base_url，兼容代理与自建网关）；
//! 内容块与工具定义按原生 tool_use / tool_result 格式收发。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{LlmClient, LlmError, LlmResponse, StopReason};
use crate::memory::{Block, Message, Role};
use crate::tools::ToolDefinition;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 8000;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// thinking 等暂不处理的块
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Anthropic 兼容客户端：持有 reqwest Client、端点、模型名与 API Key
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout_secs: u64,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl AnthropicClient {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: &str,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            timeout_secs,
            usage: TokenUsage::new(),
        })
    }

    fn endpoint(&self) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/messages", self.base_url)
        } else {
            format!("{}/v1/messages", self.base_url)
        }
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: m.content.iter().map(Self::to_api_block).collect(),
            })
            .collect()
    }

    fn to_api_block(block: &Block) -> ApiBlock {
        match block {
            Block::Text { text } => ApiBlock::Text { text: text.clone() },
            Block::ToolCall { id, name, args } => ApiBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: args.clone(),
            },
            Block::ToolResult { call_id, content } => ApiBlock::ToolResult {
                tool_use_id: call_id.clone(),
                content: content.clone(),
            },
        }
    }

    fn from_api_block(block: ApiBlock) -> Option<Block> {
        match block {
            ApiBlock::Text { text } => Some(Block::Text { text }),
            ApiBlock::ToolUse { id, name, input } => Some(Block::ToolCall {
                id,
                name,
                args: input,
            }),
            ApiBlock::ToolResult {
                tool_use_id,
                content,
            } => Some(Block::ToolResult {
                call_id: tool_use_id,
                content,
            }),
            ApiBlock::Unsupported => None,
        }
    }

    fn parse_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        let message = serde_json::from_str::<ApiErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        LlmError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError> {
        let request = ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: Self::to_api_messages(messages),
            tools: tools
                .iter()
                .map(|t| ApiTool {
                    name: t.name,
                    description: &t.description,
                    input_schema: &t.input_schema,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let parsed: ApiResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Decode(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            self.usage.add(usage.input_tokens, usage.output_tokens);
        }

        let stop_reason = parsed
            .stop_reason
            .as_deref()
            .map(StopReason::parse)
            .unwrap_or(StopReason::EndTurn);
        let content = parsed
            .content
            .into_iter()
            .filter_map(Self::from_api_block)
            .collect();

        Ok(LlmResponse {
            content,
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_handles_v1_suffix() {
        let a = AnthropicClient::new(None, DEFAULT_MODEL, "k", 100, 5).unwrap();
        assert_eq!(a.endpoint(), "https://api.anthropic.com/v1/messages");
        let b = AnthropicClient::new(Some("http://proxy/v1/"), DEFAULT_MODEL, "k", 100, 5).unwrap();
        assert_eq!(b.endpoint(), "http://proxy/v1/messages");
    }

    #[test]
    fn test_request_wire_format() {
        let messages = vec![
            Message::user("hi"),
            Message::assistant(vec![Block::ToolCall {
                id: "toolu_1".to_string(),
                name: "read-file".to_string(),
                args: serde_json::json!({"path": "a"}),
            }]),
            Message {
                role: Role::User,
                content: vec![Block::tool_result("toolu_1", "text")],
            },
        ];
        let api = AnthropicClient::to_api_messages(&messages);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json[1]["content"][0]["type"], "tool_use");
        assert_eq!(json[1]["content"][0]["input"]["path"], "a");
        assert_eq!(json[2]["content"][0]["type"], "tool_result");
        assert_eq!(json[2]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn test_response_parsing_skips_unknown_blocks() {
        let body = r#"{
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "Writing file"},
                {"type": "tool_use", "id": "toolu_9", "name": "write-file", "input": {"path": "n.txt", "content": "hi"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        let blocks: Vec<Block> = parsed
            .content
            .into_iter()
            .filter_map(AnthropicClient::from_api_block)
            .collect();
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[1], Block::ToolCall { name, .. } if name == "write-file"));
    }

    #[test]
    fn test_parse_error_extracts_message() {
        let err = AnthropicClient::parse_error(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        );
        assert_eq!(err.to_string(), "API error (401): invalid x-api-key");
    }
}
