//! LLM 客户端抽象
//!
//! 所有后端（Anthropic 兼容 HTTP / Mock）实现 LlmClient：一次阻塞式 complete，
//! 输入 system + 历史 + 工具定义，输出内容块与停止原因。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::{Block, Message};
use crate::tools::ToolDefinition;

/// 模型停止生成的原因
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// 一次 complete 的结果
#[derive(Clone, Debug)]
pub struct LlmResponse {
    pub content: Vec<Block>,
    pub stop_reason: StopReason,
}

impl LlmResponse {
    pub fn into_message(self) -> Message {
        Message::assistant(self.content)
    }
}

/// LLM 调用错误：不在循环内吞掉，直接抛给调用方决定重试或放弃
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Client config error: {0}")]
    Config(String),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
