//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 两种模式：
//! - 默认：取最后一条 user 文本，直接回显为最终回复；
//! - 脚本：按顺序吐出预设的 LlmResponse，同时记录每次调用收到的 system / 历史 / 工具名，供测试断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{LlmClient, LlmError, LlmResponse, StopReason};
use crate::memory::{Block, Message, Role};
use crate::tools::ToolDefinition;

/// 一次调用的快照
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<LlmResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 构造「请求调用单个工具」的回复
    pub fn tool_call(name: &str, args: Value) -> LlmResponse {
        Self::tool_calls(vec![(name, args)])
    }

    pub fn tool_calls(calls: Vec<(&str, Value)>) -> LlmResponse {
        let content = calls
            .into_iter()
            .map(|(name, args)| Block::ToolCall {
                id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
                name: name.to_string(),
                args,
            })
            .collect();
        LlmResponse {
            content,
            stop_reason: StopReason::ToolUse,
        }
    }

    /// 构造最终文本回复
    pub fn text(text: &str) -> LlmResponse {
        LlmResponse {
            content: vec![Block::text(text)],
            stop_reason: StopReason::EndTurn,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn echo(messages: &[Message]) -> LlmResponse {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "(no input)".to_string());
        Self::text(&format!("Echo from Mock: {}", last_user))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system: system.to_string(),
                messages: messages.to_vec(),
                tools: tools.iter().map(|t| t.name.to_string()).collect(),
            });
        }
        let next = self
            .script
            .lock()
            .map_err(|e| LlmError::Http(e.to_string()))?
            .pop_front();
        Ok(next.unwrap_or_else(|| Self::echo(messages)))
    }
}
