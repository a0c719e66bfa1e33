//! 对话历史：消息、内容块与单个会话
//!
//! 消息序列只追加、不改写，它就是模型的全部记忆。一次工具轮次由 `push_round`
//! 以「assistant(含 ToolCall) + user(含全部 ToolResult)」两条消息原子写入，
//! 保证每个 ToolCall 在下一次调用模型前都有且仅有一个同 id 的 ToolResult。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::TodoList;

/// 消息角色（与 LLM API 一致；system 不进入历史，单独传给模型）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 消息内容块
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text { text: String },
    /// 模型请求调用工具
    ToolCall { id: String, name: String, args: Value },
    /// 工具结果，call_id 对应 ToolCall.id
    ToolResult { call_id: String, content: String },
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Block::Text { text: text.into() }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Block::ToolResult {
            call_id: call_id.into(),
            content: content.into(),
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<Block>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Block::text(text)],
        }
    }

    pub fn assistant(content: Vec<Block>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// 所有 Text 块按顺序以换行拼接
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                Block::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|b| match b {
            Block::ToolCall { id, name, args } => Some((id.as_str(), name.as_str(), args)),
            _ => None,
        })
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }
}

/// 一个会话：自己的消息序列 + 自己的 Todo 列表
///
/// 主智能体的会话跨轮次保留；子智能体每次 spawn 都是全新会话，与父会话无任何引用关系。
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    pub todos: TodoList,
    /// 连续多少个工具轮次没有调用 update-tasks（用于提醒）
    rounds_without_todo: usize,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以一条用户消息开头的新会话（子智能体入口）
    pub fn seeded(prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.messages.push(Message::user(prompt));
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 追加用户文本；若最后一条已是 user 消息（上一轮被中断或失败），并入该消息以保持角色交替
    pub fn push_user_blocks(&mut self, blocks: Vec<Block>) {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::User => last.content.extend(blocks),
            _ => self.messages.push(Message {
                role: Role::User,
                content: blocks,
            }),
        }
    }

    pub fn push_user_text(&mut self, text: impl Into<String>) {
        self.push_user_blocks(vec![Block::text(text)]);
    }

    /// 模型最终回复（不含工具请求）；空白文本块不入历史，整条为空时不追加，下一条用户输入会并入前一条 user 消息
    pub fn push_final(&mut self, mut response: Message) {
        response
            .content
            .retain(|b| !matches!(b, Block::Text { text } if text.trim().is_empty()));
        if !response.content.is_empty() {
            self.messages.push(response);
        }
    }

    /// 原子写入一个工具轮次：assistant 请求 + 一条汇总全部结果的 user 消息
    pub fn push_round(&mut self, mut response: Message, results: Vec<Block>) {
        response
            .content
            .retain(|b| !matches!(b, Block::Text { text } if text.trim().is_empty()));
        self.messages.push(response);
        self.messages.push(Message {
            role: Role::User,
            content: results,
        });
    }

    /// 记录一个工具轮次是否更新过 Todo
    pub fn record_round(&mut self, used_todo: bool) {
        if used_todo {
            self.rounds_without_todo = 0;
        } else {
            self.rounds_without_todo += 1;
        }
    }

    pub fn rounds_without_todo(&self) -> usize {
        self.rounds_without_todo
    }

    /// 未配对的 ToolCall id（正常情况下永远为空）
    pub fn dangling_calls(&self) -> Vec<String> {
        let mut pending: Vec<String> = Vec::new();
        for message in &self.messages {
            for block in &message.content {
                match block {
                    Block::ToolCall { id, .. } => pending.push(id.clone()),
                    Block::ToolResult { call_id, .. } => pending.retain(|p| p != call_id),
                    Block::Text { .. } => {}
                }
            }
        }
        pending
    }
}
