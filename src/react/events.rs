//! 编排过程事件：用于终端展示工具调用、观察预览、子智能体进度与 token 统计

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）；agent 字段为 "main" 或子智能体角色名
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 正在等待模型
    Thinking { agent: String },
    /// 模型给出的文本（中间轮次的说明或最终回复）
    Text { agent: String, text: String },
    /// 调用工具
    ToolCall {
        agent: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation {
        agent: String,
        tool: String,
        preview: String,
    },
    /// 技能已注入（只报告大小，不预览正文）
    SkillLoaded { skill: String, chars: usize },
    SubagentStart { role: String, description: String },
    /// 子智能体进度：已执行的工具数与耗时
    SubagentProgress {
        role: String,
        description: String,
        tool_calls: usize,
        elapsed_ms: u64,
    },
    SubagentDone {
        role: String,
        description: String,
        tool_calls: usize,
        elapsed_ms: u64,
    },
    /// Token 使用统计（累计）
    TokenUsage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
    /// 错误
    Error { text: String },
}

pub type EventSender = tokio::sync::mpsc::UnboundedSender<AgentEvent>;

pub(crate) fn send_event(tx: Option<&EventSender>, ev: AgentEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}
