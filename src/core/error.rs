//! 错误类型
//!
//! 两层：`ToolError` 只在工具内部流动，由 ToolExecutor 统一转为 `Error: ...` 文本观察值回给模型；
//! `AgentError` 是编排循环唯一会向上抛出的错误（LLM 调用失败、取消）。

use thiserror::Error;

use crate::llm::LlmError;

/// 工具执行错误（沙箱拒绝、校验失败、超时、目标不存在等），永远不会中断编排循环
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Path escapes workspace: {0}")]
    PathEscape(String),

    #[error("Dangerous command blocked: {0}")]
    BlockedCommand(String),

    #[error("Command timed out ({0}s)")]
    Timeout(u64),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Unknown agent role '{0}'")]
    UnknownRole(String),

    #[error("Unknown skill '{name}'. Available: {available}")]
    UnknownSkill { name: String, available: String },

    /// 子智能体的模型调用失败；对父循环而言只是一次失败的工具调用
    #[error("Subagent failed: {0}")]
    Subagent(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// 转为回给模型的观察文本
    pub fn to_observation(&self) -> String {
        format!("Error: {}", self)
    }
}

/// 编排循环向调用方抛出的错误；工具失败不在此列
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Cancelled by user")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_prefix() {
        let err = ToolError::PathEscape("../etc/passwd".to_string());
        assert_eq!(
            err.to_observation(),
            "Error: Path escapes workspace: ../etc/passwd"
        );
    }

    #[test]
    fn test_unknown_skill_lists_available() {
        let err = ToolError::UnknownSkill {
            name: "pdf".to_string(),
            available: "git, mcp".to_string(),
        };
        assert_eq!(
            err.to_observation(),
            "Error: Unknown skill 'pdf'. Available: git, mcp"
        );
    }

    #[test]
    fn test_llm_error_wraps() {
        let err: AgentError = LlmError::Timeout(60).into();
        assert!(err.to_string().contains("LLM error"));
    }
}
