//! zc-agent - 单工作区编码智能体
//!
//! 模块划分：
//! - **agent**: Agent 上下文对象与主会话（Session）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、会话监管（单轮取消）
//! - **llm**: LLM 客户端抽象与实现（Anthropic Messages API / Mock）
//! - **memory**: 对话历史（消息、内容块、会话）
//! - **react**: 编排主循环、子智能体派生、系统提示、过程事件
//! - **skills**: 技能注册表（SKILL.md）
//! - **tools**: 工具注册表、角色、沙箱、Todo、各能力处理函数与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod skills;
pub mod tools;

pub use agent::{Agent, AgentBuilder, Session};
