//! 工具执行器
//!
//! 按名字查找能力（先按当前身份过滤，不可见的能力与不存在的能力同样报 Unknown tool），
//! 反序列化为带类型的参数后分发给对应处理函数。除取消外的所有失败都转为 `Error: ...` 文本观察值，
//! 编排循环因此不会因工具失败而中断；每次调用输出一条结构化审计日志（JSON）。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, ToolError};
use crate::skills::SkillRegistry;
use crate::tools::filesystem::FileTools;
use crate::tools::output::OutputLimits;
use crate::tools::registry::{DelegateTaskArgs, ToolCall, ToolKind};
use crate::tools::roles::AgentScope;
use crate::tools::sandbox::Sandbox;
use crate::tools::shell::ShellTool;
use crate::tools::todo::TodoList;

pub type DelegateFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

/// delegate-task 的执行方（子智能体派生器）；返回装箱 future 以打断 循环 -> 执行器 -> 循环 的递归类型
pub trait TaskDelegate: Send + Sync {
    fn delegate<'a>(
        &'a self,
        args: DelegateTaskArgs,
        cancel: &'a CancellationToken,
    ) -> DelegateFuture<'a>;
}

/// 单次调用的上下文：调用方身份、其会话独占的 Todo 列表、可选的委派方、取消令牌
pub struct ToolContext<'a> {
    pub scope: AgentScope,
    pub todos: &'a mut TodoList,
    pub delegate: Option<&'a dyn TaskDelegate>,
    pub cancel: &'a CancellationToken,
}

/// 工具执行器：持有沙箱化的 shell / 文件处理函数与技能注册表
pub struct ToolExecutor {
    shell: ShellTool,
    files: FileTools,
    skills: Arc<SkillRegistry>,
    limits: OutputLimits,
}

impl ToolExecutor {
    pub fn new(
        sandbox: Sandbox,
        skills: Arc<SkillRegistry>,
        shell_timeout_secs: u64,
        limits: OutputLimits,
    ) -> Self {
        Self {
            shell: ShellTool::new(sandbox.clone(), shell_timeout_secs, limits),
            files: FileTools::new(sandbox, limits),
            skills,
            limits,
        }
    }

    pub fn limits(&self) -> OutputLimits {
        self.limits
    }

    /// 执行一次调用；只有取消会以 Err 返回，其余结果（含失败）都是观察文本
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<String, AgentError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = self.dispatch(tool_name, args, ctx).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(_) => (true, "ok"),
            Err(ToolError::Cancelled) => (false, "cancelled"),
            Err(ToolError::Timeout(_)) => (false, "timeout"),
            Err(ToolError::PathEscape(_)) | Err(ToolError::BlockedCommand(_)) => (false, "rejected"),
            Err(_) => (false, "error"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "scope": scope_label(ctx.scope),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(content) => Ok(content),
            Err(ToolError::Cancelled) => Err(AgentError::Cancelled),
            Err(e) => Ok(e.to_observation()),
        }
    }

    async fn dispatch(
        &self,
        tool_name: &str,
        args: Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<String, ToolError> {
        let kind = ToolKind::from_name(tool_name)
            .filter(|k| ctx.scope.allows(*k))
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        match ToolCall::parse(kind, args)? {
            ToolCall::ExecuteCommand(a) => self.shell.execute(a, ctx.cancel).await,
            ToolCall::ReadFile(a) => self.files.read(a).await,
            ToolCall::WriteFile(a) => self.files.write(a).await,
            ToolCall::EditFile(a) => self.files.edit(a).await,
            ToolCall::UpdateTasks(a) => ctx.todos.replace(a.items),
            ToolCall::DelegateTask(a) => {
                let delegate = ctx
                    .delegate
                    .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;
                let summary = delegate.delegate(a, ctx.cancel).await?;
                Ok(self.limits.clip_output(&summary))
            }
            ToolCall::LoadSkill(a) => {
                let content = self.skills.content(&a.skill)?;
                Ok(skill_loaded(&a.skill, &content))
            }
        }
    }
}

/// load-skill 的返回包装
pub fn skill_loaded(name: &str, content: &str) -> String {
    format!(
        "<skill-loaded name=\"{}\">\n{}\n</skill-loaded>\n\nFollow the instructions in the skill above to complete the user's task.",
        name, content
    )
}

fn scope_label(scope: AgentScope) -> &'static str {
    match scope {
        AgentScope::Main => "main",
        AgentScope::Subagent(role) => role.name(),
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
