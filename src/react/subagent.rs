//! 子智能体派生
//!
//! 每次 delegate-task 都新建一个只含 prompt 的会话，用角色的提示与能力子集跑同一个编排循环，
//! 父会话只拿到最终文本。子会话（含其 Todo 列表）在返回时即丢弃。

use std::path::Path;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::core::{AgentError, ToolError};
use crate::llm::LlmClient;
use crate::memory::Conversation;
use crate::react::events::{send_event, AgentEvent, EventSender};
use crate::react::loop_::{react_loop, ReactSession};
use crate::react::prompt::subagent_system_prompt;
use crate::tools::registry::DelegateTaskArgs;
use crate::tools::{AgentRole, AgentScope, DelegateFuture, TaskDelegate, ToolExecutor, ToolRegistry};

pub const NO_SUMMARY: &str = "(no summary)";

/// 子智能体派生器：与主循环共享模型、执行器与工具定义
pub struct SubagentSpawner<'a> {
    llm: &'a dyn LlmClient,
    executor: &'a ToolExecutor,
    registry: &'a ToolRegistry,
    workspace: &'a Path,
    event_tx: Option<&'a EventSender>,
}

impl<'a> SubagentSpawner<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        executor: &'a ToolExecutor,
        registry: &'a ToolRegistry,
        workspace: &'a Path,
    ) -> Self {
        Self {
            llm,
            executor,
            registry,
            workspace,
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: Option<&'a EventSender>) -> Self {
        self.event_tx = tx;
        self
    }

    /// 运行一个子智能体到结束，返回其最终文本；角色未知时立即失败
    pub async fn spawn(
        &self,
        role: &str,
        description: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let role = AgentRole::parse(role)?;
        let scope = AgentScope::Subagent(role);
        let system = subagent_system_prompt(role, self.workspace);
        let tools = self.registry.definitions_for(&scope.capabilities());
        let session = ReactSession::new(self.llm, self.executor, &system, &tools, scope, cancel)
            .with_event_tx(self.event_tx);

        send_event(
            self.event_tx,
            AgentEvent::SubagentStart {
                role: role.name().to_string(),
                description: description.to_string(),
            },
        );
        let start = Instant::now();
        let event_tx = self.event_tx;

        let mut conversation = Conversation::seeded(prompt);
        let span = tracing::info_span!("subagent", role = role.name());
        let result = react_loop(&session, &mut conversation, |count| {
            send_event(
                event_tx,
                AgentEvent::SubagentProgress {
                    role: role.name().to_string(),
                    description: description.to_string(),
                    tool_calls: count,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                },
            );
        })
        .instrument(span)
        .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(AgentError::Cancelled) => return Err(ToolError::Cancelled),
            Err(e) => {
                tracing::warn!(role = role.name(), error = %e, "subagent failed");
                return Err(ToolError::Subagent(e.to_string()));
            }
        };

        send_event(
            self.event_tx,
            AgentEvent::SubagentDone {
                role: role.name().to_string(),
                description: description.to_string(),
                tool_calls: outcome.tool_calls,
                elapsed_ms: start.elapsed().as_millis() as u64,
            },
        );
        tracing::info!(
            role = role.name(),
            tool_calls = outcome.tool_calls,
            rounds = outcome.rounds,
            "subagent done"
        );

        if outcome.final_text.trim().is_empty() {
            Ok(NO_SUMMARY.to_string())
        } else {
            Ok(outcome.final_text)
        }
    }
}

impl TaskDelegate for SubagentSpawner<'_> {
    fn delegate<'b>(
        &'b self,
        args: DelegateTaskArgs,
        cancel: &'b CancellationToken,
    ) -> DelegateFuture<'b> {
        Box::pin(async move {
            self.spawn(&args.role, &args.description, &args.prompt, cancel)
                .await
        })
    }
}
