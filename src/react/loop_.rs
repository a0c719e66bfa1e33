//! 编排主循环
//!
//! AwaitingOracle -> (HasActions | Done)：调用模型，若回复中没有工具请求则写入历史并结束；
//! 否则按模型给出的顺序逐个执行工具，把 assistant 请求与汇总全部结果的 user 消息一次性写入历史，再回到模型。
//! 循环本身没有步数上限；工具失败只是观察值，只有模型调用失败与取消会向上抛出。
//! 取消发生在模型调用或工具执行期间时，本轮不写入任何消息，历史中不会留下未配对的请求。

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{Block, Conversation};
use crate::react::events::{send_event, AgentEvent, EventSender};
use crate::tools::{AgentScope, TaskDelegate, ToolContext, ToolDefinition, ToolExecutor, ToolKind};

/// 一次循环运行的结果
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// 本轮所有回复中非空文本按顺序以换行拼接（主智能体的返回值）
    pub text: String,
    /// 最后一次回复的文本，可能为空（子智能体摘要）
    pub final_text: String,
    /// 执行过的工具调用总数
    pub tool_calls: usize,
    /// 工具轮次数
    pub rounds: usize,
}

/// 循环配置：模型、执行器、身份与其可见的工具定义
pub struct ReactSession<'a> {
    pub llm: &'a dyn LlmClient,
    pub executor: &'a ToolExecutor,
    pub system: &'a str,
    pub tools: &'a [ToolDefinition],
    pub scope: AgentScope,
    pub cancel_token: &'a CancellationToken,
    /// 可选：delegate-task 的执行方（只有主智能体会设置）
    pub delegate: Option<&'a dyn TaskDelegate>,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a EventSender>,
}

impl<'a> ReactSession<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        executor: &'a ToolExecutor,
        system: &'a str,
        tools: &'a [ToolDefinition],
        scope: AgentScope,
        cancel_token: &'a CancellationToken,
    ) -> Self {
        Self {
            llm,
            executor,
            system,
            tools,
            scope,
            cancel_token,
            delegate: None,
            event_tx: None,
        }
    }

    pub fn with_delegate(mut self, delegate: &'a dyn TaskDelegate) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn with_event_tx(mut self, tx: Option<&'a EventSender>) -> Self {
        self.event_tx = tx;
        self
    }

    fn agent_label(&self) -> String {
        match self.scope {
            AgentScope::Main => "main".to_string(),
            AgentScope::Subagent(role) => role.name().to_string(),
        }
    }
}

/// 驱动一个会话直到模型不再请求工具
///
/// `on_tool` 在每次工具执行后以累计调用数回调（子智能体用它上报进度）。
pub async fn react_loop(
    session: &ReactSession<'_>,
    conversation: &mut Conversation,
    mut on_tool: impl FnMut(usize) + Send,
) -> Result<LoopOutcome, AgentError> {
    let agent = session.agent_label();
    let cancel = session.cancel_token;
    let mut tool_calls = 0;
    let mut rounds = 0;
    let mut accumulated: Vec<String> = Vec::new();

    loop {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        send_event(session.event_tx, AgentEvent::Thinking { agent: agent.clone() });

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            r = session.llm.complete(session.system, conversation.messages(), session.tools) => r?,
        };
        tracing::debug!(
            agent = %agent,
            stop_reason = ?response.stop_reason,
            blocks = response.content.len(),
            "oracle round trip"
        );

        let message = response.into_message();
        let text = message.text();
        if !text.trim().is_empty() {
            accumulated.push(text.clone());
            send_event(
                session.event_tx,
                AgentEvent::Text {
                    agent: agent.clone(),
                    text: text.clone(),
                },
            );
        }

        if !message.has_tool_calls() {
            conversation.push_final(message);
            return Ok(LoopOutcome {
                text: accumulated.join("\n"),
                final_text: text,
                tool_calls,
                rounds,
            });
        }

        let calls: Vec<(String, String, Value)> = message
            .tool_calls()
            .map(|(id, name, args)| (id.to_string(), name.to_string(), args.clone()))
            .collect();

        let mut results = Vec::with_capacity(calls.len());
        let mut used_todo = false;
        for (id, name, args) in calls {
            send_event(
                session.event_tx,
                AgentEvent::ToolCall {
                    agent: agent.clone(),
                    tool: name.clone(),
                    args: args.clone(),
                },
            );

            let mut ctx = ToolContext {
                scope: session.scope,
                todos: &mut conversation.todos,
                delegate: session.delegate,
                cancel,
            };
            let output = session.executor.execute(&name, args, &mut ctx).await?;
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            tool_calls += 1;
            on_tool(tool_calls);
            if name == ToolKind::UpdateTasks.name() {
                used_todo = true;
            }
            emit_observation(session, &agent, &name, &output);
            results.push(Block::tool_result(id, output));
        }

        conversation.push_round(message, results);
        conversation.record_round(used_todo);
        rounds += 1;
    }
}

fn emit_observation(session: &ReactSession<'_>, agent: &str, tool: &str, output: &str) {
    let ev = if tool == ToolKind::LoadSkill.name() && !output.starts_with("Error:") {
        AgentEvent::SkillLoaded {
            skill: skill_name(output).unwrap_or_default(),
            chars: output.chars().count(),
        }
    } else {
        AgentEvent::Observation {
            agent: agent.to_string(),
            tool: tool.to_string(),
            preview: session.executor.limits().preview(output),
        }
    };
    send_event(session.event_tx, ev);
}

/// 从 `<skill-loaded name="X">` 包装中取回技能名
fn skill_name(output: &str) -> Option<String> {
    let rest = output.strip_prefix("<skill-loaded name=\"")?;
    rest.split('"').next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::llm::{LlmResponse, MockLlmClient, StopReason};
    use crate::memory::Role;
    use crate::skills::SkillRegistry;
    use crate::tools::{OutputLimits, Sandbox, ToolRegistry};
    use serde_json::json;
    use tempfile::TempDir;

    fn executor(dir: &TempDir) -> ToolExecutor {
        ToolExecutor::new(
            Sandbox::new(dir.path()),
            Arc::new(SkillRegistry::empty()),
            10,
            OutputLimits::default(),
        )
    }

    #[tokio::test]
    async fn test_results_batched_in_request_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "A").unwrap();
        std::fs::write(dir.path().join("b.txt"), "B").unwrap();
        let llm = MockLlmClient::scripted(vec![
            MockLlmClient::tool_calls(vec![
                ("read-file", json!({"path": "a.txt"})),
                ("read-file", json!({"path": "b.txt"})),
            ]),
            MockLlmClient::text("done"),
        ]);
        let exec = executor(&dir);
        let tools = ToolRegistry::new("").definitions_for(&ToolKind::ALL);
        let cancel = CancellationToken::new();
        let session = ReactSession::new(&llm, &exec, "sys", &tools, AgentScope::Main, &cancel);

        let mut conv = Conversation::seeded("read both");
        let outcome = react_loop(&session, &mut conv, |_| {}).await.unwrap();
        assert_eq!(outcome.text, "done");
        assert_eq!(outcome.tool_calls, 2);
        assert_eq!(outcome.rounds, 1);

        let messages = conv.messages();
        assert_eq!(messages.len(), 4);
        let ids: Vec<&str> = messages[1].tool_calls().map(|(id, _, _)| id).collect();
        let results = &messages[2];
        assert_eq!(results.role, Role::User);
        assert_eq!(
            results.content,
            vec![Block::tool_result(ids[0], "A"), Block::tool_result(ids[1], "B")]
        );
        assert!(conv.dangling_calls().is_empty());
    }

    #[tokio::test]
    async fn test_text_accumulates_across_rounds() {
        let dir = TempDir::new().unwrap();
        let mut first = MockLlmClient::tool_call(
            "write-file",
            json!({"path": "n.txt", "content": "hi"}),
        );
        first.content.insert(0, Block::text("I will create the file first."));
        let llm = MockLlmClient::scripted(vec![first, MockLlmClient::text("Done.")]);
        let exec = executor(&dir);
        let tools = ToolRegistry::new("").definitions_for(&ToolKind::ALL);
        let cancel = CancellationToken::new();
        let session = ReactSession::new(&llm, &exec, "sys", &tools, AgentScope::Main, &cancel);

        let mut conv = Conversation::seeded("make n.txt");
        let outcome = react_loop(&session, &mut conv, |_| {}).await.unwrap();
        assert_eq!(outcome.text, "I will create the file first.\nDone.");
        assert_eq!(outcome.final_text, "Done.");
    }

    #[tokio::test]
    async fn test_tool_use_stop_without_calls_terminates() {
        let dir = TempDir::new().unwrap();
        let llm = MockLlmClient::scripted(vec![LlmResponse {
            content: vec![Block::text("nothing to do")],
            stop_reason: StopReason::ToolUse,
        }]);
        let exec = executor(&dir);
        let cancel = CancellationToken::new();
        let session = ReactSession::new(&llm, &exec, "sys", &[], AgentScope::Main, &cancel);
        let mut conv = Conversation::seeded("hi");
        let outcome = react_loop(&session, &mut conv, |_| {}).await.unwrap();
        assert_eq!(outcome.text, "nothing to do");
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_oracle_leaves_history_untouched() {
        let dir = TempDir::new().unwrap();
        let llm = MockLlmClient::scripted(vec![MockLlmClient::text("never")]);
        let exec = executor(&dir);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let session = ReactSession::new(&llm, &exec, "sys", &[], AgentScope::Main, &cancel);
        let mut conv = Conversation::seeded("hi");
        let err = react_loop(&session, &mut conv, |_| {}).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(conv.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_mid_batch_records_nothing() {
        let dir = TempDir::new().unwrap();
        let llm = MockLlmClient::scripted(vec![
            MockLlmClient::tool_calls(vec![
                ("write-file", json!({"path": "first.txt", "content": "1"})),
                ("execute-command", json!({"command": "sleep 5"})),
            ]),
            MockLlmClient::text("never"),
        ]);
        let exec = executor(&dir);
        let tools = ToolRegistry::new("").definitions_for(&ToolKind::ALL);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            trigger.cancel();
        });
        let session = ReactSession::new(&llm, &exec, "sys", &tools, AgentScope::Main, &cancel);

        let mut conv = Conversation::seeded("two steps");
        let mut seen = 0;
        let err = react_loop(&session, &mut conv, |n| seen = n)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        // 第一个调用已生效，但整个轮次都不入历史
        assert_eq!(seen, 1);
        assert!(dir.path().join("first.txt").exists());
        assert_eq!(conv.len(), 1);
        assert!(conv.dangling_calls().is_empty());
        assert_eq!(llm.remaining(), 1);
    }

    #[tokio::test]
    async fn test_update_tasks_resets_round_counter() {
        let dir = TempDir::new().unwrap();
        let llm = MockLlmClient::scripted(vec![
            MockLlmClient::tool_call("execute-command", json!({"command": "echo hi"})),
            MockLlmClient::tool_call(
                "update-tasks",
                json!({"items": [{"content": "A", "status": "pending", "activeForm": "Doing A"}]}),
            ),
            MockLlmClient::text("ok"),
        ]);
        let exec = executor(&dir);
        let tools = ToolRegistry::new("").definitions_for(&ToolKind::ALL);
        let cancel = CancellationToken::new();
        let session = ReactSession::new(&llm, &exec, "sys", &tools, AgentScope::Main, &cancel);
        let mut conv = Conversation::seeded("go");
        react_loop(&session, &mut conv, |_| {}).await.unwrap();
        assert_eq!(conv.rounds_without_todo(), 0);
        assert_eq!(conv.todos.items().len(), 1);
    }

    #[test]
    fn test_skill_name_from_wrapper() {
        assert_eq!(
            skill_name("<skill-loaded name=\"pdf\">\n# Skill: pdf").as_deref(),
            Some("pdf")
        );
        assert_eq!(skill_name("Error: nope"), None);
    }
}
