//! Agent 运行时
//!
//! `Agent` 是显式传递的上下文对象：模型客户端、沙箱化的执行器、工具定义、技能注册表与主提示，
//! 构造后只读，可被多个会话共享。`Session` 持有主智能体的会话（消息 + Todo），跨轮次保留，
//! 每轮把用户输入（必要时附带提醒）追加进去后跑一次编排循环。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{create_llm_from_config, AppConfig};
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{Block, Conversation};
use crate::react::events::{send_event, AgentEvent, EventSender};
use crate::react::prompt::{main_system_prompt, INITIAL_REMINDER, NAG_AFTER_ROUNDS, NAG_REMINDER};
use crate::react::{react_loop, LoopOutcome, ReactSession, SubagentSpawner};
use crate::skills::SkillRegistry;
use crate::tools::{
    AgentScope, OutputLimits, Sandbox, ToolDefinition, ToolExecutor, ToolRegistry,
    DEFAULT_SHELL_TIMEOUT_SECS,
};

/// Agent 构建器：统一配置和初始化 Agent 的各个组件
pub struct AgentBuilder {
    workspace: PathBuf,
    llm: Option<Arc<dyn LlmClient>>,
    skills_dir: Option<PathBuf>,
    shell_timeout_secs: u64,
    limits: OutputLimits,
}

impl AgentBuilder {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            llm: None,
            skills_dir: None,
            shell_timeout_secs: DEFAULT_SHELL_TIMEOUT_SECS,
            limits: OutputLimits::default(),
        }
    }

    /// 从配置填充：工作区、技能目录、超时、输出上限与 LLM 客户端
    pub fn from_config(cfg: &AppConfig) -> std::io::Result<Self> {
        let workspace = cfg.workspace()?;
        std::fs::create_dir_all(&workspace)?;
        let skills_dir = cfg.skills_dir(&workspace);
        Ok(Self::new(workspace)
            .with_llm(create_llm_from_config(cfg))
            .with_skills_dir(skills_dir)
            .with_shell_timeout(cfg.tools.shell_timeout_secs)
            .with_output_limits(cfg.tools.output_limits()))
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_skills_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skills_dir = Some(dir.into());
        self
    }

    pub fn with_shell_timeout(mut self, secs: u64) -> Self {
        self.shell_timeout_secs = secs;
        self
    }

    pub fn with_output_limits(mut self, limits: OutputLimits) -> Self {
        self.limits = limits;
        self
    }

    /// 构建 Agent；未指定 LLM 时使用 Mock，未指定技能目录时使用 <workspace>/skills
    pub fn build(self) -> Agent {
        let sandbox = Sandbox::new(&self.workspace);
        let skills_dir = self
            .skills_dir
            .unwrap_or_else(|| sandbox.root().join("skills"));
        let skills = Arc::new(SkillRegistry::load(&skills_dir));
        let llm = self
            .llm
            .unwrap_or_else(|| Arc::new(crate::llm::MockLlmClient::new()));

        let registry = ToolRegistry::new(&skills.descriptions());
        let main_tools = registry.definitions_for(&AgentScope::Main.capabilities());
        let system_prompt = main_system_prompt(sandbox.root(), &skills.descriptions());
        let workspace = sandbox.root().to_path_buf();
        let executor = ToolExecutor::new(
            sandbox,
            Arc::clone(&skills),
            self.shell_timeout_secs,
            self.limits,
        );

        tracing::info!(
            workspace = %workspace.display(),
            skills = skills.len(),
            tools = main_tools.len(),
            "agent ready"
        );

        Agent {
            llm,
            executor,
            registry,
            main_tools,
            skills,
            workspace,
            system_prompt,
        }
    }
}

/// 进程内共享、构造后只读的 Agent 上下文
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    registry: ToolRegistry,
    main_tools: Vec<ToolDefinition>,
    skills: Arc<SkillRegistry>,
    workspace: PathBuf,
    system_prompt: String,
}

impl Agent {
    pub fn builder(workspace: impl Into<PathBuf>) -> AgentBuilder {
        AgentBuilder::new(workspace)
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    pub fn main_tools(&self) -> &[ToolDefinition] {
        &self.main_tools
    }

    /// 累计 token：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    fn spawner<'a>(&'a self, event_tx: Option<&'a EventSender>) -> SubagentSpawner<'a> {
        SubagentSpawner::new(self.llm.as_ref(), &self.executor, &self.registry, &self.workspace)
            .with_event_tx(event_tx)
    }

    /// 以主智能体身份驱动 conversation 直到模型不再请求工具
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
        event_tx: Option<&EventSender>,
    ) -> Result<LoopOutcome, AgentError> {
        let spawner = self.spawner(event_tx);
        let session = ReactSession::new(
            self.llm.as_ref(),
            &self.executor,
            &self.system_prompt,
            &self.main_tools,
            AgentScope::Main,
            cancel,
        )
        .with_delegate(&spawner)
        .with_event_tx(event_tx);
        react_loop(&session, conversation, |_| {}).await
    }
}

/// 主智能体会话：消息历史与 Todo 列表跨轮次保留
#[derive(Debug, Default)]
pub struct Session {
    conversation: Conversation,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// 跑一轮：追加用户输入后驱动循环，返回本轮所有回复文本的拼接
    ///
    /// 出错（模型失败或取消）时已追加的用户消息保留，下一轮输入会并入同一条消息。
    pub async fn run_turn(
        &mut self,
        agent: &Agent,
        input: &str,
        cancel: &CancellationToken,
        event_tx: Option<&EventSender>,
    ) -> Result<String, AgentError> {
        let mut blocks = Vec::with_capacity(2);
        if self.conversation.is_empty() {
            blocks.push(Block::text(INITIAL_REMINDER));
        } else if self.conversation.rounds_without_todo() > NAG_AFTER_ROUNDS {
            blocks.push(Block::text(NAG_REMINDER));
        }
        blocks.push(Block::text(input));
        self.conversation.push_user_blocks(blocks);

        let result = agent.run(&mut self.conversation, cancel, event_tx).await;
        match &result {
            Ok(_) => {
                let (prompt_tokens, completion_tokens, total_tokens) = agent.token_usage();
                send_event(
                    event_tx,
                    AgentEvent::TokenUsage {
                        prompt_tokens,
                        completion_tokens,
                        total_tokens,
                    },
                );
            }
            Err(e) => send_event(event_tx, AgentEvent::Error { text: e.to_string() }),
        }
        result.map(|outcome| outcome.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::memory::Role;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_first_turn_carries_initial_reminder() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::new());
        let agent = Agent::builder(dir.path()).with_llm(llm.clone()).build();
        let mut session = Session::new();
        let cancel = CancellationToken::new();

        let reply = session.run_turn(&agent, "hello", &cancel, None).await.unwrap();
        assert_eq!(reply, format!("Echo from Mock: {}\nhello", INITIAL_REMINDER));

        session.run_turn(&agent, "again", &cancel, None).await.unwrap();
        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].text(), "again");
        assert_eq!(llm.calls()[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_main_prompt_is_stable_across_calls() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::new());
        let agent = Agent::builder(dir.path()).with_llm(llm.clone()).build();
        let mut session = Session::new();
        let cancel = CancellationToken::new();
        session.run_turn(&agent, "a", &cancel, None).await.unwrap();
        session.run_turn(&agent, "b", &cancel, None).await.unwrap();
        let calls = llm.calls();
        assert_eq!(calls[0].system, calls[1].system);
        assert_eq!(calls[0].tools.len(), 7);
    }

    #[tokio::test]
    async fn test_cancelled_turn_merges_next_input() {
        let dir = TempDir::new().unwrap();
        let agent = Agent::builder(dir.path())
            .with_llm(Arc::new(MockLlmClient::new()))
            .build();
        let mut session = Session::new();
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let err = session
            .run_turn(&agent, "first", &cancelled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(session.conversation().len(), 1);

        session
            .run_turn(&agent, "second", &CancellationToken::new(), None)
            .await
            .unwrap();
        let first = &session.conversation().messages()[0];
        assert_eq!(first.role, Role::User);
        assert!(first.text().ends_with("first\nsecond"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_during_shell_keeps_history_paired() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::scripted(vec![
            MockLlmClient::tool_calls(vec![
                ("read-file", serde_json::json!({"path": "missing.txt"})),
                ("execute-command", serde_json::json!({"command": "sleep 5"})),
            ]),
            MockLlmClient::text("resumed"),
        ]));
        let agent = Agent::builder(dir.path()).with_llm(llm).build();
        let mut session = Session::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let err = session
            .run_turn(&agent, "go", &cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(session.conversation().len(), 1);
        assert!(session.conversation().dangling_calls().is_empty());

        let reply = session
            .run_turn(&agent, "continue", &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(reply, "resumed");
        assert_eq!(session.conversation().len(), 2);
    }
}
