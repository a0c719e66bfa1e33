//! zc - 编码智能体命令行入口
//!
//! `zc "<request>"` 单次执行；不带参数时进入 REPL（exit / quit / q 或 EOF 退出）。
//! Ctrl+C 只取消正在进行的一轮，会话历史保留。

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use zc_agent::config::{load_config, AppConfig};
use zc_agent::core::{AgentError, SessionSupervisor};
use zc_agent::react::AgentEvent;
use zc_agent::{observability, Agent, AgentBuilder, Session};

const MAIN_AGENT: &str = "main";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let agent = AgentBuilder::from_config(&cfg)
        .context("Failed to prepare workspace")?
        .build();

    let supervisor = Arc::new(SessionSupervisor::new());
    {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                supervisor.cancel();
            }
        });
    }

    let mut session = Session::new();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let input = args.join(" ");
        let cancel = supervisor.begin_turn();
        return match run_turn(&agent, &mut session, &input, &cancel).await {
            Ok(()) => Ok(()),
            Err(e) => Err(e.into()),
        };
    }

    println!("zc agent @ {}", agent.workspace().display());
    println!("Skills: {}", agent.skills().names().join(", "));
    println!("Type 'exit' to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }

        let cancel = supervisor.begin_turn();
        match run_turn(&agent, &mut session, input, &cancel).await {
            Ok(()) => {}
            Err(AgentError::Cancelled) => println!("\n(interrupted)"),
            Err(e) => eprintln!("Error: {}", e),
        }
        println!();
    }
    Ok(())
}

/// 跑一轮并同步打印过程事件（与回合在同一任务内交替，保证输出顺序）
async fn run_turn(
    agent: &Agent,
    session: &mut Session,
    input: &str,
    cancel: &CancellationToken,
) -> Result<(), AgentError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let turn = session.run_turn(agent, input, cancel, Some(&tx));
    tokio::pin!(turn);

    let result = loop {
        tokio::select! {
            biased;
            Some(ev) = rx.recv() => print_event(&ev),
            res = &mut turn => break res,
        }
    };
    while let Ok(ev) = rx.try_recv() {
        print_event(&ev);
    }
    result.map(|_| ())
}

fn print_event(ev: &AgentEvent) {
    match ev {
        AgentEvent::Text { agent, text } if agent == MAIN_AGENT => println!("{}", text),
        AgentEvent::ToolCall { agent, tool, .. } if agent == MAIN_AGENT => println!("\n> {}", tool),
        AgentEvent::Observation { agent, preview, .. } if agent == MAIN_AGENT => {
            println!("  {}", preview.replace('\n', "\n  "))
        }
        AgentEvent::SkillLoaded { skill, chars } => {
            println!("  Skill loaded: {} ({} chars)", skill, chars)
        }
        AgentEvent::SubagentStart { role, description } => {
            println!("  [{}] {}", role, description)
        }
        AgentEvent::SubagentProgress {
            role,
            description,
            tool_calls,
            elapsed_ms,
        } => {
            print!(
                "\r  [{}] {} ... {} tools, {:.1}s",
                role,
                description,
                tool_calls,
                *elapsed_ms as f64 / 1000.0
            );
            let _ = std::io::stdout().flush();
        }
        AgentEvent::SubagentDone {
            role,
            description,
            tool_calls,
            elapsed_ms,
        } => println!(
            "\r  [{}] {} - done ({} tools, {:.1}s)",
            role,
            description,
            tool_calls,
            *elapsed_ms as f64 / 1000.0
        ),
        AgentEvent::TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        } if *total_tokens > 0 => tracing::info!(
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "token usage"
        ),
        _ => {}
    }
}
