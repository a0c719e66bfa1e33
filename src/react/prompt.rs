//! 系统提示（framing）
//!
//! 主智能体的提示在进程启动时构造一次，之后不再改动：技能摘要常驻于此，
//! 技能正文只通过 load-skill 的结果追加到对话末尾，稳定前缀因此可被缓存。

use std::path::Path;

use crate::tools::{role_descriptions, AgentRole};

pub const INITIAL_REMINDER: &str = "<reminder>Use update-tasks for multi-step tasks.</reminder>";
pub const NAG_REMINDER: &str =
    "<reminder>10+ turns without todo update. Please update todos.</reminder>";

/// 连续多少个工具轮次未更新 Todo 后提醒
pub const NAG_AFTER_ROUNDS: usize = 10;

pub fn main_system_prompt(workspace: &Path, skill_descriptions: &str) -> String {
    format!(
        "You are a coding agent at {workspace}.\n\n\
         Loop: plan -> act with tools -> report.\n\n\
         **Skills available** (invoke with load-skill when task matches):\n\
         {skills}\n\n\
         **Subagents available** (invoke with delegate-task for focused subtasks):\n\
         {roles}\n\n\
         Rules:\n\
         - Use load-skill IMMEDIATELY when a task matches a skill description\n\
         - Use delegate-task for subtasks needing focused exploration or implementation\n\
         - Use update-tasks to track multi-step work\n\
         - Prefer tools over prose. Act, don't just explain.\n\
         - After finishing, summarize what changed.",
        workspace = workspace.display(),
        skills = skill_descriptions,
        roles = role_descriptions(),
    )
}

pub fn subagent_system_prompt(role: AgentRole, workspace: &Path) -> String {
    format!(
        "You are a {} subagent at {}.\n\n{}\n\nComplete the task and return a clear, concise summary.",
        role.name(),
        workspace.display(),
        role.config().prompt
    )
}
