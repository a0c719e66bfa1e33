//! 子智能体角色表
//!
//! 静态配置：每个角色 = 描述 + 允许的能力 + 角色提示词。
//! 子智能体的能力集合只能取自 ToolKind::BASE，委派能力从结构上就不可达，因此递归深度恒为 1。

use crate::core::ToolError;
use crate::tools::registry::ToolKind;

/// 角色允许的能力
#[derive(Debug, Clone, Copy)]
pub enum Capabilities {
    /// 全部基础能力（不含委派）
    All,
    Only(&'static [ToolKind]),
}

/// 静态角色配置
#[derive(Debug)]
pub struct RoleConfig {
    pub role: AgentRole,
    pub name: &'static str,
    pub description: &'static str,
    pub allowed: Capabilities,
    pub prompt: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Explore,
    Code,
    Plan,
}

const READ_ONLY: &[ToolKind] = &[ToolKind::ExecuteCommand, ToolKind::ReadFile];

pub const ROLES: &[RoleConfig] = &[
    RoleConfig {
        role: AgentRole::Explore,
        name: "explore",
        description: "Read-only agent for exploring code, finding files, searching",
        allowed: Capabilities::Only(READ_ONLY),
        prompt: "You are an exploration agent. Search and analyze, but never modify files. Return a concise summary.",
    },
    RoleConfig {
        role: AgentRole::Code,
        name: "code",
        description: "Full agent for implementing features and fixing bugs",
        allowed: Capabilities::All,
        prompt: "You are a coding agent. Implement the requested changes efficiently.",
    },
    RoleConfig {
        role: AgentRole::Plan,
        name: "plan",
        description: "Planning agent for designing implementation strategies",
        allowed: Capabilities::Only(READ_ONLY),
        prompt: "You are a planning agent. Analyze the codebase and output a numbered implementation plan. Do NOT make changes.",
    },
];

impl AgentRole {
    pub fn parse(name: &str) -> Result<Self, ToolError> {
        ROLES
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.role)
            .ok_or_else(|| ToolError::UnknownRole(name.to_string()))
    }

    pub fn config(self) -> &'static RoleConfig {
        match self {
            AgentRole::Explore => &ROLES[0],
            AgentRole::Code => &ROLES[1],
            AgentRole::Plan => &ROLES[2],
        }
    }

    pub fn name(self) -> &'static str {
        self.config().name
    }
}

/// 一次编排循环的身份：主智能体或某个角色的子智能体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentScope {
    Main,
    Subagent(AgentRole),
}

impl AgentScope {
    /// 该身份可见的能力集合（顺序与 ToolKind::ALL 一致）
    pub fn capabilities(self) -> Vec<ToolKind> {
        match self {
            AgentScope::Main => ToolKind::ALL.to_vec(),
            AgentScope::Subagent(role) => match role.config().allowed {
                Capabilities::All => ToolKind::BASE.to_vec(),
                Capabilities::Only(kinds) => ToolKind::BASE
                    .into_iter()
                    .filter(|k| kinds.contains(k))
                    .collect(),
            },
        }
    }

    pub fn allows(self, kind: ToolKind) -> bool {
        self.capabilities().contains(&kind)
    }
}

/// `- name: description` 列表，用于系统提示与 delegate-task 描述
pub fn role_descriptions() -> String {
    ROLES
        .iter()
        .map(|r| format!("- {}: {}", r.name, r.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_roles() {
        for role in [AgentRole::Explore, AgentRole::Plan] {
            let caps = AgentScope::Subagent(role).capabilities();
            assert_eq!(caps, vec![ToolKind::ExecuteCommand, ToolKind::ReadFile]);
            assert!(!AgentScope::Subagent(role).allows(ToolKind::WriteFile));
            assert!(!AgentScope::Subagent(role).allows(ToolKind::EditFile));
        }
    }

    #[test]
    fn test_no_role_can_delegate() {
        for config in ROLES {
            let scope = AgentScope::Subagent(config.role);
            assert!(!scope.allows(ToolKind::DelegateTask));
            assert!(!scope.allows(ToolKind::LoadSkill));
        }
        assert!(AgentScope::Main.allows(ToolKind::DelegateTask));
    }

    #[test]
    fn test_code_role_gets_all_base() {
        assert_eq!(
            AgentScope::Subagent(AgentRole::Code).capabilities(),
            ToolKind::BASE.to_vec()
        );
    }

    #[test]
    fn test_parse_unknown_role() {
        assert_eq!(AgentRole::parse("plan").unwrap(), AgentRole::Plan);
        assert!(matches!(
            AgentRole::parse("admin"),
            Err(ToolError::UnknownRole(r)) if r == "admin"
        ));
    }

    #[test]
    fn test_config_matches_role() {
        for role in [AgentRole::Explore, AgentRole::Code, AgentRole::Plan] {
            assert_eq!(role.config().role, role);
            assert_eq!(AgentRole::parse(role.name()).unwrap(), role);
        }
    }

    #[test]
    fn test_role_descriptions_order() {
        let text = role_descriptions();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("- explore:"));
        assert!(lines[2].starts_with("- plan:"));
    }
}
