//! 工具层：能力注册表、角色表、沙箱、各能力处理函数与执行器

pub mod executor;
pub mod filesystem;
pub mod output;
pub mod registry;
pub mod roles;
pub mod sandbox;
pub mod shell;
pub mod todo;

pub use executor::{skill_loaded, DelegateFuture, TaskDelegate, ToolContext, ToolExecutor};
pub use filesystem::FileTools;
pub use output::{truncate_marked, OutputLimits};
pub use registry::{ToolCall, ToolDefinition, ToolKind, ToolRegistry};
pub use roles::{role_descriptions, AgentRole, AgentScope, ROLES};
pub use sandbox::{CommandCheck, Sandbox};
pub use shell::{ShellTool, DEFAULT_SHELL_TIMEOUT_SECS};
pub use todo::{TodoItem, TodoList, TodoStatus, MAX_TODOS};
