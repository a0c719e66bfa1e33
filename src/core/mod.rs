//! 核心层：错误类型与会话中断监管

pub mod error;
pub mod session_supervisor;

pub use error::{AgentError, ToolError};
pub use session_supervisor::SessionSupervisor;
