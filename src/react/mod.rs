//! 编排层：主循环、子智能体派生、系统提示与过程事件

pub mod events;
pub mod loop_;
pub mod prompt;
pub mod subagent;

pub use events::{AgentEvent, EventSender};
pub use loop_::{react_loop, LoopOutcome, ReactSession};
pub use prompt::{main_system_prompt, subagent_system_prompt};
pub use subagent::SubagentSpawner;
