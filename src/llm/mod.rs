//! LLM 层：客户端抽象与实现（Anthropic 兼容 HTTP / Mock）

pub mod anthropic;
pub mod mock;
pub mod traits;

pub use anthropic::{AnthropicClient, TokenUsage};
pub use mock::{MockLlmClient, RecordedCall};
pub use traits::{LlmClient, LlmError, LlmResponse, StopReason};
