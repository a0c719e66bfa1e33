//! 记忆层：会话历史（消息只追加，不跨进程持久化）

pub mod conversation;

pub use conversation::{Block, Conversation, Message, Role};
