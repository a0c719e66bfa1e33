//! 会话监管：单轮中断管理
//!
//! 每一轮用户输入开始时 `begin_turn` 换发一个新的 CancellationToken；
//! Ctrl+C 触发 `cancel` 只取消当前这一轮，会话本身（历史、Todo）保持不变。

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// 会话级中断管理：持有当前轮次的取消令牌
#[derive(Debug)]
pub struct SessionSupervisor {
    current: Mutex<CancellationToken>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(CancellationToken::new()),
        }
    }

    /// 开始新一轮：替换为全新的令牌并返回（上一轮若被取消不会影响新一轮）
    pub fn begin_turn(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            *current = token.clone();
        }
        token
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.current
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// 取消当前轮（用户 Ctrl+C）
    pub fn cancel(&self) {
        if let Ok(current) = self.current.lock() {
            current.cancel();
        }
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
