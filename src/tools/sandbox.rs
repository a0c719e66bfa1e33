//! 工作区沙箱
//!
//! Sandbox 绑定 root，所有路径经 resolve 校验：先做词法归一化（消解 `.` / `..`），
//! 再对已存在的最深祖先做 canonicalize，挡住 `../` 穿越、绝对路径覆盖与符号链接逃逸。
//! check_command 用子串黑名单拦截破坏性命令：区分大小写、不理解 shell 语义，只是一道粗过滤。

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::core::ToolError;

/// 破坏性命令子串（POSIX 与 Windows 两套写法）
pub const BLOCKED_PATTERNS: &[&str] = &[
    // 递归强制删除
    "rm -rf /",
    "rm -rf ~",
    "rm -rf *",
    "rm -fr /",
    "rm -fr ~",
    "del /f /s /q ",
    "rd /s /q ",
    "Remove-Item -Recurse -Force",
    // 提权
    "sudo ",
    "su root",
    "doas ",
    "runas /user:Administrator",
    "Start-Process -Verb RunAs",
    // 关机 / 重启
    "shutdown",
    "reboot",
    "poweroff",
    "halt -",
    "init 0",
    "init 6",
    "Stop-Computer",
    "Restart-Computer",
    // 重定向写入系统路径
    "> /dev/sd",
    "> /dev/nvme",
    "> /dev/mem",
    "> /etc/",
    "> /boot/",
    "> /sys/",
    "> C:\\Windows\\",
    "> %SystemRoot%\\",
    // 格式化磁盘
    "mkfs",
    "format ",
    "dd if=",
    ":(){ :|:& };:", // fork bomb
];

/// 命令检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCheck {
    Allowed,
    /// 命中的黑名单子串
    Blocked(&'static str),
}

/// 工作区沙箱：固定根目录 + 命令黑名单
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 相对路径 -> 工作区内的绝对路径；结果不在 root 之下则返回 PathEscape
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let escape = || ToolError::PathEscape(path.to_string());

        let normalized = normalize(&self.root.join(path));
        if !normalized.starts_with(&self.root) {
            tracing::warn!(path = %path, "path escape rejected");
            return Err(escape());
        }

        // 目标可能尚不存在（write-file 新建），向上找到已存在的祖先再 canonicalize
        let mut existing = normalized.as_path();
        let mut missing: Vec<OsString> = Vec::new();
        while std::fs::symlink_metadata(existing).is_err() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Err(escape()),
            }
        }
        // 悬空符号链接 canonicalize 会失败，一并按逃逸处理
        let real = existing.canonicalize().map_err(|_| escape())?;
        if !real.starts_with(&self.root) {
            tracing::warn!(path = %path, real = %real.display(), "symlink escape rejected");
            return Err(escape());
        }

        let mut resolved = real;
        for name in missing.into_iter().rev() {
            resolved.push(name);
        }
        Ok(resolved)
    }

    /// 子串黑名单检查
    pub fn check_command(&self, command: &str) -> CommandCheck {
        check_command(command)
    }
}

pub fn check_command(command: &str) -> CommandCheck {
    BLOCKED_PATTERNS
        .iter()
        .find(|pattern| command.contains(*pattern))
        .map(|pattern| CommandCheck::Blocked(pattern))
        .unwrap_or(CommandCheck::Allowed)
}

/// 纯词法归一化，不访问文件系统
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}
