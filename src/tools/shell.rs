//! Shell 执行：黑名单过滤 + 墙钟超时 + 输出截断
//!
//! 通过 sh -c / cmd /C 在工作区根目录执行，stdout 与 stderr 合并返回。
//! unix 上子进程自成一个进程组；超时、用户取消或 future 被丢弃时整组 SIGKILL，
//! 由 sh 派生的孙进程也不会残留。

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::core::ToolError;
use crate::tools::output::OutputLimits;
use crate::tools::registry::ExecuteCommandArgs;
use crate::tools::sandbox::{CommandCheck, Sandbox};

pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 60;

/// Shell 工具：绑定工作区根目录
#[derive(Debug, Clone)]
pub struct ShellTool {
    sandbox: Sandbox,
    timeout_secs: u64,
    limits: OutputLimits,
}

impl ShellTool {
    pub fn new(sandbox: Sandbox, timeout_secs: u64, limits: OutputLimits) -> Self {
        Self {
            sandbox,
            timeout_secs,
            limits,
        }
    }

    pub async fn execute(
        &self,
        args: ExecuteCommandArgs,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let command = args.command.trim();
        if command.is_empty() {
            return Err(ToolError::Validation("Empty command".to_string()));
        }
        if let CommandCheck::Blocked(pattern) = self.sandbox.check_command(command) {
            tracing::warn!(command = %command, pattern = %pattern, "shell command blocked");
            return Err(ToolError::BlockedCommand(pattern.to_string()));
        }

        tracing::info!(command = %command, "shell tool execute");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(self.sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn()?;
        let mut group = ProcessGroup::of(&child);

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ToolError::Cancelled),
            r = tokio::time::timeout(Duration::from_secs(self.timeout_secs), collect(&mut child)) => {
                match r {
                    Ok(collected) => collected.map_err(ToolError::from),
                    Err(_) => Err(ToolError::Timeout(self.timeout_secs)),
                }
            }
        };

        let (stdout, stderr, status) = match result {
            Ok(collected) => {
                group.disarm();
                collected
            }
            Err(e) => {
                group.kill();
                let _ = child.start_kill();
                let _ = child.wait().await;
                tracing::warn!(command = %command, error = %e, "shell command terminated");
                return Err(e);
            }
        };

        let merged = format!(
            "{}{}",
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr)
        );
        let mut text = merged.trim().to_string();
        if text.is_empty() {
            text = "(no output)".to_string();
        }
        if !status.success() {
            match status.code() {
                Some(code) => text.push_str(&format!("\n[exit status: {}]", code)),
                None => text.push_str("\n[terminated by signal]"),
            }
        }
        Ok(self.limits.clip_output(&text))
    }
}

/// 读完两条管道并等待退出；管道在整组进程都退出（或关闭输出）后才会 EOF
async fn collect(
    child: &mut Child,
) -> std::io::Result<(Vec<u8>, Vec<u8>, std::process::ExitStatus)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (out, err, status) = tokio::join!(read_all(stdout), read_all(stderr), child.wait());
    Ok((out?, err?, status?))
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// 子进程所在的进程组；未 disarm 就被丢弃时整组 SIGKILL
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    #[cfg(unix)]
    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            // 组内进程可能已全部退出，ESRCH 忽略
            let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
            if rc == -1 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::ESRCH) {
                    tracing::warn!(pgid, error = %err, "killpg failed");
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn kill(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
