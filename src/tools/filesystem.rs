//! 文件读写与精确替换，所有路径经 Sandbox 解析

use crate::core::ToolError;
use crate::tools::output::OutputLimits;
use crate::tools::registry::{EditFileArgs, ReadFileArgs, WriteFileArgs};
use crate::tools::sandbox::Sandbox;

#[derive(Debug, Clone)]
pub struct FileTools {
    sandbox: Sandbox,
    limits: OutputLimits,
}

impl FileTools {
    pub fn new(sandbox: Sandbox, limits: OutputLimits) -> Self {
        Self { sandbox, limits }
    }

    /// limit 给定时只返回前 N 行，并注明剩余行数
    pub async fn read(&self, args: ReadFileArgs) -> Result<String, ToolError> {
        let path = self.sandbox.resolve(&args.path)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound(format!("File not found: {}", args.path)));
            }
            Err(e) => return Err(e.into()),
        };

        let text = match args.limit {
            Some(limit) => {
                let lines: Vec<&str> = text.lines().collect();
                if limit < lines.len() {
                    let mut head = lines[..limit].join("\n");
                    head.push_str(&format!("\n... ({} more lines)", lines.len() - limit));
                    head
                } else {
                    text
                }
            }
            None => text,
        };
        Ok(self.limits.clip_output(&text))
    }

    /// 整体覆盖写入，父目录按需创建
    pub async fn write(&self, args: WriteFileArgs) -> Result<String, ToolError> {
        let path = self.sandbox.resolve(&args.path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, args.content.as_bytes()).await?;
        tracing::debug!(path = %path.display(), bytes = args.content.len(), "file written");
        Ok(format!("Wrote {} bytes to {}", args.content.len(), args.path))
    }

    /// 只替换第一处精确匹配；找不到时文件不动
    pub async fn edit(&self, args: EditFileArgs) -> Result<String, ToolError> {
        let path = self.sandbox.resolve(&args.path)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound(format!("File not found: {}", args.path)));
            }
            Err(e) => return Err(e.into()),
        };
        if args.old.is_empty() || !text.contains(&args.old) {
            return Err(ToolError::NotFound(format!("Text not found in {}", args.path)));
        }
        let updated = text.replacen(&args.old, &args.new, 1);
        tokio::fs::write(&path, updated).await?;
        Ok(format!("Edited {}", args.path))
    }
}
