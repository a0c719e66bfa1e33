//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：内置默认值 -> TOML 文件 -> 可选的显式文件（`ZC_CONFIG`）-> 环境变量 `ZC__*`
//! （双下划线表示嵌套，如 `ZC__TOOLS__SHELL_TIMEOUT_SECS=120`）。
//! 另外兼容常见的端点变量：`ANTHROPIC_BASE_URL`、`MODEL_NAME` 覆盖对应键；`ANTHROPIC_API_KEY` 只从环境读取。

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::llm::{AnthropicClient, LlmClient, MockLlmClient};
use crate::tools::{OutputLimits, DEFAULT_SHELL_TIMEOUT_SECS};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const CONFIG_PATH_ENV: &str = "ZC_CONFIG";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
}

/// [app] 段：工作区与技能目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    /// 沙箱根目录，未设置时用当前目录
    pub workspace_root: Option<PathBuf>,
    /// 技能目录，未设置时用 <workspace>/skills
    pub skills_dir: Option<PathBuf>,
}

/// [llm] 段
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    crate::llm::anthropic::DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    crate::llm::anthropic::DEFAULT_MAX_TOKENS
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// [tools] 段：shell 超时与输出上限
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout_secs(),
            max_output_chars: default_max_output_chars(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl ToolsSection {
    pub fn output_limits(&self) -> OutputLimits {
        OutputLimits {
            max_output_chars: self.max_output_chars,
            preview_chars: self.preview_chars,
        }
    }
}

fn default_shell_timeout_secs() -> u64 {
    DEFAULT_SHELL_TIMEOUT_SECS
}

fn default_max_output_chars() -> usize {
    OutputLimits::default().max_output_chars
}

fn default_preview_chars() -> usize {
    OutputLimits::default().preview_chars
}

impl AppConfig {
    /// 工作区根目录：配置 > 当前目录
    pub fn workspace(&self) -> std::io::Result<PathBuf> {
        match &self.app.workspace_root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir(),
        }
    }

    pub fn skills_dir(&self, workspace: &std::path::Path) -> PathBuf {
        self.app
            .skills_dir
            .clone()
            .unwrap_or_else(|| workspace.join("skills"))
    }
}

/// 从 config 目录加载配置，环境变量可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path（或设置了 ZC_CONFIG）且文件存在，则追加该文件
/// 3. 叠加环境变量 ZC__*，最后应用 ANTHROPIC_BASE_URL / MODEL_NAME
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    let explicit = config_path.or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
    if let Some(path) = explicit {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignored");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ZC")
            .separator("__")
            .try_parsing(true),
    );

    builder = builder
        .set_override_option("llm.base_url", non_empty_env("ANTHROPIC_BASE_URL"))?
        .set_override_option("llm.model", non_empty_env("MODEL_NAME"))?;

    let c = builder.build()?;
    c.try_deserialize()
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// 根据配置与 ANTHROPIC_API_KEY 创建 LLM 客户端；没有 Key 时退回 Mock（回显输入）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let Some(api_key) = non_empty_env(API_KEY_ENV) else {
        tracing::warn!("{} not set, using Mock LLM", API_KEY_ENV);
        return Arc::new(MockLlmClient::new());
    };

    match AnthropicClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        &api_key,
        cfg.llm.max_tokens,
        cfg.llm.request_timeout_secs,
    ) {
        Ok(client) => {
            tracing::info!("Using Anthropic LLM ({})", cfg.llm.model);
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!("LLM client init failed ({}), using Mock LLM", e);
            Arc::new(MockLlmClient::new())
        }
    }
}
