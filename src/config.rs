//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__REACT__MAX_ITERATIONS=8`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::memory::CompressionConfig;
use crate::react::ReactConfig;
use crate::router::RouterConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub router: RouterSection,
    pub react: ReactSection,
    pub compression: CompressionSection,
    pub tools: ToolsSection,
    pub session: SessionSection,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 单次补全调用超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// [router] 段：读取的历史窗口与最低置信度
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    /// 路由时只看最近 N 条消息
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// 低于该置信度的分类降级为 fallback
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

fn default_history_window() -> usize {
    6
}

fn default_min_confidence() -> f32 {
    0.3
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            min_confidence: default_min_confidence(),
        }
    }
}

/// [react] 段：推理循环上限与 observation 截断
#[derive(Debug, Clone, Deserialize)]
pub struct ReactSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_observation_max_chars")]
    pub observation_max_chars: usize,
}

fn default_max_iterations() -> usize {
    5
}

fn default_observation_max_chars() -> usize {
    1500
}

impl Default for ReactSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            observation_max_chars: default_observation_max_chars(),
        }
    }
}

/// [compression] 段：token 预算、保留条数、摘要时单条截断
#[derive(Debug, Clone, Deserialize)]
pub struct CompressionSection {
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
    #[serde(default = "default_message_max_chars")]
    pub message_max_chars: usize,
}

fn default_token_budget() -> usize {
    6000
}

fn default_keep_recent() -> usize {
    4
}

fn default_message_max_chars() -> usize {
    500
}

impl Default for CompressionSection {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            keep_recent: default_keep_recent(),
            message_max_chars: default_message_max_chars(),
        }
    }
}

/// [tools] 段：单次工具调用超时、知识库文件
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 知识库 JSON 文件（KnowledgeDoc 数组）；未配置则不注册 search_knowledge_base
    pub knowledge_file: Option<PathBuf>,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            knowledge_file: None,
        }
    }
}

/// [session] 段：会话存储后端（memory / json）与 JSON 目录
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_store")]
    pub store: String,
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,
}

fn default_store() -> String {
    "memory".to_string()
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("sessions")
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            store: default_store(),
            dir: default_session_dir(),
        }
    }
}

impl AppConfig {
    pub fn react_config(&self) -> ReactConfig {
        ReactConfig {
            max_iterations: self.react.max_iterations,
            observation_max_chars: self.react.observation_max_chars,
            request_timeout_secs: self.llm.request_timeout_secs,
        }
    }

    pub fn compression_config(&self) -> CompressionConfig {
        CompressionConfig {
            token_budget: self.compression.token_budget,
            keep_recent: self.compression.keep_recent,
            message_max_chars: self.compression.message_max_chars,
            request_timeout_secs: self.llm.request_timeout_secs,
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            history_window: self.router.history_window,
            min_confidence: self.router.min_confidence,
            request_timeout_secs: self.llm.request_timeout_secs,
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
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

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.react.max_iterations, 5);
        assert_eq!(cfg.compression.token_budget, 6000);
        assert_eq!(cfg.compression.keep_recent, 4);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert!((cfg.router.min_confidence - 0.3).abs() < f32::EPSILON);
        assert!(cfg.tools.knowledge_file.is_none());
        assert_eq!(cfg.session.store, "memory");
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hive.toml");
        std::fs::write(
            &path,
            "[react]\nmax_iterations = 8\n\n[compression]\nkeep_recent = 6\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.react.max_iterations, 8);
        assert_eq!(cfg.compression.keep_recent, 6);
        assert_eq!(cfg.compression.token_budget, 6000);
    }

    #[test]
    fn test_component_configs_share_request_timeout() {
        let mut cfg = AppConfig::default();
        cfg.llm.request_timeout_secs = 9;
        assert_eq!(cfg.react_config().request_timeout_secs, 9);
        assert_eq!(cfg.compression_config().request_timeout_secs, 9);
        assert_eq!(cfg.router_config().request_timeout_secs, 9);
    }
}
