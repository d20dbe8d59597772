//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，
//! 如 `HIVE__ORCHESTRATION__TIMEOUT_SECONDS=60`）。API Key 与 Graph Token
//! 不进配置文件，始终从环境变量读取（OPENAI_API_KEY / GRAPH_ACCESS_TOKEN）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub graph: GraphSection,
    #[serde(default)]
    pub orchestration: OrchestrationSection,
    #[serde(default)]
    pub state: StateSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmSection::default(),
            graph: GraphSection::default(),
            orchestration: OrchestrationSection::default(),
            state: StateSection::default(),
        }
    }
}

/// [llm] 段：完成服务后端选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai（任意 OpenAI 兼容端点）/ mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [graph] 段：M365 Copilot Chat API 端点
#[derive(Debug, Clone, Deserialize)]
pub struct GraphSection {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    /// Chat 请求 locationHint 使用的时区
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            time_zone: default_time_zone(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/beta".to_string()
}

fn default_time_zone() -> String {
    "America/Los_Angeles".to_string()
}

/// [orchestration] 段：单轮意图数上限、整体超时、并行开关
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationSection {
    /// 单轮最多执行的意图数，超出部分按位置截断
    #[serde(default = "default_max_agent_calls")]
    pub max_agent_calls: usize,
    /// 分类 + 执行 + 合成的整体墙钟预算（秒）
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// true 为并行执行各意图，false 为按序串行
    #[serde(default = "default_enable_parallel_execution")]
    pub enable_parallel_execution: bool,
}

impl Default for OrchestrationSection {
    fn default() -> Self {
        Self {
            max_agent_calls: default_max_agent_calls(),
            timeout_seconds: default_timeout_seconds(),
            enable_parallel_execution: default_enable_parallel_execution(),
        }
    }
}

fn default_max_agent_calls() -> usize {
    5
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_enable_parallel_execution() -> bool {
    true
}

/// [state] 段：会话状态过期时间
#[derive(Debug, Clone, Deserialize)]
pub struct StateSection {
    /// 会话空闲超过该秒数后可被清理
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout_secs(),
        }
    }
}

fn default_session_timeout_secs() -> u64 {
    3600
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
