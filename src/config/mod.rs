use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::llm::DEFAULT_POLL_INTERVAL;
use crate::market::yahoo::DEFAULT_BASE_URL as DEFAULT_MARKET_URL;
use crate::prompts::{DEFAULT_ASSISTANT_NAME, DEFAULT_RUN_INSTRUCTIONS};
use crate::tools::ToolSet;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-1106";
pub const PROJECT_CONFIG_DIR: &str = ".stock-assistant";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub assistant_id: Option<String>,
    pub assistant_name: String,
    pub instructions: String,
    pub poll_interval: Duration,
    pub tools: ToolSet,
    pub llm: LlmConfig,
    pub market: MarketConfig,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            assistant_id: None,
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            instructions: DEFAULT_RUN_INSTRUCTIONS.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            tools: ToolSet::default(),
            llm: LlmConfig::default(),
            market: MarketConfig::default(),
            log_level: "warn".to_string(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LlmConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Upper bound for one tool call, provider round trip included.
    pub tool_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 60_000,
            tool_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MarketConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MARKET_URL.to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// One configuration layer. Config files, environment variables and CLI
/// flags are all read into this shape and then stacked.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub assistant_id: Option<String>,
    pub assistant_name: Option<String>,
    pub instructions: Option<String>,
    /// humantime string such as `3s` or `500ms`
    pub poll_interval: Option<String>,
    pub tools: Option<ToolSet>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub llm: Option<PartialLlmConfig>,
    pub market: Option<PartialMarketConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialLlmConfig {
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub tool_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialMarketConfig {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl PartialLlmConfig {
    fn or(self, lower: Self) -> Self {
        Self {
            connect_timeout_ms: self.connect_timeout_ms.or(lower.connect_timeout_ms),
            request_timeout_ms: self.request_timeout_ms.or(lower.request_timeout_ms),
            tool_timeout_ms: self.tool_timeout_ms.or(lower.tool_timeout_ms),
        }
    }
}

impl PartialMarketConfig {
    fn or(self, lower: Self) -> Self {
        Self {
            base_url: self.base_url.or(lower.base_url),
            timeout_ms: self.timeout_ms.or(lower.timeout_ms),
        }
    }
}

fn or_nested<T>(upper: Option<T>, lower: Option<T>, merge: fn(T, T) -> T) -> Option<T> {
    match (upper, lower) {
        (Some(u), Some(l)) => Some(merge(u, l)),
        (u, l) => u.or(l),
    }
}

impl FileConfig {
    /// Values from `self` win; gaps are filled from `lower`.
    pub fn or(self, lower: FileConfig) -> FileConfig {
        FileConfig {
            base_url: self.base_url.or(lower.base_url),
            model: self.model.or(lower.model),
            api_key: self.api_key.or(lower.api_key),
            assistant_id: self.assistant_id.or(lower.assistant_id),
            assistant_name: self.assistant_name.or(lower.assistant_name),
            instructions: self.instructions.or(lower.instructions),
            poll_interval: self.poll_interval.or(lower.poll_interval),
            tools: self.tools.or(lower.tools),
            log_level: self.log_level.or(lower.log_level),
            log_file: self.log_file.or(lower.log_file),
            llm: or_nested(self.llm, lower.llm, PartialLlmConfig::or),
            market: or_nested(self.market, lower.market, PartialMarketConfig::or),
        }
    }

    /// Layer built from environment variables, looked up through `var`.
    pub fn from_env_with(var: impl Fn(&str) -> Option<String>) -> FileConfig {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        FileConfig {
            base_url: non_empty("OPENAI_BASE_URL"),
            model: non_empty("OPENAI_MODEL"),
            api_key: non_empty("OPENAI_API_KEY"),
            assistant_id: non_empty("ASSISTANT_ID"),
            poll_interval: non_empty("STOCK_ASSISTANT_POLL_INTERVAL"),
            log_level: non_empty("STOCK_ASSISTANT_LOG"),
            ..FileConfig::default()
        }
    }

    pub fn from_env() -> FileConfig {
        Self::from_env_with(|k| std::env::var(k).ok())
    }
}

impl AppConfig {
    pub fn from_cli(cli: &crate::Cli) -> Result<Self> {
        let project_root = std::env::current_dir().context("resolve current dir")?;

        let project_cfg = layer_or_default(load_project_config(&project_root), "project");
        let file_cfg = layer_or_default(load_file_config(), "global");

        let layered = cli
            .config_layer()
            .or(FileConfig::from_env())
            .or(project_cfg)
            .or(file_cfg);
        Self::from_layers(layered)
    }

    /// Resolve a fully stacked layer against the built-in defaults.
    pub fn from_layers(cfg: FileConfig) -> Result<Self> {
        let defaults = AppConfig::default();

        let poll_interval = match cfg.poll_interval.as_deref() {
            Some(s) => humantime::parse_duration(s.trim())
                .with_context(|| format!("invalid poll interval: {s}"))?,
            None => defaults.poll_interval,
        };

        let llm_defaults = LlmConfig::default();
        let llm = match cfg.llm {
            Some(p) => LlmConfig {
                connect_timeout_ms: p
                    .connect_timeout_ms
                    .unwrap_or(llm_defaults.connect_timeout_ms),
                request_timeout_ms: p
                    .request_timeout_ms
                    .unwrap_or(llm_defaults.request_timeout_ms),
                tool_timeout_ms: p.tool_timeout_ms.unwrap_or(llm_defaults.tool_timeout_ms),
            },
            None => llm_defaults,
        };

        let market_defaults = MarketConfig::default();
        let market = match cfg.market {
            Some(p) => MarketConfig {
                base_url: p.base_url.unwrap_or(market_defaults.base_url),
                timeout_ms: p.timeout_ms.unwrap_or(market_defaults.timeout_ms),
            },
            None => market_defaults,
        };

        Ok(Self {
            base_url: cfg.base_url.unwrap_or(defaults.base_url),
            model: cfg.model.unwrap_or(defaults.model),
            api_key: cfg.api_key,
            assistant_id: cfg.assistant_id,
            assistant_name: cfg.assistant_name.unwrap_or(defaults.assistant_name),
            instructions: cfg.instructions.unwrap_or(defaults.instructions),
            poll_interval,
            tools: cfg.tools.unwrap_or(defaults.tools),
            llm,
            market,
            log_level: cfg.log_level.unwrap_or(defaults.log_level),
            log_file: cfg.log_file,
        })
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.llm.tool_timeout_ms)
    }

    pub fn market_timeout(&self) -> Duration {
        Duration::from_millis(self.market.timeout_ms)
    }
}

fn candidate_paths(var: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut v = Vec::new();
    if let Some(p) = var("STOCK_ASSISTANT_CONFIG") {
        v.push(PathBuf::from(p));
    }
    if let Some(xdg_home) = var("XDG_CONFIG_HOME") {
        v.push(Path::new(&xdg_home).join("stock-assistant/config.toml"));
    } else if let Some(home) = var("HOME") {
        v.push(Path::new(&home).join(".config/stock-assistant/config.toml"));
    }
    v
}

fn read_config(path: &Path) -> Result<Option<FileConfig>> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    match toml::from_str::<FileConfig>(&s) {
        Ok(cfg) => {
            info!(path=%path.display(), "loaded config file");
            Ok(Some(cfg))
        }
        Err(e) => {
            warn!(path=%path.display(), error=%e.to_string(), "parse config failed");
            Ok(None)
        }
    }
}

/// An unreadable config file is skipped with a warning, like an unparsable one.
pub(crate) fn layer_or_default(loaded: Result<FileConfig>, scope: &str) -> FileConfig {
    loaded.unwrap_or_else(|e| {
        warn!(scope, error=%format!("{e:#}"), "config file ignored");
        FileConfig::default()
    })
}

/// Global configuration: the first readable candidate wins.
pub fn load_file_config() -> Result<FileConfig> {
    load_file_config_with(|k| std::env::var(k).ok())
}

pub fn load_file_config_with(var: impl Fn(&str) -> Option<String>) -> Result<FileConfig> {
    for p in candidate_paths(var) {
        if !p.exists() {
            continue;
        }
        if let Some(cfg) = read_config(&p)? {
            return Ok(cfg);
        }
    }
    Ok(FileConfig::default())
}

/// Load project-specific configuration from .stock-assistant/config.toml
pub fn load_project_config(project_root: &Path) -> Result<FileConfig> {
    let path = project_root.join(PROJECT_CONFIG_DIR).join("config.toml");
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    Ok(read_config(&path)?.unwrap_or_default())
}
