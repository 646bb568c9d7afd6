//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FORGE__*` 覆盖（双下划线表示嵌套，如 `FORGE__LLM__MODEL=...`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub breaker: BreakerSection,
    #[serde(default)]
    pub github: GitHubSection,
}

/// [app] 段：应用名与工作区根目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 智能体读写文件的根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openrouter / openai
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "openrouter".to_string()
}

fn default_model() -> String {
    crate::llm::OPENROUTER_GENERAL_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

/// [cache] 段：响应缓存开关与 TTL
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// 缓存目录，未设置时用 ./.cache/llm
    pub dir: Option<PathBuf>,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
            dir: None,
        }
    }
}

/// [retry] 段：远程调用重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_wait_secs")]
    pub initial_wait_secs: f64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: f64,
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,
    /// 限流类错误的最小等待秒数
    #[serde(default = "default_rate_limit_floor_secs")]
    pub rate_limit_floor_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_wait_secs() -> f64 {
    1.0
}

fn default_max_wait_secs() -> f64 {
    60.0
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_rate_limit_floor_secs() -> u64 {
    15
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_wait_secs: default_initial_wait_secs(),
            max_wait_secs: default_max_wait_secs(),
            exponential_base: default_exponential_base(),
            rate_limit_floor_secs: default_rate_limit_floor_secs(),
        }
    }
}

impl RetrySection {
    pub fn to_policy(&self) -> crate::reliability::RetryPolicy {
        crate::reliability::RetryPolicy {
            max_retries: self.max_retries,
            initial_wait: std::time::Duration::from_secs_f64(self.initial_wait_secs),
            max_wait: std::time::Duration::from_secs_f64(self.max_wait_secs),
            exponential_base: self.exponential_base,
            rate_limit_floor: std::time::Duration::from_secs(self.rate_limit_floor_secs),
        }
    }
}

/// [breaker] 段：熔断阈值与恢复窗口
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerSection {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> u64 {
    60
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

/// [github] 段：开 PR 的目标仓库；token 只从环境变量 GITHUB_TOKEN 读取
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSection {
    /// owner/repo 格式
    pub repo: Option<String>,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
}

fn default_base_branch() -> String {
    "main".to_string()
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            repo: None,
            base_branch: default_base_branch(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            cache: CacheSection::default(),
            retry: RetrySection::default(),
            breaker: BreakerSection::default(),
            github: GitHubSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 FORGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FORGE__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("FORGE")
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
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.retry.initial_wait_secs, 1.0);
        assert_eq!(cfg.retry.max_wait_secs, 60.0);
        assert_eq!(cfg.retry.rate_limit_floor_secs, 15);
        assert_eq!(cfg.breaker.failure_threshold, 5);
        assert_eq!(cfg.breaker.recovery_timeout_secs, 60);
        assert_eq!(cfg.cache.ttl_secs, 3600);
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.github.base_branch, "main");
    }

    #[test]
    fn test_shipped_default_file_loads_and_matches_defaults() {
        // 单元测试的工作目录是 crate 根，能找到 config/default.toml
        let cfg = load_config(None).expect("default config should load");
        let fallback = AppConfig::default();
        assert_eq!(cfg.llm.provider, fallback.llm.provider);
        assert_eq!(cfg.llm.timeouts.request, fallback.llm.timeouts.request);
        assert_eq!(cfg.retry.max_retries, fallback.retry.max_retries);
        assert_eq!(cfg.breaker.failure_threshold, fallback.breaker.failure_threshold);
        assert_eq!(cfg.github.base_branch, fallback.github.base_branch);
    }

    #[test]
    fn test_retry_section_converts_to_policy() {
        let policy = RetrySection::default().to_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_wait, std::time::Duration::from_secs(1));
        assert_eq!(policy.rate_limit_floor, std::time::Duration::from_secs(15));
    }
}
