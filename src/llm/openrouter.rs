//! OpenRouter API 客户端（OpenAI 兼容格式）
//!
//! OpenRouter 提供与 OpenAI 完全兼容的 API 接口，聚合多家模型并带免费档。
//! - Base URL: https://openrouter.ai/api/v1
//! - 免费模型示例: google/gemma-3-27b-it:free, openai/gpt-oss-20b:free

use std::time::Duration;

use crate::llm::OpenAiClient;

/// OpenRouter API 常量
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENROUTER_CODE_MODEL: &str = "google/gemma-3-27b-it:free";
pub const OPENROUTER_GENERAL_MODEL: &str = "openai/gpt-oss-20b:free";
pub const OPENROUTER_FAST_MODEL: &str = "tngtech/deepseek-r1t2-chimera:free";

/// 创建 OpenRouter 客户端
///
/// - 优先使用环境变量 `OPENROUTER_API_KEY`，回退 `OPENAI_API_KEY`
/// - base_url 可通过参数覆盖（自建代理等场景）
pub fn create_openrouter_client(base_url: Option<&str>, timeout: Duration) -> OpenAiClient {
    let api_key = std::env::var("OPENROUTER_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    OpenAiClient::with_timeout(
        Some(base_url.unwrap_or(OPENROUTER_BASE_URL)),
        Some(api_key.as_str()),
        timeout,
    )
}
