//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 OpenRouter、OpenAI、自建代理等。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{ChatRequest, LlmClient, LlmError, Role};

/// 未显式配置时的单次请求超时
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// 将 OpenAIError 归类为 LlmError
fn classify_error(err: OpenAIError) -> LlmError {
    classify_message(err.to_string())
}

/// 按消息子串识别超时 / 认证 / 限流，其余归 Api
fn classify_message(msg: String) -> LlmError {
    let lower = msg.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        return LlmError::Timeout;
    }
    if lower.contains("401") || lower.contains("unauthorized") || lower.contains("invalid api key")
    {
        return LlmError::Auth(msg);
    }
    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("quota")
        || lower.contains("too many requests")
    {
        return LlmError::RateLimited(msg);
    }
    LlmError::Api(msg)
}

/// OpenAI 兼容客户端：持有 Client，chat 时转 Message 为 API 格式并取首条 content
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>) -> Self {
        Self::with_timeout(base_url, api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    /// 指定单次请求超时：挂起的端点在超时后以 LlmError::Timeout 返回
    pub fn with_timeout(base_url: Option<&str>, api_key: Option<&str>, timeout: Duration) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client: Client::with_config(config).with_http_client(http),
            usage: TokenUsage::new(),
        }
    }

    fn to_openai_messages(&self, request: &ChatRequest) -> Vec<ChatCompletionRequestMessage> {
        request
            .messages
            .iter()
            .map(|m| match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let api_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(self.to_openai_messages(request))
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(classify_error)?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(classify_error)?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                LlmError::MalformedResponse("response contains no choices/content".to_string())
            })?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[tokio::test]
    async fn test_hung_endpoint_times_out_client_side() {
        // 只接受连接、从不回包的端点
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            }
        });

        let base = format!("http://{addr}/v1");
        let client = OpenAiClient::with_timeout(
            Some(&base),
            Some("sk-test"),
            Duration::from_millis(200),
        );
        let request = ChatRequest::new(vec![Message::user("hi")], "test-model");

        let start = std::time::Instant::now();
        let err = client.chat(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout), "unexpected error: {err:?}");
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_token_usage_accumulates() {
        let usage = TokenUsage::new();
        usage.add(100, 30);
        usage.add(50, 20);
        assert_eq!(usage.get(), (150, 50, 200));
    }

    #[test]
    fn test_classify_timeout() {
        let err = classify_message("request timed out".to_string());
        assert!(matches!(err, LlmError::Timeout));
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_message("429 Too Many Requests".to_string());
        assert!(matches!(err, LlmError::RateLimited(_)));
    }

    #[test]
    fn test_classify_auth() {
        let err = classify_message("Incorrect API key provided: invalid api key".to_string());
        assert!(matches!(err, LlmError::Auth(_)));
    }
}
