//! 可靠性层：缓存、重试、熔断，按固定顺序组合在任意 LlmClient 外侧
//!
//! 组合顺序（固定）：缓存查询 ->（miss 时）熔断判定 -> 指数退避重试包裹原始调用 -> 成功回写缓存。
//! 缓存命中完全绕过熔断与重试；禁用缓存不改变可观测行为，只改变延迟与成本。

pub mod breaker;
pub mod cache;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{ChatRequest, LlmClient, LlmError};
use crate::observability::Metrics;

pub use breaker::CircuitBreaker;
pub use cache::{fingerprint, ResponseCache, DEFAULT_TTL_SECS};
pub use retry::{is_rate_limit_message, RetryClass, RetryPolicy};

/// 可靠性包装客户端：实现 LlmClient，对内层客户端叠加缓存 / 熔断 / 重试
pub struct ReliableLlmClient {
    inner: Arc<dyn LlmClient>,
    cache: ResponseCache,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl ReliableLlmClient {
    pub fn new(
        inner: Arc<dyn LlmClient>,
        cache: ResponseCache,
        breaker: CircuitBreaker,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            cache,
            breaker,
            retry,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// 与工作流引擎共享同一份指标计数器
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[async_trait]
impl LlmClient for ReliableLlmClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let key = fingerprint(request);
        if let Some(hit) = self.cache.get(&key) {
            self.metrics.cache_hit();
            tracing::debug!(key = %key, "llm cache hit");
            return Ok(hit);
        }

        if !self.breaker.allow() {
            return Err(LlmError::CircuitOpen);
        }

        self.metrics.llm_request();
        let inner = Arc::clone(&self.inner);
        let result = self.retry.run(|| {
            let inner = Arc::clone(&inner);
            async move { inner.chat(request).await }
        });

        match result.await {
            Ok(text) => {
                self.breaker.record_success();
                self.cache.put(&key, &text);
                Ok(text)
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }
}
