//! 指数退避重试
//!
//! 失败后按 initial * base^attempt 等待（封顶 max_wait，叠加 0~10% 随机抖动）；
//! 限流类错误（rate limit / 429 / quota 等子串）额外保底等待 rate_limit_floor。
//! 重试耗尽后把最后一个错误原样抛给调用方。

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::llm::LlmError;

/// 错误分类：重试策略据此决定是否套用限流保底等待
pub trait RetryClass {
    fn is_rate_limited(&self) -> bool;
}

/// 按消息子串判断是否限流类错误
pub fn is_rate_limit_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    [
        "rate limit",
        "rate_limit",
        "429",
        "quota exceeded",
        "too many requests",
        "throttle",
    ]
    .iter()
    .any(|k| lower.contains(k))
}

impl RetryClass for LlmError {
    fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::RateLimited(_) => true,
            LlmError::Api(msg) => is_rate_limit_message(msg),
            _ => false,
        }
    }
}

/// 重试策略：最多 max_retries 次重试（共 max_retries + 1 次尝试）
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_wait: Duration,
    pub max_wait: Duration,
    pub exponential_base: f64,
    /// 限流类错误的最小等待时长
    pub rate_limit_floor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
            exponential_base: 2.0,
            rate_limit_floor: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败（0 起）后的基础等待时长，不含抖动与限流保底
    pub fn backoff(&self, attempt: u32) -> Duration {
        let wait =
            self.initial_wait.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        Duration::from_secs_f64(wait.min(self.max_wait.as_secs_f64()))
    }

    fn wait_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let base = self.backoff(attempt);
        let jitter = rand::thread_rng().gen_range(0.0..=base.as_secs_f64() * 0.1);
        let mut wait = base + Duration::from_secs_f64(jitter);
        if rate_limited && wait < self.rate_limit_floor {
            wait = self.rate_limit_floor;
        }
        wait
    }

    /// 执行带重试的异步操作；每次失败记录 warn 并退避等待
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: RetryClass + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(err);
                    }
                    let wait = self.wait_for(attempt, err.is_rate_limited());
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        wait_secs = wait.as_secs_f64(),
                        error = %err,
                        "remote call failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_wait: Duration::from_millis(1),
            max_wait: Duration::from_millis(5),
            exponential_base: 2.0,
            rate_limit_floor: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_capped_at_max_wait() {
        let policy = RetryPolicy::default();
        for attempt in 0..10 {
            assert!(policy.backoff(attempt) <= policy.max_wait);
        }
        // 前几步确实指数增长
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_rate_limit_message_detection() {
        assert!(is_rate_limit_message("HTTP 429 Too Many Requests"));
        assert!(is_rate_limit_message("monthly quota exceeded"));
        assert!(!is_rate_limit_message("connection reset by peer"));
    }

    #[tokio::test]
    async fn test_exhausts_exactly_max_retries_plus_one_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = fast_policy(3);
        let result: Result<(), LlmError> = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::Api("boom".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = fast_policy(3);
        let result: Result<u32, LlmError> = policy
            .run(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(LlmError::Timeout)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
