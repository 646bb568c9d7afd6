//! 熔断器
//!
//! 连续失败达到阈值后进入 Open，在恢复窗口内快速失败（不发网络请求）；
//! 窗口过后转 HalfOpen 放行一次探测，成功则 Closed，失败则重新 Open。

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    /// 正常放行，累计连续失败数
    Closed { failures: u32 },
    /// 快速失败中
    Open { since: Instant },
    /// 放行一次探测
    HalfOpen,
}

/// 熔断器：默认 5 次连续失败触发，60 秒恢复窗口
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: Mutex<BreakerState>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
        }
    }

    /// 请求放行判定：Open 且窗口未过返回 false；窗口已过转 HalfOpen 放行探测
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            BreakerState::Closed { .. } | BreakerState::HalfOpen => true,
            BreakerState::Open { since } => {
                if since.elapsed() >= self.recovery_timeout {
                    *state = BreakerState::HalfOpen;
                    tracing::info!("circuit breaker half-open, probing");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// 记录一次成功：任何状态都归位 Closed 并清零失败计数
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        *state = BreakerState::Closed { failures: 0 };
    }

    /// 记录一次失败：Closed 下累计，达到阈值或 HalfOpen 探测失败则 Open
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        match *state {
            BreakerState::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.failure_threshold {
                    tracing::warn!(failures, "circuit breaker opened");
                    *state = BreakerState::Open {
                        since: Instant::now(),
                    };
                } else {
                    *state = BreakerState::Closed { failures };
                }
            }
            BreakerState::HalfOpen => {
                tracing::warn!("probe failed, circuit breaker re-opened");
                *state = BreakerState::Open {
                    since: Instant::now(),
                };
            }
            BreakerState::Open { .. } => {}
        }
    }

    /// 当前是否处于 Open（不含放行判定的状态迁移）
    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock().unwrap(), BreakerState::Open { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert!(breaker.allow());
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.allow());
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(!breaker.allow());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        assert!(breaker.allow());
    }

    #[test]
    fn test_half_open_probe_then_close() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(0));
        breaker.record_failure();
        assert!(breaker.is_open());
        // 恢复窗口为 0：下一次 allow 即转 HalfOpen 放行
        assert!(breaker.allow());
        breaker.record_success();
        assert!(!breaker.is_open());
        assert!(breaker.allow());
    }

    #[test]
    fn test_half_open_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(0));
        breaker.record_failure();
        assert!(breaker.allow()); // HalfOpen 探测
        breaker.record_failure();
        assert!(breaker.is_open());
    }
}
