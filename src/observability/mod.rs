//! 可观测性
//!
//! tracing 初始化与进程内指标计数器。指标只做原子累加，
//! 由调用方在运行结束时取快照输出。

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub agents_started: u64,
    pub agents_succeeded: u64,
    pub agents_failed: u64,
    pub llm_requests: u64,
    pub cache_hits: u64,
    pub runs_started: u64,
    pub runs_finished: u64,
}

/// 进程内指标计数器
#[derive(Debug, Default)]
pub struct Metrics {
    agents_started: AtomicU64,
    agents_succeeded: AtomicU64,
    agents_failed: AtomicU64,
    llm_requests: AtomicU64,
    cache_hits: AtomicU64,
    runs_started: AtomicU64,
    runs_finished: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent_started(&self) {
        self.agents_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn agent_succeeded(&self) {
        self.agents_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn agent_failed(&self) {
        self.agents_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn llm_request(&self) {
        self.llm_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_finished(&self) {
        self.runs_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            agents_started: self.agents_started.load(Ordering::Relaxed),
            agents_succeeded: self.agents_succeeded.load(Ordering::Relaxed),
            agents_failed: self.agents_failed.load(Ordering::Relaxed),
            llm_requests: self.llm_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_finished: self.runs_finished.load(Ordering::Relaxed),
        }
    }
}
