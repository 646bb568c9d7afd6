//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 默认回显最后一条 User 消息；也可用 with_responses 预置脚本化响应，按调用顺序弹出。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatRequest, LlmClient, LlmError, Role};

/// Mock 客户端：回显或按脚本返回，记录调用次数
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<Vec<String>>,
    calls: AtomicU64,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置脚本化响应（按传入顺序返回，耗尽后回退到回显）
    pub fn with_responses(responses: Vec<String>) -> Self {
        let mut responses = responses;
        responses.reverse(); // pop 从尾部取
        Self {
            responses: Mutex::new(responses),
            calls: AtomicU64::new(0),
        }
    }

    /// 实际发起的调用次数（缓存命中不计入）
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let Some(scripted) = self.responses.lock().unwrap().pop() {
            return Ok(scripted);
        }

        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock: {}", last_user))
    }
}
