//! LLM 层：客户端抽象与实现（OpenAI 兼容 / OpenRouter / Mock）

pub mod mock;
pub mod openai;
pub mod openrouter;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use openrouter::{
    create_openrouter_client, OPENROUTER_BASE_URL, OPENROUTER_CODE_MODEL, OPENROUTER_FAST_MODEL,
    OPENROUTER_GENERAL_MODEL,
};
pub use traits::{ChatRequest, LlmClient, LlmError, Message, Role};
