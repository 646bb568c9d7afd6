//! 智能体层：统一执行契约与八个专职智能体
//!
//! 每个智能体实现 Agent：接收任务文本与共享 Context，返回结构化 AgentResult。
//! 业务性失败（如「没有可重构的代码」）通过 status=failed/skipped + error 字段表达，不抛错；
//! 传输/解析类意外失败返回 Err(AgentError)，由工作流节点边界捕获。

pub mod architect;
pub mod bug_fixer;
pub mod code_reader;
pub mod coder;
pub mod planner;
pub mod pr_generator;
pub mod refactorer;
pub mod tester;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::llm::{ChatRequest, LlmClient, LlmError, Message};

pub use architect::ArchitectAgent;
pub use bug_fixer::BugFixerAgent;
pub use code_reader::CodeReaderAgent;
pub use coder::CoderAgent;
pub use planner::PlannerAgent;
pub use pr_generator::PrGeneratorAgent;
pub use refactorer::RefactorerAgent;
pub use tester::TesterAgent;

/// 智能体名称（封闭枚举：路由结果只能是其中之一或终止）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    Planner,
    Coder,
    CodeReader,
    BugFixer,
    Refactorer,
    Tester,
    PrGenerator,
    Architect,
}

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::Planner => "planner",
            AgentName::Coder => "coder",
            AgentName::CodeReader => "code_reader",
            AgentName::BugFixer => "bug_fixer",
            AgentName::Refactorer => "refactorer",
            AgentName::Tester => "tester",
            AgentName::PrGenerator => "pr_generator",
            AgentName::Architect => "architect",
        }
    }

    /// 所有已注册名称（固定顺序）
    pub const ALL: [AgentName; 8] = [
        AgentName::Planner,
        AgentName::Coder,
        AgentName::CodeReader,
        AgentName::BugFixer,
        AgentName::Refactorer,
        AgentName::Tester,
        AgentName::PrGenerator,
        AgentName::Architect,
    ];
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 执行状态标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Completed,
    Partial,
    Failed,
    Skipped,
}

/// 智能体结构化结果：agent 名 + status + 可选 error + 各自的业务载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

impl AgentResult {
    pub fn new(agent: AgentName, status: AgentStatus) -> Self {
        Self {
            agent: agent.as_str().to_string(),
            status,
            error: None,
            payload: serde_json::Map::new(),
        }
    }

    /// 节点边界在重试耗尽后生成的最小错误结果
    pub fn from_error(agent: AgentName, error: impl Into<String>) -> Self {
        let mut result = Self::new(agent, AgentStatus::Failed);
        result.error = Some(error.into());
        result
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// 共享上下文：键值存储，贯穿一次运行
///
/// 调用方注入的输入键（file_path、code、requirements_text 等）保持扁平；
/// 智能体发布的数据一律经 publish 加 "{agent}.{key}" 命名空间，避免不同智能体写同名键互相覆盖。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// 调用方输入键（不加命名空间）
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// 智能体发布数据：键按 "{agent}.{key}" 命名空间写入
    pub fn publish(&mut self, agent: AgentName, key: &str, value: impl Into<Value>) {
        self.0.insert(format!("{}.{}", agent.as_str(), key), value.into());
    }

    /// 读取某智能体发布的键
    pub fn published(&self, agent: AgentName, key: &str) -> Option<&Value> {
        self.0.get(&format!("{}.{}", agent.as_str(), key))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// 智能体执行错误（意外失败；业务性失败走 AgentResult.status）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Plan parse error: {0}")]
    PlanParse(String),

    #[error("Workspace error: {0}")]
    Workspace(#[from] crate::workspace::WorkspaceError),

    #[error("GitHub error: {0}")]
    GitHub(#[from] crate::github::GitHubError),
}

/// 智能体 trait：任务 + 可变上下文 -> 结构化结果
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> AgentName;

    async fn execute(&self, task: &str, context: &mut Context)
        -> Result<AgentResult, AgentError>;
}

/// 各智能体的角色系统提示词
pub fn role_prompt(agent: AgentName) -> &'static str {
    match agent {
        AgentName::Planner => {
            "You are a senior product engineer. You read high-level product \
             requirements and produce implementation plans."
        }
        AgentName::Coder => {
            "You are a senior software engineer. You generate complete, \
             production-ready code files from a plan."
        }
        AgentName::CodeReader => {
            "You are an expert at reading and summarizing codebases. Inspect the \
             repository, capture structure, technologies, and key files."
        }
        AgentName::BugFixer => {
            "You specialize in bug fixing. Identify defects, explain root causes, \
             and provide corrected code."
        }
        AgentName::Refactorer => {
            "You focus on refactoring. Improve readability and maintainability \
             without changing behavior."
        }
        AgentName::Tester => {
            "You write and optionally run tests. Produce thorough pytest suites \
             and describe the coverage."
        }
        AgentName::PrGenerator => {
            "You prepare pull-request documentation. Summarize changes and draft \
             commit messages plus PR descriptions."
        }
        AgentName::Architect => {
            "You act as a software architect. Suggest project structure \
             improvements and best practices."
        }
    }
}

/// 共享 LLM 调用辅助：角色提示词 + 上下文渲染进 system，prompt 作为 user 消息
pub(crate) struct LlmHelper {
    pub client: Arc<dyn LlmClient>,
    pub agent: AgentName,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmHelper {
    pub fn new(client: Arc<dyn LlmClient>, agent: AgentName, model: impl Into<String>) -> Self {
        Self {
            client,
            agent,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    fn build_system_message(&self, context: &Context) -> String {
        let mut system = role_prompt(self.agent).to_string();
        if !context.is_empty() {
            let rendered: Vec<String> = context
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{}: {}", k, s),
                    other => format!("{}: {}", k, other),
                })
                .collect();
            system.push_str("\n\nContext:\n");
            system.push_str(&rendered.join("\n"));
        }
        system
    }

    pub async fn call(&self, prompt: &str, context: &Context) -> Result<String, LlmError> {
        let messages = vec![
            Message::system(self.build_system_message(context)),
            Message::user(prompt),
        ];
        let request = ChatRequest::new(messages, self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        self.client.chat(&request).await
    }

    /// 覆盖 max_tokens 的调用（coder 生成整文件时用更大的预算）
    pub async fn call_with_max_tokens(
        &self,
        prompt: &str,
        context: &Context,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let messages = vec![
            Message::system(self.build_system_message(context)),
            Message::user(prompt),
        ];
        let request = ChatRequest::new(messages, self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(max_tokens);
        self.client.chat(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_name_round_trip() {
        for name in AgentName::ALL {
            let json = serde_json::to_string(&name).unwrap();
            let back: AgentName = serde_json::from_str(&json).unwrap();
            assert_eq!(name, back);
        }
        assert_eq!(AgentName::CodeReader.as_str(), "code_reader");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AgentStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&AgentStatus::Partial).unwrap(),
            "\"partial\""
        );
    }

    #[test]
    fn test_result_payload_flattens() {
        let result = AgentResult::new(AgentName::Planner, AgentStatus::Completed)
            .with_field("plan_markdown", "# Plan");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["agent"], "planner");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["plan_markdown"], "# Plan");
    }

    #[test]
    fn test_context_publish_namespaces_keys() {
        let mut ctx = Context::new();
        ctx.insert("file_path", "src/a.rs");
        ctx.publish(AgentName::Planner, "plan_markdown", "# Plan");

        assert_eq!(ctx.get_str("file_path"), Some("src/a.rs"));
        assert_eq!(
            ctx.published(AgentName::Planner, "plan_markdown")
                .and_then(|v| v.as_str()),
            Some("# Plan")
        );
        // 另一个智能体发布同名键互不覆盖
        let mut ctx2 = ctx.clone();
        ctx2.publish(AgentName::Coder, "plan_markdown", "other");
        assert_eq!(
            ctx2.published(AgentName::Planner, "plan_markdown")
                .and_then(|v| v.as_str()),
            Some("# Plan")
        );
    }
}
