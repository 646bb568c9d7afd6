//! 重构智能体
//!
//! 上下文无 code 且无可读 file_path 时直接返回失败结果（业务失败不抛错）。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{
    Agent, AgentError, AgentName, AgentResult, AgentStatus, Context, LlmHelper,
};
use crate::llm::LlmClient;
use crate::workspace::Workspace;

pub struct RefactorerAgent {
    llm: LlmHelper,
    workspace: Workspace,
}

impl RefactorerAgent {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, workspace: Workspace) -> Self {
        Self {
            llm: LlmHelper::new(client, AgentName::Refactorer, model),
            workspace,
        }
    }

    async fn refactor_code(
        &self,
        code: &str,
        file_path: &str,
        improvements: &str,
        context: &Context,
    ) -> Result<String, AgentError> {
        let improvements = if improvements.is_empty() {
            "General refactoring"
        } else {
            improvements
        };
        let prompt = format!(
            "Refactor the following code to improve quality, readability, and maintainability:\n\n\
             File: {file_path}\n\
             Specific improvements requested: {improvements}\n\n\
             Original Code:\n```\n{code}\n```\n\n\
             Please provide:\n\
             1. Refactored code\n\
             2. List of improvements made\n\
             3. Explanation of changes\n\
             4. Before/after comparison\n\n\
             Keep the functionality exactly the same, only improve code quality.",
        );
        Ok(self.llm.call(&prompt, context).await?)
    }
}

#[async_trait]
impl Agent for RefactorerAgent {
    fn name(&self) -> AgentName {
        AgentName::Refactorer
    }

    async fn execute(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        let file_path = context.get_str("file_path").unwrap_or_default().to_string();
        let improvements = context
            .get_str("improvements")
            .unwrap_or_default()
            .to_string();
        let mut code = context.get_str("code").unwrap_or_default().to_string();

        if code.is_empty() && !file_path.is_empty() {
            code = self.workspace.read_file(&file_path).unwrap_or_default();
        }

        if code.is_empty() {
            return Ok(AgentResult::from_error(
                AgentName::Refactorer,
                "No code provided for refactoring",
            )
            .with_field("task", task));
        }

        let refactored = self
            .refactor_code(&code, &file_path, &improvements, context)
            .await?;

        context.publish(AgentName::Refactorer, "summary", refactored.clone());

        Ok(AgentResult::new(AgentName::Refactorer, AgentStatus::Completed)
            .with_field("task", task)
            .with_field("file_path", file_path.clone())
            .with_field(
                "result",
                json!({ "refactored_code": refactored, "file_path": file_path }),
            ))
    }
}
