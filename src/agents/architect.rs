//! 架构建议智能体
//!
//! 扫描工作区得到结构信息，两次 LLM 调用分别产出目录结构建议与最佳实践清单。
//! 扫描失败时退化为空结构继续给建议。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::code_reader::SOURCE_EXTENSIONS;
use crate::agents::{
    Agent, AgentError, AgentName, AgentResult, AgentStatus, Context, LlmHelper,
};
use crate::llm::LlmClient;
use crate::workspace::Workspace;

pub struct ArchitectAgent {
    llm: LlmHelper,
    workspace: Workspace,
}

impl ArchitectAgent {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, workspace: Workspace) -> Self {
        Self {
            llm: LlmHelper::new(client, AgentName::Architect, model),
            workspace,
        }
    }

    async fn suggest_structure(
        &self,
        total_files: usize,
        files: &[String],
        context: &Context,
    ) -> Result<String, AgentError> {
        let prompt = format!(
            "Based on the current project structure:\n\n\
             Total files: {total_files}\n\
             Files:\n{}\n\n\
             Please suggest:\n\
             1. Improved directory structure\n\
             2. File organization best practices\n\
             3. Naming conventions\n\
             4. Module/package structure\n\
             5. Configuration management\n\
             6. Documentation structure\n\n\
             Provide specific recommendations with explanations.",
            if files.is_empty() {
                "No structure provided".to_string()
            } else {
                files.join("\n")
            },
        );
        Ok(self.llm.call(&prompt, context).await?)
    }

    async fn suggest_best_practices(
        &self,
        total_files: usize,
        context: &Context,
    ) -> Result<String, AgentError> {
        let prompt = format!(
            "Analyze the codebase and suggest best practices:\n\n\
             Codebase Info:\n\
             - Total files: {total_files}\n\
             - Structure: Analyzed from codebase\n\n\
             Please suggest:\n\
             1. Code organization improvements\n\
             2. Design patterns to apply\n\
             3. Testing strategies\n\
             4. Documentation improvements\n\
             5. CI/CD recommendations\n\
             6. Security best practices",
        );
        Ok(self.llm.call(&prompt, context).await?)
    }
}

#[async_trait]
impl Agent for ArchitectAgent {
    fn name(&self) -> AgentName {
        AgentName::Architect
    }

    async fn execute(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        let files = self.workspace.list_files(&SOURCE_EXTENSIONS);
        let total_files = files.len();

        let suggestions = self.suggest_structure(total_files, &files, context).await?;
        let best_practices = self.suggest_best_practices(total_files, context).await?;

        context.publish(AgentName::Architect, "suggestions", suggestions.clone());

        Ok(AgentResult::new(AgentName::Architect, AgentStatus::Completed)
            .with_field("task", task)
            .with_field("structure_suggestions", json!({ "suggestions": suggestions }))
            .with_field("best_practices", json!({ "best_practices": best_practices })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_architect_makes_two_llm_calls() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        ws.write_file("src/main.rs", "fn main() {}\n").unwrap();
        let client = Arc::new(MockLlmClient::with_responses(vec![
            "use a src layout".to_string(),
            "add integration tests".to_string(),
        ]));
        let agent = ArchitectAgent::new(client.clone(), "mock-model", ws);

        let mut ctx = Context::new();
        let result = agent.execute("suggest structure", &mut ctx).await.unwrap();

        assert!(matches!(result.status, AgentStatus::Completed));
        assert_eq!(
            result.field("structure_suggestions").unwrap()["suggestions"],
            "use a src layout"
        );
        assert_eq!(
            result.field("best_practices").unwrap()["best_practices"],
            "add integration tests"
        );
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_workspace_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let client = Arc::new(MockLlmClient::with_responses(vec![
            "start with src/".to_string(),
            "write tests first".to_string(),
        ]));
        let agent = ArchitectAgent::new(client, "mock-model", ws);

        let mut ctx = Context::new();
        let result = agent.execute("architecture advice", &mut ctx).await.unwrap();
        assert!(matches!(result.status, AgentStatus::Completed));
    }
}
