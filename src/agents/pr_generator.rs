//! PR 生成智能体
//!
//! 汇集上游智能体发布的变更信息，生成约定式提交信息与 PR 描述。
//! 配置了 GitHub 仓库且上下文携带 head_branch 时会真正调用 REST 开 PR，
//! 否则在结果里附带手动操作指引。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::{
    Agent, AgentError, AgentName, AgentResult, AgentStatus, Context, LlmHelper,
};
use crate::github::GitHubClient;
use crate::llm::LlmClient;

/// 未配置 GitHub 时写入结果的操作指引
const MANUAL_NOTE: &str = "Commit and PR text created. To open an actual GitHub PR:\n\
1. Commit your code with the generated message.\n\
2. Push your branch to GitHub.\n\
3. Create a PR with the generated description, or call the \
GitHub CLI/API to automate these steps.";

/// 真实开 PR 的目标仓库配置
#[derive(Debug, Clone)]
pub struct PrTarget {
    pub repo: String,
    pub base_branch: String,
}

pub struct PrGeneratorAgent {
    llm: LlmHelper,
    github: Option<(GitHubClient, PrTarget)>,
}

/// 把变更映射渲染为缩进文本
fn format_changes(changes: &serde_json::Map<String, Value>) -> String {
    let mut lines = Vec::new();
    for (key, value) in changes {
        match value {
            Value::Object(map) => {
                lines.push(format!("{key}:"));
                for (k, v) in map {
                    lines.push(format!("  - {k}: {v}"));
                }
            }
            Value::String(s) => lines.push(format!("{key}: {s}")),
            other => lines.push(format!("{key}: {other}")),
        }
    }
    lines.join("\n")
}

impl PrGeneratorAgent {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm: LlmHelper::new(client, AgentName::PrGenerator, model),
            github: None,
        }
    }

    pub fn with_github(mut self, client: GitHubClient, target: PrTarget) -> Self {
        self.github = Some((client, target));
        self
    }

    /// 从上下文收集上游智能体发布的变更摘要
    fn collect_changes(&self, context: &Context) -> serde_json::Map<String, Value> {
        let mut changes = serde_json::Map::new();
        if let Some(explicit) = context.get("changes").and_then(|v| v.as_object()) {
            return explicit.clone();
        }
        for (published_agent, key) in [
            (AgentName::Planner, "plan_markdown"),
            (AgentName::Coder, "files_written"),
            (AgentName::CodeReader, "file_list"),
            (AgentName::BugFixer, "summary"),
            (AgentName::Refactorer, "summary"),
            (AgentName::Tester, "test_code"),
        ] {
            if let Some(value) = context.published(published_agent, key) {
                changes.insert(
                    format!("{}.{}", published_agent.as_str(), key),
                    value.clone(),
                );
            }
        }
        changes
    }

    async fn generate_commit_message(
        &self,
        changes: &serde_json::Map<String, Value>,
        context: &Context,
    ) -> Result<String, AgentError> {
        let prompt = format!(
            "Generate a clear and descriptive commit message for the following changes:\n\n\
             Changes:\n{}\n\n\
             Follow conventional commit format:\n\
             - type(scope): subject\n\
             - body (optional)\n\
             - footer (optional)\n\n\
             Types: feat, fix, refactor, test, docs, style, chore",
            format_changes(changes),
        );
        Ok(self.llm.call(&prompt, context).await?)
    }

    async fn generate_pr_description(
        &self,
        changes: &serde_json::Map<String, Value>,
        commits: &[String],
        context: &Context,
    ) -> Result<String, AgentError> {
        let commits_text = if commits.is_empty() {
            "N/A".to_string()
        } else {
            commits.join("\n")
        };
        let prompt = format!(
            "Generate a comprehensive pull request description for the following changes:\n\n\
             Changes Summary:\n{}\n\n\
             Commits:\n{commits_text}\n\n\
             Please include:\n\
             1. Summary of changes\n\
             2. What was changed and why\n\
             3. Testing done\n\
             4. Screenshots/demos if applicable\n\
             5. Checklist",
            format_changes(changes),
        );
        Ok(self.llm.call(&prompt, context).await?)
    }
}

#[async_trait]
impl Agent for PrGeneratorAgent {
    fn name(&self) -> AgentName {
        AgentName::PrGenerator
    }

    async fn execute(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        let changes = self.collect_changes(context);
        let commits: Vec<String> = context
            .get("commits")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let action = context.get_str("action").unwrap_or("both").to_string();

        let mut inner = serde_json::Map::new();

        let commit_message = if action == "commit" || action == "both" {
            let msg = self.generate_commit_message(&changes, context).await?;
            inner.insert("commit_message".to_string(), json!(msg));
            Some(msg)
        } else {
            None
        };

        let pr_description = if action == "pr" || action == "both" {
            let desc = self.generate_pr_description(&changes, &commits, context).await?;
            inner.insert("pr_description".to_string(), json!(desc));
            Some(desc)
        } else {
            None
        };

        if let Some(msg) = &commit_message {
            context.publish(AgentName::PrGenerator, "commit_message", msg.clone());
        }

        let mut result = AgentResult::new(AgentName::PrGenerator, AgentStatus::Completed)
            .with_field("task", task)
            .with_field("result", Value::Object(inner));

        // 仅当配置了目标仓库且上下文给出 head 分支时才真正开 PR
        let head_branch = context.get_str("head_branch").map(str::to_string);
        match (&self.github, head_branch) {
            (Some((client, target)), Some(head)) => {
                let title = commit_message
                    .as_deref()
                    .and_then(|m| m.lines().next())
                    .unwrap_or(task)
                    .to_string();
                let body = pr_description.unwrap_or_default();
                match client
                    .create_pull_request(&target.repo, &title, &body, &head, &target.base_branch)
                    .await
                {
                    Ok(url) => {
                        context.publish(AgentName::PrGenerator, "pr_url", url.clone());
                        result = result.with_field("pr_url", url);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to open pull request");
                        result = result
                            .with_field("note", MANUAL_NOTE)
                            .with_field("pr_error", e.to_string());
                    }
                }
            }
            _ => {
                result = result.with_field("note", MANUAL_NOTE);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_generates_commit_and_description() {
        let client = Arc::new(MockLlmClient::with_responses(vec![
            "feat(todo): add todo app".to_string(),
            "## Summary\nAdds a todo app.".to_string(),
        ]));
        let agent = PrGeneratorAgent::new(client, "mock-model");

        let mut ctx = Context::new();
        ctx.publish(AgentName::Coder, "files_written", json!(["app.js"]));
        let result = agent.execute("create pr", &mut ctx).await.unwrap();

        assert!(matches!(result.status, AgentStatus::Completed));
        let inner = result.field("result").unwrap();
        assert_eq!(inner["commit_message"], "feat(todo): add todo app");
        assert!(inner["pr_description"].as_str().unwrap().contains("Summary"));
        assert_eq!(
            ctx.published(AgentName::PrGenerator, "commit_message").unwrap(),
            "feat(todo): add todo app"
        );
        // 未配置 GitHub 时附带操作指引
        assert!(result.field("note").is_some());
    }

    #[tokio::test]
    async fn test_commit_only_action_skips_description() {
        let client = Arc::new(MockLlmClient::with_responses(vec![
            "chore: tidy".to_string(),
        ]));
        let agent = PrGeneratorAgent::new(client.clone(), "mock-model");

        let mut ctx = Context::new();
        ctx.insert("action", "commit");
        let result = agent.execute("commit changes", &mut ctx).await.unwrap();

        let inner = result.field("result").unwrap();
        assert_eq!(inner["commit_message"], "chore: tidy");
        assert!(inner.get("pr_description").is_none());
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn test_collect_changes_gathers_published_test_code() {
        let agent = PrGeneratorAgent::new(Arc::new(MockLlmClient::new()), "mock-model");
        let mut ctx = Context::new();
        ctx.publish(AgentName::Tester, "test_code", "def test_ok(): pass");

        let changes = agent.collect_changes(&ctx);
        assert_eq!(changes["tester.test_code"], "def test_ok(): pass");
    }

    #[test]
    fn test_format_changes_nests_objects() {
        let mut changes = serde_json::Map::new();
        changes.insert("coder.files_written".to_string(), json!("app.js"));
        changes.insert(
            "details".to_string(),
            json!({ "added": 3, "removed": 1 }),
        );
        let text = format_changes(&changes);
        assert!(text.contains("coder.files_written: app.js"));
        assert!(text.contains("  - added: 3"));
    }
}
