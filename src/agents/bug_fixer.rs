//! 排错智能体
//!
//! 两种模式：上下文给定 code/file_path 时做单文件分析 + 修复；
//! 否则扫描工作区（最多 10 个文件）逐个找 bug，再汇总一份按严重度排序的报告。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::code_reader::SOURCE_EXTENSIONS;
use crate::agents::{
    Agent, AgentError, AgentName, AgentResult, AgentStatus, Context, LlmHelper,
};
use crate::llm::LlmClient;
use crate::workspace::Workspace;

/// 整库模式下的最大分析文件数
const MAX_SCAN_FILES: usize = 10;

pub struct BugFixerAgent {
    llm: LlmHelper,
    workspace: Workspace,
}

impl BugFixerAgent {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, workspace: Workspace) -> Self {
        Self {
            llm: LlmHelper::new(client, AgentName::BugFixer, model),
            workspace,
        }
    }

    async fn find_bugs(
        &self,
        code: &str,
        file_path: &str,
        context: &Context,
    ) -> Result<String, AgentError> {
        let prompt = format!(
            "Analyze the following code for bugs, errors, and issues:\n\n\
             File: {file_path}\n\n\
             Code:\n```\n{code}\n```\n\n\
             Please identify:\n\
             1. Syntax errors\n\
             2. Logic errors\n\
             3. Potential runtime errors\n\
             4. Security issues\n\
             5. Performance problems\n\n\
             Provide specific line numbers and explanations for each issue found.",
        );
        Ok(self.llm.call(&prompt, context).await?)
    }

    async fn fix_bug(
        &self,
        code: &str,
        bug_description: &str,
        file_path: &str,
        context: &Context,
    ) -> Result<String, AgentError> {
        let prompt = format!(
            "Fix the following bug in the code:\n\n\
             File: {file_path}\n\
             Bug Description: {bug_description}\n\n\
             Original Code:\n```\n{code}\n```\n\n\
             Please provide the fixed code with explanations of what was changed and why.",
        );
        Ok(self.llm.call(&prompt, context).await?)
    }

    /// 整库扫描：逐文件分析后再让 LLM 做一次严重度汇总
    async fn analyze_codebase(
        &self,
        task: &str,
        context: &Context,
    ) -> Result<AgentResult, AgentError> {
        let files = self.workspace.list_files(&SOURCE_EXTENSIONS);
        let mut bugs_found = Vec::new();
        let mut analyses = Vec::new();

        for path in files.iter().take(MAX_SCAN_FILES) {
            let content = match self.workspace.read_file(path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let analysis = self.find_bugs(&content, path, context).await?;
            analyses.push(analysis.clone());
            bugs_found.push(json!({ "file_path": path, "analysis": analysis }));
        }

        let summary_prompt = format!(
            "Task: {task}\n\n\
             I've analyzed multiple files. Here are the bug findings:\n{}\n\n\
             Please provide a summary of all bugs found and prioritize them by severity.",
            analyses.join("\n"),
        );
        let summary = self.llm.call(&summary_prompt, context).await?;

        Ok(AgentResult::new(AgentName::BugFixer, AgentStatus::Completed)
            .with_field("task", task)
            .with_field("bugs_found", json!(bugs_found))
            .with_field("summary", summary))
    }
}

#[async_trait]
impl Agent for BugFixerAgent {
    fn name(&self) -> AgentName {
        AgentName::BugFixer
    }

    async fn execute(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        let file_path = context.get_str("file_path").unwrap_or_default().to_string();
        let mut code = context.get_str("code").unwrap_or_default().to_string();

        if code.is_empty() && !file_path.is_empty() {
            code = self.workspace.read_file(&file_path)?;
        }

        if code.is_empty() {
            let result = self.analyze_codebase(task, context).await?;
            if let Some(summary) = result.field("summary").cloned() {
                context.publish(AgentName::BugFixer, "summary", summary);
            }
            return Ok(result);
        }

        // 单文件模式：先分析再修复
        let analysis = self.find_bugs(&code, &file_path, context).await?;
        let fixed_code = self.fix_bug(&code, &analysis, &file_path, context).await?;

        context.publish(AgentName::BugFixer, "summary", analysis.clone());

        Ok(AgentResult::new(AgentName::BugFixer, AgentStatus::Completed)
            .with_field("task", task)
            .with_field("file_path", file_path)
            .with_field(
                "bug_analysis",
                json!({ "analysis": analysis }),
            )
            .with_field("fixed_code", fixed_code))
    }
}
