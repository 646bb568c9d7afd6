//! 编码智能体
//!
//! 两段式生成：先向 LLM 要 JSON 文件计划（括号配平抽取 + markdown 围栏清洗），
//! 再逐文件生成完整内容（每个文件最多 3 次尝试，JS 做括号配平校验），经工作区写盘。
//! 计划解析失败时回退默认文件计划；LLM 返回配额类错误文本时回退空计划。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::agents::{
    Agent, AgentError, AgentName, AgentResult, AgentStatus, Context, LlmHelper,
};
use crate::llm::LlmClient;
use crate::workspace::Workspace;

/// 单个文件生成的最大尝试次数
const MAX_FILE_ATTEMPTS: u32 = 3;
/// 非代码格式文件的最小合理长度
const MIN_CONTENT_LEN: usize = 50;

/// 文件计划条目
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FilePlanItem {
    pub path: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct FilePlan {
    #[serde(default)]
    files: Vec<FilePlanItem>,
}

/// 从 LLM 输出中抽取首个大括号配平的 JSON 对象
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

static FENCE_OPEN_RE: OnceLock<Regex> = OnceLock::new();
static FENCE_CLOSE_RE: OnceLock<Regex> = OnceLock::new();
static CHATTER_PREFIX_RE: OnceLock<Regex> = OnceLock::new();

/// 去掉 markdown 代码围栏与 "Here is ..." 类前缀
pub fn clean_content(raw: &str) -> String {
    let fence_open = FENCE_OPEN_RE.get_or_init(|| Regex::new(r"^```\w*\n").unwrap());
    let fence_close = FENCE_CLOSE_RE.get_or_init(|| Regex::new(r"\n```\s*$").unwrap());
    let prefix = CHATTER_PREFIX_RE
        .get_or_init(|| Regex::new(r"(?i)^(here|below|here is|here's).*?:\n").unwrap());

    let content = fence_open.replace(raw, "");
    let content = fence_close.replace(&content, "");
    let content = prefix.replace(&content, "");
    content.trim().to_string()
}

/// JS 括号配平校验（粗检查：{} [] () 三组计数为零）
fn is_balanced_js(code: &str) -> bool {
    let count = |open: char, close: char| {
        code.matches(open).count() as i64 - code.matches(close).count() as i64
    };
    count('{', '}') == 0 && count('[', ']') == 0 && count('(', ')') == 0
}

/// 默认文件计划（todo 应用骨架，计划解析彻底失败时的兜底）
fn default_file_plan() -> Vec<FilePlanItem> {
    [
        ("index.html", "Main HTML file with form and list"),
        ("app.js", "TodoApp class and DOM logic"),
        ("style.css", "CSS styling"),
        ("package.json", "npm configuration with jest"),
        ("tests/app.test.js", "Jest unit tests"),
        ("README.md", "Documentation"),
    ]
    .into_iter()
    .map(|(path, desc)| FilePlanItem {
        path: path.to_string(),
        description: desc.to_string(),
    })
    .collect()
}

pub struct CoderAgent {
    llm: LlmHelper,
    workspace: Workspace,
}

impl CoderAgent {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, workspace: Workspace) -> Self {
        Self {
            llm: LlmHelper::new(client, AgentName::Coder, model),
            workspace,
        }
    }

    async fn get_file_plan(
        &self,
        task: &str,
        plan_markdown: &str,
        context: &Context,
    ) -> Result<Vec<FilePlanItem>, AgentError> {
        let prompt = format!(
            "Return ONLY a valid JSON object listing all files for the project.\n\n\
             Task:\n{task}\n\n\
             High-level plan:\n{plan_markdown}\n\n\
             JSON format:\n\
             {{\n  \"files\": [\n    {{\"path\": \"index.html\", \"description\": \"Main HTML file\"}}\n  ]\n}}\n\n\
             IMPORTANT:\n\
             - Return ONLY valid JSON\n\
             - No markdown, no code blocks\n\
             - Each file must have \"path\" and \"description\"\n\
             - Paths must be relative (no leading /)",
        );

        let raw = self.llm.call(&prompt, context).await?;

        // LLM 把配额类错误作为文本返回时不再兜底生成文件
        let lower = raw.to_lowercase();
        if lower.contains("quota") || lower.contains("error calling") {
            tracing::warn!("file plan response carries an api error, skipping generation");
            return Ok(Vec::new());
        }

        match extract_json_object(&raw).and_then(|s| serde_json::from_str::<FilePlan>(s).ok()) {
            Some(plan) if !plan.files.is_empty() => Ok(plan.files),
            _ => {
                tracing::warn!("file plan unparseable, falling back to default plan");
                Ok(default_file_plan())
            }
        }
    }

    async fn generate_file_content(
        &self,
        task: &str,
        plan_markdown: &str,
        item: &FilePlanItem,
        context: &Context,
    ) -> Result<String, AgentError> {
        let prompt = format!(
            "Generate COMPLETE, production-ready code.\n\n\
             Task:\n{task}\n\n\
             High-level plan:\n{plan_markdown}\n\n\
             File to generate:\n- Path: {path}\n- Description: {desc}\n\n\
             Requirements:\n\
             1. Generate COMPLETE, working code (not stubs or pseudocode)\n\
             2. No placeholder comments\n\
             3. Code must be VALID and EXECUTABLE\n\
             4. If JavaScript: balanced braces, proper syntax\n\
             5. Do NOT wrap in markdown code blocks\n\n\
             Return ONLY the file content, nothing else.",
            path = item.path,
            desc = item.description,
        );

        let mut last = String::new();
        for attempt in 0..MAX_FILE_ATTEMPTS {
            let raw = self.llm.call_with_max_tokens(&prompt, context, 4000).await?;
            let content = clean_content(&raw);
            if content.is_empty() {
                tracing::warn!(path = %item.path, attempt, "empty content, retrying");
                continue;
            }
            let valid = if item.path.ends_with(".js") {
                is_balanced_js(&content)
            } else if item.path.ends_with(".json")
                || item.path.ends_with(".html")
                || item.path.ends_with(".css")
                || item.path.ends_with(".md")
            {
                content.len() > MIN_CONTENT_LEN
            } else {
                true
            };
            if valid {
                return Ok(content);
            }
            tracing::warn!(path = %item.path, attempt, "generated content failed validation");
            last = content;
        }
        // 兜底：返回最后一次内容，由写盘环节决定成败
        Ok(last)
    }
}

#[async_trait]
impl Agent for CoderAgent {
    fn name(&self) -> AgentName {
        AgentName::Coder
    }

    async fn execute(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        let plan_markdown = context
            .published(AgentName::Planner, "plan_markdown")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let file_plan = self.get_file_plan(task, &plan_markdown, context).await?;

        let mut files_written: Vec<String> = Vec::new();
        let mut files_failed: Vec<String> = Vec::new();
        let mut fail_detail = Vec::new();

        for item in &file_plan {
            tracing::info!(path = %item.path, "generating file");
            match self
                .generate_file_content(task, &plan_markdown, item, context)
                .await
            {
                Ok(content) if content.trim().len() >= 5 => {
                    match self.workspace.write_file(&item.path, &content) {
                        Ok(()) => files_written.push(item.path.clone()),
                        Err(e) => {
                            files_failed.push(item.path.clone());
                            fail_detail.push(json!({ "file": item.path, "error": e.to_string() }));
                        }
                    }
                }
                Ok(_) => {
                    files_failed.push(item.path.clone());
                    fail_detail
                        .push(json!({ "file": item.path, "error": "Empty code generated." }));
                }
                Err(e) => {
                    files_failed.push(item.path.clone());
                    fail_detail.push(json!({ "file": item.path, "error": e.to_string() }));
                }
            }
        }

        let status = if files_written.is_empty() {
            AgentStatus::Failed
        } else {
            AgentStatus::Completed
        };

        context.publish(AgentName::Coder, "files_written", json!(files_written));

        let mut result = AgentResult::new(AgentName::Coder, status)
            .with_field("task", task)
            .with_field("files_written", json!(files_written))
            .with_field("files_failed", json!(files_failed))
            .with_field("fail_detail", json!(fail_detail));
        if matches!(status, AgentStatus::Failed) {
            result = result.with_error("no files were generated");
        }
        Ok(result)
    }
}
