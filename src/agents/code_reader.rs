//! 代码库阅读智能体
//!
//! 纯工作区扫描，不调用 LLM：按扩展名递归列出文件，逐个读取并生成轻量摘要。
//! 发布 code_reader.file_list / code_reader.summaries 供下游智能体消费。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::{Agent, AgentError, AgentName, AgentResult, AgentStatus, Context};
use crate::workspace::Workspace;

/// 扫描的源码扩展名
pub const SOURCE_EXTENSIONS: [&str; 9] = [
    ".rs", ".py", ".js", ".ts", ".html", ".css", ".json", ".toml", ".md",
];

/// 单文件摘要：路径、行数、头部结构行
fn summarize_file(path: &str, content: &str) -> String {
    let line_count = content.lines().count();
    // 头部结构行：函数/类型/类声明等，最多 8 条
    let decls: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| {
            l.starts_with("fn ")
                || l.starts_with("pub fn ")
                || l.starts_with("struct ")
                || l.starts_with("pub struct ")
                || l.starts_with("class ")
                || l.starts_with("def ")
                || l.starts_with("function ")
                || l.starts_with("impl ")
        })
        .take(8)
        .collect();
    format!(
        "File: {} ({} lines)\nDeclarations: {}",
        path,
        line_count,
        if decls.is_empty() {
            "[none detected]".to_string()
        } else {
            decls.join("; ")
        }
    )
}

pub struct CodeReaderAgent {
    workspace: Workspace,
}

impl CodeReaderAgent {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    /// 扫描工作区：返回 (文件列表, 摘要映射, 读取错误列表)
    pub fn analyze(&self) -> (Vec<String>, serde_json::Map<String, Value>, Vec<Value>) {
        let files = self.workspace.list_files(&SOURCE_EXTENSIONS);
        let mut summaries = serde_json::Map::new();
        let mut errors = Vec::new();

        for path in &files {
            match self.workspace.read_file(path) {
                Ok(content) => {
                    summaries.insert(path.clone(), json!(summarize_file(path, &content)));
                }
                Err(e) => {
                    errors.push(json!({ "file": path, "error": e.to_string() }));
                }
            }
        }

        (files, summaries, errors)
    }
}

#[async_trait]
impl Agent for CodeReaderAgent {
    fn name(&self) -> AgentName {
        AgentName::CodeReader
    }

    async fn execute(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        let (files, summaries, errors) = self.analyze();

        let status = if errors.is_empty() {
            AgentStatus::Completed
        } else {
            AgentStatus::Partial
        };

        context.publish(AgentName::CodeReader, "file_list", json!(files));
        context.publish(
            AgentName::CodeReader,
            "summaries",
            Value::Object(summaries.clone()),
        );

        Ok(AgentResult::new(AgentName::CodeReader, status)
            .with_field("task", task)
            .with_field("total_files", files.len())
            .with_field("file_list", json!(files))
            .with_field("codebase_info", Value::Object(summaries))
            .with_field("errors", Value::Array(errors)))
    }
}
