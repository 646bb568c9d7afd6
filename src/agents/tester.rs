//! 测试智能体
//!
//! 两种动作：write 为给定代码生成测试用例并发布 test_code；
//! run 在工作区根目录执行测试命令（默认 pytest -v，可经上下文 test_command 覆盖），
//! 捕获 stdout/stderr 与退出码，超时与启动失败都折叠为 success=false。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::agents::{
    Agent, AgentError, AgentName, AgentResult, AgentStatus, Context, LlmHelper,
};
use crate::llm::LlmClient;
use crate::workspace::Workspace;

/// 测试命令的最长执行时间
const TEST_RUN_TIMEOUT: Duration = Duration::from_secs(60);

pub struct TesterAgent {
    llm: LlmHelper,
    workspace: Workspace,
}

impl TesterAgent {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, workspace: Workspace) -> Self {
        Self {
            llm: LlmHelper::new(client, AgentName::Tester, model),
            workspace,
        }
    }

    async fn write_tests(
        &self,
        code: &str,
        file_path: &str,
        context: &Context,
    ) -> Result<String, AgentError> {
        let prompt = format!(
            "Write comprehensive test cases for the following code:\n\n\
             File: {file_path}\n\n\
             Code:\n```\n{code}\n```\n\n\
             Please provide:\n\
             1. Unit tests covering all functions\n\
             2. Edge cases\n\
             3. Error handling tests\n\
             4. Integration tests if applicable\n\n\
             Write tests in pytest format.",
        );
        Ok(self.llm.call(&prompt, context).await?)
    }

    /// 在工作区根目录执行测试命令
    async fn run_tests(&self, command: &[String]) -> Value {
        let Some((program, args)) = command.split_first() else {
            return json!({
                "success": false,
                "error": "empty test command",
                "stdout": "",
                "stderr": "",
            });
        };
        let output = tokio::time::timeout(
            TEST_RUN_TIMEOUT,
            Command::new(program)
                .args(args)
                .current_dir(self.workspace.root())
                .output(),
        )
        .await;
        match output {
            Ok(Ok(out)) => json!({
                "success": out.status.success(),
                "stdout": String::from_utf8_lossy(&out.stdout),
                "stderr": String::from_utf8_lossy(&out.stderr),
                "return_code": out.status.code().unwrap_or(-1),
            }),
            Ok(Err(e)) => json!({
                "success": false,
                "error": e.to_string(),
                "stdout": "",
                "stderr": "",
            }),
            Err(_) => json!({
                "success": false,
                "error": "Test execution timeout",
                "stdout": "",
                "stderr": "",
            }),
        }
    }
}

#[async_trait]
impl Agent for TesterAgent {
    fn name(&self) -> AgentName {
        AgentName::Tester
    }

    async fn execute(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        let action = context.get_str("action").unwrap_or("write").to_string();
        let file_path = context.get_str("file_path").unwrap_or_default().to_string();

        match action.as_str() {
            "write" => {
                let mut code = context.get_str("code").unwrap_or_default().to_string();
                if code.is_empty() && !file_path.is_empty() {
                    code = self.workspace.read_file(&file_path).unwrap_or_default();
                }
                if code.is_empty() {
                    return Ok(AgentResult::from_error(
                        AgentName::Tester,
                        "No code provided for test writing",
                    )
                    .with_field("task", task));
                }

                let test_code = self.write_tests(&code, &file_path, context).await?;
                context.publish(AgentName::Tester, "test_code", test_code.clone());

                Ok(AgentResult::new(AgentName::Tester, AgentStatus::Completed)
                    .with_field("task", task)
                    .with_field("test_code", test_code)
                    .with_field("file_path", file_path))
            }
            "run" => {
                let command: Vec<String> = match context.get_str("test_command") {
                    Some(cmd) => cmd.split_whitespace().map(str::to_string).collect(),
                    None => {
                        let mut cmd = vec!["pytest".to_string()];
                        if let Some(test_file) = context.get_str("test_file") {
                            cmd.push(test_file.to_string());
                        }
                        cmd.push("-v".to_string());
                        cmd
                    }
                };
                let test_results = self.run_tests(&command).await;

                Ok(AgentResult::new(AgentName::Tester, AgentStatus::Completed)
                    .with_field("task", task)
                    .with_field("test_results", test_results))
            }
            other => Ok(AgentResult::from_error(
                AgentName::Tester,
                format!("Unknown action: {other}"),
            )
            .with_field("task", task)),
        }
    }
}
