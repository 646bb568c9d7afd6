//! 工作流集成测试
//!
//! 用 Mock LLM 客户端驱动真实路由器 + 引擎 + 智能体的端到端场景。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use forge::agents::{
    Agent, AgentError, AgentName, AgentResult, AgentStatus, ArchitectAgent, BugFixerAgent,
    CodeReaderAgent, CoderAgent, Context, PlannerAgent, PrGeneratorAgent,
};
use forge::llm::{ChatRequest, LlmClient, LlmError, Message, MockLlmClient};
use forge::reliability::{CircuitBreaker, ReliableLlmClient, ResponseCache, RetryPolicy};
use forge::workflow::{WorkflowEngine, BUILD_PIPELINE};
use forge::workspace::Workspace;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        initial_wait: Duration::from_millis(1),
        max_wait: Duration::from_millis(2),
        exponential_base: 2.0,
        rate_limit_floor: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_unrecognized_task_runs_only_code_reader() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path()).unwrap();
    let engine = WorkflowEngine::new().register(Arc::new(CodeReaderAgent::new(workspace)));

    let state = engine
        .run("zzz nothing matches here", Context::new())
        .await
        .unwrap();

    assert_eq!(state.completed, vec![AgentName::CodeReader]);
    assert_eq!(state.results.len(), 1);
}

#[tokio::test]
async fn test_analyze_task_completes_code_reader_then_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path()).unwrap();
    workspace
        .write_file("src/lib.rs", "pub fn hello() {}\n")
        .unwrap();
    let engine =
        WorkflowEngine::new().register(Arc::new(CodeReaderAgent::new(workspace)));

    let state = engine
        .run("analyze the codebase", Context::new())
        .await
        .unwrap();

    let result = &state.results["code_reader"];
    assert!(matches!(result.status, AgentStatus::Completed));
    assert_eq!(state.completed, vec![AgentName::CodeReader]);
}

#[tokio::test]
async fn test_build_task_runs_full_pipeline_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path()).unwrap();

    // 按消费顺序编写脚本：planner 1 条，coder 2 条（计划 + app.js 内容），
    // bug_fixer 2 条（单文件分析 + 汇总），pr_generator 2 条，architect 2 条
    let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::with_responses(vec![
        "# Plan\n1. write the app".to_string(),
        r#"{"files": [{"path": "app.js", "description": "todo app entry"}]}"#.to_string(),
        "class TodoApp { constructor() { this.items = []; } }".to_string(),
        "app.js: no critical issues".to_string(),
        "Overall: nothing severe".to_string(),
        "feat(todo): add todo app skeleton".to_string(),
        "## Summary\nInitial todo app".to_string(),
        "keep the flat layout".to_string(),
        "add jest tests".to_string(),
    ]));

    let engine = WorkflowEngine::new()
        .register(Arc::new(PlannerAgent::new(Arc::clone(&client), "mock")))
        .register(Arc::new(CoderAgent::new(
            Arc::clone(&client),
            "mock",
            workspace.clone(),
        )))
        .register(Arc::new(CodeReaderAgent::new(workspace.clone())))
        .register(Arc::new(BugFixerAgent::new(
            Arc::clone(&client),
            "mock",
            workspace.clone(),
        )))
        .register(Arc::new(PrGeneratorAgent::new(Arc::clone(&client), "mock")))
        .register(Arc::new(ArchitectAgent::new(
            Arc::clone(&client),
            "mock",
            workspace.clone(),
        )));

    let state = engine.run("build a todo app", Context::new()).await.unwrap();

    // 固定流水线顺序，每个智能体恰好完成一次
    assert_eq!(state.completed, BUILD_PIPELINE.to_vec());
    for agent in BUILD_PIPELINE {
        let result = &state.results[agent.as_str()];
        assert!(
            matches!(result.status, AgentStatus::Completed),
            "{} should complete",
            agent
        );
    }
    // coder 真实落盘，下游智能体读到同一工作区
    assert!(workspace.read_file("app.js").unwrap().contains("TodoApp"));
    assert_eq!(
        state.context.published(AgentName::Coder, "files_written").unwrap(),
        &serde_json::json!(["app.js"])
    );
}

/// 每次调用都抛传输错误的智能体
struct BrokenAgent;

#[async_trait]
impl Agent for BrokenAgent {
    fn name(&self) -> AgentName {
        AgentName::BugFixer
    }

    async fn execute(
        &self,
        _task: &str,
        _context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        Err(AgentError::Llm(LlmError::Timeout))
    }
}

#[tokio::test]
async fn test_failing_agent_is_isolated_and_run_still_returns() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path()).unwrap();
    let engine = WorkflowEngine::new()
        .register(Arc::new(BrokenAgent))
        .register(Arc::new(CodeReaderAgent::new(workspace)));

    let state = engine.run("fix the login bug", Context::new()).await.unwrap();

    // 失败智能体的槽位带 error，且被计入 completed，运行继续走到默认规则
    let failed = &state.results["bug_fixer"];
    assert!(matches!(failed.status, AgentStatus::Failed));
    assert!(failed.error.is_some());
    assert_eq!(
        state.completed,
        vec![AgentName::BugFixer, AgentName::CodeReader]
    );
}

#[tokio::test]
async fn test_cache_returns_identical_text_without_second_call() {
    let dir = tempfile::tempdir().unwrap();
    let inner = Arc::new(MockLlmClient::new());
    let counting = Arc::clone(&inner);
    let client = ReliableLlmClient::new(
        inner,
        ResponseCache::with_default_ttl(dir.path()),
        CircuitBreaker::default(),
        fast_retry(),
    );

    let request = ChatRequest::new(vec![Message::user("same question")], "mock");
    let first = client.chat(&request).await.unwrap();
    let second = client.chat(&request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(counting.call_count(), 1);
}

#[tokio::test]
async fn test_disabled_cache_issues_one_call_per_request() {
    let dir = tempfile::tempdir().unwrap();
    let inner = Arc::new(MockLlmClient::new());
    let counting = Arc::clone(&inner);
    let client = ReliableLlmClient::new(
        inner,
        ResponseCache::new(dir.path(), Duration::from_secs(3600), false),
        CircuitBreaker::default(),
        fast_retry(),
    );

    let request = ChatRequest::new(vec![Message::user("same question")], "mock");
    client.chat(&request).await.unwrap();
    client.chat(&request).await.unwrap();

    assert_eq!(counting.call_count(), 2);
}
