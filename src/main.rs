//! Forge - 多智能体代码工作流编排器
//!
//! 入口：解析 CLI 参数、初始化日志与配置、装配可靠性层与八个智能体，
//! 驱动一次工作流运行并打印各智能体结果。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as AnyhowContext;
use clap::Parser;
use serde_json::Value;

use forge::agents::{
    ArchitectAgent, BugFixerAgent, CodeReaderAgent, CoderAgent, Context, PlannerAgent,
    PrGeneratorAgent, RefactorerAgent, TesterAgent,
};
use forge::agents::pr_generator::PrTarget;
use forge::config::load_config;
use forge::github::GitHubClient;
use forge::llm::{create_openrouter_client, LlmClient, OpenAiClient};
use forge::observability::Metrics;
use forge::reliability::{CircuitBreaker, ReliableLlmClient, ResponseCache};
use forge::workflow::{ExecutionState, WorkflowEngine};
use forge::workspace::Workspace;

#[derive(Parser, Debug)]
#[command(name = "forge", about = "Multi-agent AI system for code tasks")]
struct Cli {
    /// Task to perform (e.g. "analyze codebase", "fix bugs", "refactor code")
    task: String,

    /// Specific file to work on
    #[arg(long)]
    file: Option<String>,

    /// Additional context as a JSON object string
    #[arg(long)]
    context: Option<String>,

    /// Output file for the final state (JSON)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Extra config file layered over config/default.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

fn build_initial_context(cli: &Cli) -> Context {
    let mut context = Context::new();
    if let Some(file) = &cli.file {
        context.insert("file_path", file.as_str());
    }
    if let Some(raw) = &cli.context {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                for (key, value) in map {
                    context.insert(key, value);
                }
            }
            _ => eprintln!("Warning: invalid JSON context, ignoring it."),
        }
    }
    context
}

fn print_section(title: &str, value: &Value) {
    if let Some(text) = value.as_str() {
        println!("\n{title}:\n{text}");
    } else {
        println!("\n{title}:\n{value}");
    }
}

fn print_results(state: &ExecutionState) {
    println!("\n{}", "=".repeat(80));
    println!("RESULTS");
    println!("{}", "=".repeat(80));

    for agent in &state.completed {
        let Some(result) = state.results.get(agent.as_str()) else {
            continue;
        };
        println!("\n[{}]", agent.as_str().to_uppercase());
        println!("{}", "-".repeat(80));
        println!("Status: {:?}", result.status);
        if let Some(error) = &result.error {
            println!("Error: {error}");
        }

        for (key, title) in [
            ("plan_markdown", "Plan"),
            ("summary", "Summary"),
            ("fixed_code", "Fixed Code"),
            ("files_written", "Files Written"),
            ("test_code", "Test Code"),
            ("test_results", "Test Results"),
            ("structure_suggestions", "Structure Suggestions"),
            ("best_practices", "Best Practices"),
        ] {
            if let Some(value) = result.field(key) {
                print_section(title, value);
            }
        }
        if let Some(inner) = result.field("result").and_then(|v| v.as_object()) {
            if let Some(msg) = inner.get("commit_message") {
                print_section("Commit Message", msg);
            }
            if let Some(desc) = inner.get("pr_description") {
                print_section("PR Description", desc);
            }
            if let Some(code) = inner.get("refactored_code") {
                print_section("Refactored Code", code);
            }
        }
        if let Some(url) = result.field("pr_url") {
            print_section("Pull Request", url);
        }
    }

    println!("\n{}", "=".repeat(80));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    forge::observability::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.clone()).context("Failed to load config")?;

    let workspace_root = config
        .app
        .workspace_root
        .clone()
        .unwrap_or_else(|| PathBuf::from("workspace"));
    let workspace =
        Workspace::new(&workspace_root).context("Failed to prepare workspace root")?;

    // 原始客户端按 provider 选择，统一套可靠性层
    let request_timeout = std::time::Duration::from_secs(config.llm.timeouts.request);
    let raw: Arc<dyn LlmClient> = if config.llm.provider == "openai" {
        Arc::new(OpenAiClient::with_timeout(
            config.llm.base_url.as_deref(),
            None,
            request_timeout,
        ))
    } else {
        Arc::new(create_openrouter_client(
            config.llm.base_url.as_deref(),
            request_timeout,
        ))
    };
    let cache_dir = config
        .cache
        .dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(".cache/llm"));
    let cache = ResponseCache::new(
        &cache_dir,
        std::time::Duration::from_secs(config.cache.ttl_secs),
        config.cache.enabled,
    );
    let breaker = CircuitBreaker::new(
        config.breaker.failure_threshold,
        std::time::Duration::from_secs(config.breaker.recovery_timeout_secs),
    );
    let metrics = Arc::new(Metrics::new());
    let client: Arc<dyn LlmClient> = Arc::new(
        ReliableLlmClient::new(raw, cache, breaker, config.retry.to_policy())
            .with_metrics(Arc::clone(&metrics)),
    );

    let model = config.llm.model.clone();
    let mut pr_generator = PrGeneratorAgent::new(Arc::clone(&client), &model);
    if let Some(repo) = &config.github.repo {
        let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
        if token.is_empty() {
            tracing::warn!("github repo configured but GITHUB_TOKEN is empty, PR creation disabled");
        } else {
            let github = GitHubClient::new(token)
                .context("Failed to build GitHub client")?
                .with_retry(config.retry.to_policy());
            pr_generator = pr_generator.with_github(
                github,
                PrTarget {
                    repo: repo.clone(),
                    base_branch: config.github.base_branch.clone(),
                },
            );
        }
    }

    let engine = WorkflowEngine::new()
        .with_metrics(Arc::clone(&metrics))
        .register(Arc::new(PlannerAgent::new(Arc::clone(&client), &model)))
        .register(Arc::new(CoderAgent::new(
            Arc::clone(&client),
            &model,
            workspace.clone(),
        )))
        .register(Arc::new(CodeReaderAgent::new(workspace.clone())))
        .register(Arc::new(BugFixerAgent::new(
            Arc::clone(&client),
            &model,
            workspace.clone(),
        )))
        .register(Arc::new(RefactorerAgent::new(
            Arc::clone(&client),
            &model,
            workspace.clone(),
        )))
        .register(Arc::new(TesterAgent::new(
            Arc::clone(&client),
            &model,
            workspace.clone(),
        )))
        .register(Arc::new(pr_generator))
        .register(Arc::new(ArchitectAgent::new(
            Arc::clone(&client),
            &model,
            workspace,
        )));

    let initial_context = build_initial_context(&cli);
    let state = engine
        .run(cli.task.clone(), initial_context)
        .await
        .context("Workflow run failed")?;

    print_results(&state);

    let (prompt, completion, total) = client.token_usage();
    let snap = metrics.snapshot();
    tracing::info!(
        completed = ?state.completed,
        prompt_tokens = prompt,
        completion_tokens = completion,
        total_tokens = total,
        llm_requests = snap.llm_requests,
        cache_hits = snap.cache_hits,
        "workflow completed"
    );

    if let Some(output) = &cli.output {
        let json = serde_json::to_string_pretty(&state)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write results to {}", output.display()))?;
        println!("\nResults saved to {}", output.display());
    }

    Ok(())
}
