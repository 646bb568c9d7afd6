//! 工作流引擎
//!
//! 步进循环：反复调用路由器，分发到对应智能体节点，把节点输出合并回
//! 共享状态，直到路由器给出终止信号。每个节点自带重试隔离：单个智能体
//! 的意外失败被就地捕获为错误结果，不会中断整次运行。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::agents::{Agent, AgentName, AgentResult, AgentStatus, Context};
use crate::observability::Metrics;
use crate::workflow::router::route;
use crate::workflow::state::{ExecutionState, NextAction};

/// 每个节点的最大尝试次数
const NODE_ATTEMPTS: u32 = 3;

/// 运行级致命错误（编程错误类，不做重试）
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("router selected unregistered agent: {0}")]
    AgentNotRegistered(AgentName),
}

/// 工作流引擎
pub struct WorkflowEngine {
    nodes: HashMap<AgentName, Arc<dyn Agent>>,
    metrics: Arc<Metrics>,
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 注册一个智能体节点，按其自报名称索引
    pub fn register(mut self, agent: Arc<dyn Agent>) -> Self {
        self.nodes.insert(agent.name(), agent);
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// 驱动一次完整运行；业务失败被隔离在节点内，只有路由到未注册
    /// 智能体才作为致命错误返回
    pub async fn run(
        &self,
        task: impl Into<String>,
        initial_context: Context,
    ) -> Result<ExecutionState, WorkflowError> {
        let task = task.into();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut state = ExecutionState::new(task.clone(), initial_context);
        let run_start = Instant::now();

        self.metrics.run_started();
        tracing::info!(run_id = %run_id, task = %state.task, "workflow run started");

        loop {
            let action = route(&state);
            state.next_action = action;
            let agent_name = match action {
                NextAction::End => break,
                NextAction::Run(name) => name,
            };
            let node = self
                .nodes
                .get(&agent_name)
                .ok_or(WorkflowError::AgentNotRegistered(agent_name))?;

            let result = self.run_node(agent_name, node.as_ref(), &mut state).await;
            state.record(agent_name, result);
        }

        self.metrics.run_finished();
        tracing::info!(
            run_id = %run_id,
            task = %state.task,
            completed = ?state.completed,
            duration_ms = run_start.elapsed().as_millis() as u64,
            "workflow run finished"
        );
        Ok(state)
    }

    /// 节点包装：事件 + 计时 + 计数 + 重试隔离。
    /// 每次尝试在上下文副本上执行，成功才把副本写回共享状态，
    /// 保证尝试之间没有状态残留；重试耗尽则落一个仅含错误的结果。
    async fn run_node(
        &self,
        agent_name: AgentName,
        node: &dyn Agent,
        state: &mut ExecutionState,
    ) -> AgentResult {
        self.metrics.agent_started();
        tracing::info!(agent = %agent_name, "agent started");
        let start = Instant::now();

        let mut last_error = String::new();
        for attempt in 1..=NODE_ATTEMPTS {
            let mut scratch = state.context.clone();
            match node.execute(&state.task, &mut scratch).await {
                Ok(result) => {
                    state.context = scratch;
                    let duration_ms = start.elapsed().as_millis() as u64;
                    match result.status {
                        AgentStatus::Failed => {
                            self.metrics.agent_failed();
                            tracing::warn!(
                                agent = %agent_name,
                                duration_ms,
                                error = result.error.as_deref().unwrap_or(""),
                                "agent reported failure"
                            );
                        }
                        _ => {
                            self.metrics.agent_succeeded();
                            tracing::info!(agent = %agent_name, duration_ms, "agent finished");
                        }
                    }
                    return result;
                }
                Err(err) => {
                    last_error = err.to_string();
                    tracing::warn!(
                        agent = %agent_name,
                        attempt,
                        max_attempts = NODE_ATTEMPTS,
                        error = %last_error,
                        "agent attempt failed"
                    );
                }
            }
        }

        self.metrics.agent_failed();
        tracing::error!(
            agent = %agent_name,
            duration_ms = start.elapsed().as_millis() as u64,
            error = %last_error,
            "agent exhausted retries"
        );
        AgentResult::from_error(agent_name, last_error)
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}
