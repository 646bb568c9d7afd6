//! 执行状态
//!
//! 一次运行共享的唯一可变记录：任务文本、共享上下文、各智能体结果、
//! 完成顺序与下一步动作。completed 里的每个名字在 results 中必有条目。

use std::collections::HashMap;

use serde::Serialize;

use crate::agents::{AgentName, AgentResult, Context};

/// 路由器产出的下一步动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Run(AgentName),
    End,
}

#[derive(Debug, Serialize)]
pub struct ExecutionState {
    pub task: String,
    pub context: Context,
    pub results: HashMap<String, AgentResult>,
    pub completed: Vec<AgentName>,
    #[serde(skip)]
    pub next_action: NextAction,
}

impl ExecutionState {
    pub fn new(task: impl Into<String>, context: Context) -> Self {
        Self {
            task: task.into(),
            context,
            results: HashMap::new(),
            completed: Vec::new(),
            next_action: NextAction::End,
        }
    }

    pub fn is_completed(&self, agent: AgentName) -> bool {
        self.completed.contains(&agent)
    }

    /// 记录一个结果并把智能体标记为已完成（失败结果同样标记，保证终止）
    pub fn record(&mut self, agent: AgentName, result: AgentResult) {
        self.results.insert(agent.as_str().to_string(), result);
        if !self.is_completed(agent) {
            self.completed.push(agent);
        }
    }

    pub fn result_of(&self, agent: AgentName) -> Option<&AgentResult> {
        self.results.get(agent.as_str())
    }
}
