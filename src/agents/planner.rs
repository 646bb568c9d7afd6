//! 需求规划智能体
//!
//! 将自然语言任务 + 可选需求文本转成 markdown 实施计划，发布 planner.plan_markdown 供 coder 消费。

use async_trait::async_trait;
use std::sync::Arc;

use crate::agents::{
    Agent, AgentError, AgentName, AgentResult, AgentStatus, Context, LlmHelper,
};
use crate::llm::LlmClient;

pub struct PlannerAgent {
    llm: LlmHelper,
}

impl PlannerAgent {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm: LlmHelper::new(client, AgentName::Planner, model),
        }
    }

    fn build_prompt(task: &str, requirements_text: &str) -> String {
        format!(
            "The user wants an application defined by:\n\n\
             High-level task:\n{task}\n\n\
             Detailed requirements file (if provided):\n{requirements}\n\n\
             The workspace directory contains (or will contain) the target project.\n\n\
             Please produce:\n\
             1. A short problem statement.\n\
             2. A list of user stories.\n\
             3. A feature list for the first version (MVP).\n\
             4. A file/module plan (paths and responsibilities) to implement the MVP.\n\
             5. A rough testing strategy (what to test and where tests should live).\n\n\
             Return the plan in clear markdown sections.",
            task = task,
            requirements = if requirements_text.is_empty() {
                "[no external requirements file provided]"
            } else {
                requirements_text
            },
        )
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> AgentName {
        AgentName::Planner
    }

    async fn execute(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<AgentResult, AgentError> {
        let requirements = context
            .get_str("requirements_text")
            .unwrap_or("")
            .trim()
            .to_string();

        let prompt = Self::build_prompt(task, &requirements);
        let plan = self.llm.call(&prompt, context).await?;

        context.publish(AgentName::Planner, "plan_markdown", plan.clone());

        Ok(AgentResult::new(AgentName::Planner, AgentStatus::Completed)
            .with_field("task", task)
            .with_field("plan_markdown", plan))
    }
}
