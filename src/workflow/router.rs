//! 路由器
//!
//! 纯函数：按固定优先级把任务文本映射到下一个智能体。
//! 规则顺序即语义，关键词表有重叠（如同时出现 refactor 与 fix），
//! 先命中的规则生效，不做打分。

use crate::agents::AgentName;
use crate::workflow::state::{ExecutionState, NextAction};

/// 构建类意图关键词：命中即走固定流水线
const BUILD_KEYWORDS: [&str; 4] = ["build", "create", "app", "feature"];

/// 构建流水线的固定顺序
pub const BUILD_PIPELINE: [AgentName; 6] = [
    AgentName::Planner,
    AgentName::Coder,
    AgentName::CodeReader,
    AgentName::BugFixer,
    AgentName::PrGenerator,
    AgentName::Architect,
];

/// 单智能体关键词规则，按声明顺序逐条检查
const KEYWORD_RULES: [(&[&str], AgentName); 6] = [
    (&["read", "analyze", "understand"], AgentName::CodeReader),
    (&["bug", "fix", "error"], AgentName::BugFixer),
    (&["refactor", "improve", "clean"], AgentName::Refactorer),
    (&["test", "testcase"], AgentName::Tester),
    (
        &["architecture", "structure", "suggest"],
        AgentName::Architect,
    ),
    (&["pr", "pull request", "commit"], AgentName::PrGenerator),
];

fn contains_any(task: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| task.contains(k))
}

/// 决定下一步：只读取状态，不做任何修改
pub fn route(state: &ExecutionState) -> NextAction {
    let task = state.task.to_lowercase();

    // 1. 构建类意图：固定流水线，取第一个尚未完成的
    if contains_any(&task, &BUILD_KEYWORDS) {
        return BUILD_PIPELINE
            .iter()
            .find(|agent| !state.is_completed(**agent))
            .map(|agent| NextAction::Run(*agent))
            .unwrap_or(NextAction::End);
    }

    // 2. 单智能体关键词，按序检查且跳过已完成者
    for (keywords, agent) in KEYWORD_RULES {
        if contains_any(&task, keywords) && !state.is_completed(agent) {
            return NextAction::Run(agent);
        }
    }

    // 3. 默认先读代码
    if !state.is_completed(AgentName::CodeReader) {
        return NextAction::Run(AgentName::CodeReader);
    }

    NextAction::End
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentResult, AgentStatus, Context};

    fn state(task: &str) -> ExecutionState {
        ExecutionState::new(task, Context::new())
    }

    fn mark_completed(state: &mut ExecutionState, agent: AgentName) {
        state.record(agent, AgentResult::new(agent, AgentStatus::Completed));
    }

    #[test]
    fn test_build_intent_walks_pipeline_in_order() {
        let mut s = state("build a todo app");
        for expected in BUILD_PIPELINE {
            assert_eq!(route(&s), NextAction::Run(expected));
            mark_completed(&mut s, expected);
        }
        assert_eq!(route(&s), NextAction::End);
    }

    #[test]
    fn test_analyze_routes_to_code_reader_then_ends() {
        let mut s = state("analyze the codebase");
        assert_eq!(route(&s), NextAction::Run(AgentName::CodeReader));
        mark_completed(&mut s, AgentName::CodeReader);
        assert_eq!(route(&s), NextAction::End);
    }

    #[test]
    fn test_keyword_rule_order_breaks_ties() {
        // refactor 与 fix 同时出现时 bug_fixer 规则在前
        let s = state("fix and refactor the parser");
        assert_eq!(route(&s), NextAction::Run(AgentName::BugFixer));
    }

    #[test]
    fn test_completed_agent_falls_through_to_next_rule() {
        let mut s = state("fix and refactor the parser");
        mark_completed(&mut s, AgentName::BugFixer);
        assert_eq!(route(&s), NextAction::Run(AgentName::Refactorer));
    }

    #[test]
    fn test_test_keyword_routes_to_tester_before_architect() {
        // tester 规则排在 architect 之前
        let mut s = state("write tests and suggest structure");
        assert_eq!(route(&s), NextAction::Run(AgentName::Tester));
        mark_completed(&mut s, AgentName::Tester);
        assert_eq!(route(&s), NextAction::Run(AgentName::Architect));
    }

    #[test]
    fn test_unrecognized_task_defaults_to_code_reader() {
        let mut s = state("hello there");
        assert_eq!(route(&s), NextAction::Run(AgentName::CodeReader));
        mark_completed(&mut s, AgentName::CodeReader);
        assert_eq!(route(&s), NextAction::End);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let s = state("BUILD a Feature");
        assert_eq!(route(&s), NextAction::Run(AgentName::Planner));
    }
}
