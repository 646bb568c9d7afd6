//! Forge - 多智能体代码工作流编排器
//!
//! 模块划分：
//! - **agents**: 八个智能体（planner / coder / code_reader / bug_fixer / refactorer / tester / pr_generator / architect）与统一执行契约
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **github**: GitHub REST 轻量客户端（开 PR / 建仓）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / OpenRouter / Mock）
//! - **observability**: tracing 初始化与指标计数器
//! - **reliability**: 远程调用可靠性层（缓存 / 熔断 / 重试）
//! - **workflow**: 路由器、执行状态与步进引擎
//! - **workspace**: 智能体文件读写的受限根目录

pub mod agents;
pub mod config;
pub mod github;
pub mod llm;
pub mod observability;
pub mod reliability;
pub mod workflow;
pub mod workspace;
