//! 工作流编排
//!
//! 路由器 + 执行状态 + 步进引擎

pub mod engine;
pub mod router;
pub mod state;

pub use engine::{WorkflowEngine, WorkflowError};
pub use router::{route, BUILD_PIPELINE};
pub use state::{ExecutionState, NextAction};
