//! 核心编排层：错误类型、编排图与构建器

pub mod builder;
pub mod error;
pub mod graph;

pub use builder::GraphBuilder;
pub use error::AgentError;
pub use graph::{GraphNode, OrchestrationGraph, TurnOutput, FALLBACK_RESPONSE};
