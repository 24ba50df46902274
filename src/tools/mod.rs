//! 工具层：注册表、调度器与内置的知识库检索工具

pub mod dispatcher;
pub mod knowledge;
pub mod registry;

pub use dispatcher::{
    tool_error_message, tool_not_found_message, DispatchOutcome, Observation, ToolDispatcher,
};
pub use knowledge::{
    InMemoryKnowledgeBase, KnowledgeBase, KnowledgeDoc, KnowledgeHit, KnowledgeSearchTool,
};
pub use registry::{Tool, ToolListing, ToolRegistry, ToolTier};
