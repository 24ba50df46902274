//! 记忆层：对话消息、token 估算、上下文压缩、会话持久化

pub mod compressor;
pub mod conversation;
pub mod session_store;
pub mod token_budget;

pub use compressor::{CompressionConfig, ContextCompressor};
pub use conversation::{last_user_message, truncate_chars, Message, Role};
pub use session_store::{
    InMemorySessionStore, JsonFileSessionStore, SessionStore, TokenUsageDelta, TurnRecord,
};
pub use token_budget::TokenEstimator;
