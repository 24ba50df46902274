//! Agent 错误类型
//!
//! 路由、解析、工具、压缩四类失败都在各自组件内降级处理；
//! 只有补全服务本身不可用（传输错误 / 超时）会作为终止错误返回给调用方。
//! 推理循环中途失败时，错误携带本轮已产生的审计记录，调用方仍可持久化。

use thiserror::Error;

use crate::memory::TurnRecord;

/// 编排核心运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 补全服务传输失败
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM request timed out after {0}s")]
    LlmTimeout(u64),

    /// 推理循环中补全服务失败；record 为截至失败时的完整轮次记录
    #[error("{cause}")]
    TurnAborted {
        cause: Box<AgentError>,
        record: Box<TurnRecord>,
    },

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 会话 / 审计存储写入或读取失败
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl AgentError {
    /// 是否为补全服务层面的失败（传输 / 超时）
    pub fn is_completion_failure(&self) -> bool {
        match self {
            AgentError::LlmUnavailable(_) | AgentError::LlmTimeout(_) => true,
            AgentError::TurnAborted { cause, .. } => cause.is_completion_failure(),
            _ => false,
        }
    }

    /// 中途失败的轮次记录（仅 TurnAborted 携带）
    pub fn partial_record(&self) -> Option<&TurnRecord> {
        match self {
            AgentError::TurnAborted { record, .. } => Some(record),
            _ => None,
        }
    }
}

impl From<crate::llm::LlmError> for AgentError {
    fn from(err: crate::llm::LlmError) -> Self {
        match err {
            crate::llm::LlmError::Timeout(secs) => AgentError::LlmTimeout(secs),
            other => AgentError::LlmUnavailable(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Persistence(err.to_string())
    }
}
