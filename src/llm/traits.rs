//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（自由文本）、complete_structured（附带输出形状约束）。
//! 核心从不假设后端真的遵守了形状约束，解析失败由调用方降级处理。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::OutputSchema;
use crate::memory::{Message, Role};

/// 补全服务传输层错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// LLM 客户端 trait：进程级共享、只读，由路由器 / 推理循环 / 压缩器共同持有
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回原始文本
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 带输出形状约束的完成
    ///
    /// 默认实现把 JSON Schema 拼进 system 提示后调用 complete；支持原生结构化输出的后端可覆盖。
    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<String, LlmError> {
        let constrained = inject_schema(messages, schema);
        self.complete(&constrained).await
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 把形状约束追加到首条 system 消息（没有则插入一条）
pub fn inject_schema(messages: &[Message], schema: &OutputSchema) -> Vec<Message> {
    let instruction = schema.instruction();
    let mut out = messages.to_vec();
    match out.iter_mut().find(|m| m.role == Role::System) {
        Some(system) => {
            system.content.push_str("\n\n");
            system.content.push_str(&instruction);
        }
        None => out.insert(0, Message::system(instruction)),
    }
    out
}

/// 在超时内执行一次补全；schema 为 None 时走自由文本
pub async fn complete_with_timeout(
    llm: &dyn LlmClient,
    messages: &[Message],
    schema: Option<&OutputSchema>,
    timeout: Duration,
) -> Result<String, LlmError> {
    let call = async {
        match schema {
            Some(s) => llm.complete_structured(messages, s).await,
            None => llm.complete(messages).await,
        }
    };
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(timeout.as_secs())),
    }
}
