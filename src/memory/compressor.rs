//! 上下文压缩：对话超出 token 预算时把较早的消息摘要成一条 system 消息
//!
//! 1. 估算全部消息的 token 数，预算内或消息数不超过 keep_recent 时原样返回；
//! 2. 否则最早的 `len - keep_recent` 条（每条截断到 message_max_chars）交给 LLM 摘要一次；
//! 3. 输出 `[摘要 system 消息] + 最近 keep_recent 条原始消息`。
//!
//! keep_recent 至少按 1 计算，本轮的 user 问题永远不会被折进摘要。
//!
//! 摘要调用失败时退回占位摘要，压缩永远不会让本轮失败。

use std::sync::Arc;
use std::time::Duration;

use crate::llm::{complete_with_timeout, LlmClient};
use crate::memory::{truncate_chars, Message, Role, TokenEstimator};

/// 摘要消息前缀，用于识别已压缩过的上下文
pub const SUMMARY_PREFIX: &str = "[Conversation summary of";

/// 压缩配置
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// 触发压缩的 token 预算
    pub token_budget: usize,
    /// 原样保留的最近消息条数
    pub keep_recent: usize,
    /// 写入摘要 prompt 前每条消息的字符上限
    pub message_max_chars: usize,
    pub request_timeout_secs: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            token_budget: 6000,
            keep_recent: 4,
            message_max_chars: 500,
            request_timeout_secs: 60,
        }
    }
}

/// 上下文压缩器
pub struct ContextCompressor {
    llm: Arc<dyn LlmClient>,
    config: CompressionConfig,
}

impl ContextCompressor {
    pub fn new(llm: Arc<dyn LlmClient>, config: CompressionConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// 旧段与最近段的分界：至少保留 1 条，且最近一条 user 消息（本轮问题）总在最近段内
    fn split_point(&self, messages: &[Message]) -> usize {
        let keep = self.config.keep_recent.max(1);
        let split = messages.len().saturating_sub(keep);
        match messages.iter().rposition(|m| m.role == Role::User) {
            Some(question) => split.min(question),
            None => split,
        }
    }

    /// 是否需要压缩：超预算，且除摘要外还有可折叠的旧消息
    pub fn needs_compression(&self, messages: &[Message]) -> bool {
        let split = self.split_point(messages);
        if split == 0 {
            return false;
        }
        if TokenEstimator::estimate_messages(messages) <= self.config.token_budget {
            return false;
        }
        let old = &messages[..split];
        // 旧段只剩上一次的摘要，再摘要一次不会缩短任何东西
        !(old.len() == 1 && is_summary(&old[0]))
    }

    /// 压缩消息序列；不需要压缩时原样返回
    pub async fn compress(&self, messages: &[Message]) -> Vec<Message> {
        if !self.needs_compression(messages) {
            return messages.to_vec();
        }

        let split = self.split_point(messages);
        let (old, recent) = messages.split_at(split);

        tracing::info!(
            old_count = old.len(),
            recent_count = recent.len(),
            estimated_tokens = TokenEstimator::estimate_messages(messages),
            budget = self.config.token_budget,
            "compressing conversation history"
        );

        let summary = match self.summarize(old).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("summary was empty, using placeholder");
                placeholder_summary(old.len())
            }
            Err(e) => {
                tracing::warn!(error = %e, "summarization failed, using placeholder");
                placeholder_summary(old.len())
            }
        };

        let mut compacted = Vec::with_capacity(recent.len() + 1);
        compacted.push(Message::system(format!(
            "{} {} earlier messages]\n{}",
            SUMMARY_PREFIX,
            old.len(),
            summary
        )));
        compacted.extend_from_slice(recent);
        compacted
    }

    async fn summarize(&self, old: &[Message]) -> Result<String, crate::llm::LlmError> {
        let transcript = format_messages_for_summary(old, self.config.message_max_chars);
        let prompt = vec![
            Message::system(
                "You compress conversation history. Summarize the conversation below concisely, \
                 preserving key facts, decisions, tool results and open questions needed to continue. \
                 Reply with plain prose only.",
            ),
            Message::user(transcript),
        ];
        complete_with_timeout(
            self.llm.as_ref(),
            &prompt,
            None,
            Duration::from_secs(self.config.request_timeout_secs),
        )
        .await
    }
}

/// 摘要失败时的占位文本
pub fn placeholder_summary(count: usize) -> String {
    format!("(earlier conversation with {} messages)", count)
}

fn is_summary(msg: &Message) -> bool {
    msg.role == Role::System && msg.content.starts_with(SUMMARY_PREFIX)
}

/// 渲染为 "Role: content" 行，每条截断
fn format_messages_for_summary(messages: &[Message], max_chars: usize) -> String {
    let mut buf = String::with_capacity(messages.len() * (max_chars + 16));
    for msg in messages {
        let label = match msg.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        buf.push_str(label);
        buf.push_str(": ");
        buf.push_str(&truncate_chars(&msg.content, max_chars));
        buf.push('\n');
    }
    buf
}
