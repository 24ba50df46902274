//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 按顺序回放预设回复；队列耗尽后若设置了 fallback 则一直返回它，
//! 否则把最后一条 user 消息包装成 answer 决策回显，便于本地跑通整条编排链路。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{last_user_message, Message};

/// 预设回复：成功文本或传输失败
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(String),
}

/// Mock 客户端：可脚本化、可计数、记录每次收到的 prompt
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次回放给定文本
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        for r in responses {
            client.push_text(r);
        }
        client
    }

    /// 每次都返回同一段文本
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn push_text(&self, text: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(MockReply::Text(text.into()));
        }
    }

    pub fn push_failure(&self, reason: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(MockReply::Fail(reason.into()));
        }
    }

    /// 已发生的补全调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用收到的完整消息列表（按调用顺序）
    pub fn recorded_prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_reply(&self) -> Option<MockReply> {
        self.replies.lock().ok().and_then(|mut q| q.pop_front())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push(messages.to_vec());
        }

        match self.next_reply() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(reason)) => Err(LlmError::ApiError(reason)),
            None => match &self.fallback {
                Some(text) => Ok(text.clone()),
                None => {
                    let last_user = last_user_message(messages).unwrap_or("(no input)");
                    Ok(serde_json::json!({
                        "reasoning": "mock client echoes the request",
                        "action": "answer",
                        "response": format!("Echo from Mock: {}", last_user),
                    })
                    .to_string())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_fallback() {
        let client = MockLlmClient::with_responses(["a", "b"]);
        assert_eq!(client.complete(&[]).await.unwrap(), "a");
        assert_eq!(client.complete(&[]).await.unwrap(), "b");
        let echoed = client.complete(&[Message::user("hi")]).await.unwrap();
        assert!(echoed.contains("Echo from Mock: hi"));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failure_is_returned_once() {
        let client = MockLlmClient::always("ok");
        client.push_failure("boom");
        assert!(client.complete(&[]).await.is_err());
        assert_eq!(client.complete(&[]).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_records_prompts() {
        let client = MockLlmClient::always("ok");
        client.complete(&[Message::user("q1")]).await.unwrap();
        let prompts = client.recorded_prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0][0].content, "q1");
    }
}
