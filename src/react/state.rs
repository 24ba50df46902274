//! 单轮共享状态：消息、路由提示、推理轨迹
//!
//! 每个用户轮次新建一份 ConversationState（上一轮持久化的 messages + 空轨迹），
//! 按 Router -> ReasoningLoop 的固定顺序被修改，交给会话存储后丢弃。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{last_user_message, Message};
use crate::router::Domain;

/// 推理步骤内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// 推理说明，无副作用
    Think { content: String },
    /// 工具调用（尚无结果）
    Act { tool: String, args: Value },
    /// 工具返回文本，可能是错误信息
    Observe {
        tool: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    /// 本轮最终回复
    Answer { content: String },
}

/// 带时间戳的推理步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    #[serde(flatten)]
    pub kind: StepKind,
    pub timestamp: DateTime<Utc>,
}

impl ReasoningStep {
    fn now(kind: StepKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn think(content: impl Into<String>) -> Self {
        Self::now(StepKind::Think {
            content: content.into(),
        })
    }

    pub fn act(tool: impl Into<String>, args: Value) -> Self {
        Self::now(StepKind::Act {
            tool: tool.into(),
            args,
        })
    }

    pub fn observe(tool: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::now(StepKind::Observe {
            tool: tool.into(),
            content: content.into(),
            is_error,
        })
    }

    pub fn answer(content: impl Into<String>) -> Self {
        Self::now(StepKind::Answer {
            content: content.into(),
        })
    }

    pub fn is_answer(&self) -> bool {
        matches!(self.kind, StepKind::Answer { .. })
    }

    /// 短标签，用于日志与轨迹打印
    pub fn label(&self) -> &'static str {
        match self.kind {
            StepKind::Think { .. } => "think",
            StepKind::Act { .. } => "act",
            StepKind::Observe { .. } => "observe",
            StepKind::Answer { .. } => "answer",
        }
    }
}

/// 推理循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Iterating,
    /// 模型显式给出回复
    Answered,
    /// 迭代预算耗尽，回复由最近的 observation 合成
    Exhausted,
    /// 补全服务中途失败，回复为错误说明
    Failed,
}

/// 路由提示（固定字段，替代任意键值的 context）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterHints {
    pub primary_domain: Domain,
    pub secondary_domains: Vec<Domain>,
    pub rationale: String,
}

impl Default for RouterHints {
    fn default() -> Self {
        Self {
            primary_domain: Domain::Fallback,
            secondary_domains: Vec::new(),
            rationale: String::new(),
        }
    }
}

/// 单轮对话状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// 只追加的对话消息
    pub messages: Vec<Message>,
    /// 当前负责本轮的领域目的地（如 `erp_agent`）
    pub current_agent: String,
    /// 本轮已执行的工具调用次数（与循环迭代计数相互独立）
    pub tool_call_count: usize,
    /// 最近一次路由 / 推理的置信度（0.0 - 1.0）
    pub confidence: f32,
    pub context: RouterHints,
    /// 只追加的推理轨迹，轮次开始时为空
    pub reasoning_trace: Vec<ReasoningStep>,
    pub session_id: Option<String>,
}

impl ConversationState {
    /// 用上一轮的消息历史 + 新的用户输入构建本轮状态
    pub fn new_turn(
        history: Vec<Message>,
        user_input: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        let mut messages = history;
        messages.push(Message::user(user_input));
        Self {
            messages,
            current_agent: Domain::Fallback.agent_id(),
            tool_call_count: 0,
            confidence: 0.0,
            context: RouterHints::default(),
            reasoning_trace: Vec::new(),
            session_id,
        }
    }

    /// 本轮的用户问题（最近一条 user 消息）
    pub fn question(&self) -> &str {
        last_user_message(&self.messages).unwrap_or_default()
    }

    /// 追加步骤；时间戳不早于上一步，保证轨迹单调
    pub fn push_step(&mut self, mut step: ReasoningStep) {
        if let Some(last) = self.reasoning_trace.last() {
            if step.timestamp < last.timestamp {
                step.timestamp = last.timestamp;
            }
        }
        tracing::trace!(step = step.label(), "trace step");
        self.reasoning_trace.push(step);
    }

    /// 最终回复（轨迹末尾的 answer 步骤）
    pub fn final_answer(&self) -> Option<&str> {
        self.reasoning_trace.iter().rev().find_map(|s| match &s.kind {
            StepKind::Answer { content } => Some(content.as_str()),
            _ => None,
        })
    }
}
