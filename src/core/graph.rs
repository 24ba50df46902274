//! 编排图：一轮对话的可调用单元
//!
//! Compress -> Router -> (ReasoningLoop | Fallback) -> End。
//! 节点按固定顺序串行执行，状态每轮新建、从不跨轮共享；
//! LLM 客户端与工具注册表是所有并发轮次共享的只读资源。

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{ContextCompressor, Message, TokenUsageDelta, TurnRecord};
use crate::react::events::send_event;
use crate::react::{ConversationState, LoopState, ReactEvent, ReasoningLoop, ReasoningStep};
use crate::router::DomainRouter;

/// 路由无法确定领域时的固定回复
pub const FALLBACK_RESPONSE: &str = "I'm not sure which team can help with that yet. \
Could you tell me a bit more, for example whether it concerns orders and inventory, \
IT systems, HR matters or finance?";

/// 图中的节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    Router,
    Reasoning,
    Fallback,
    End,
}

impl GraphNode {
    /// 条件边：路由结果为 fallback 时走终端 fallback 节点
    pub fn next(self, state: &ConversationState) -> GraphNode {
        match self {
            GraphNode::Router if state.context.primary_domain.is_fallback() => GraphNode::Fallback,
            GraphNode::Router => GraphNode::Reasoning,
            GraphNode::Reasoning | GraphNode::Fallback | GraphNode::End => GraphNode::End,
        }
    }
}

/// 一轮的输出：修改后的状态 + 持久化载荷
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub state: ConversationState,
    pub loop_state: LoopState,
    pub record: TurnRecord,
}

impl TurnOutput {
    pub fn answer(&self) -> &str {
        self.state.final_answer().unwrap_or_default()
    }
}

/// 编排图：组件在构建时注入，invoke 可被多个轮次并发调用
pub struct OrchestrationGraph {
    compressor: ContextCompressor,
    router: DomainRouter,
    reasoning: ReasoningLoop,
    llm: Arc<dyn LlmClient>,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl OrchestrationGraph {
    pub fn new(
        compressor: ContextCompressor,
        router: DomainRouter,
        reasoning: ReasoningLoop,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            compressor,
            router,
            reasoning,
            llm,
            event_tx: None,
        }
    }

    /// 图级事件（压缩、路由、fallback 回复）的接收端；循环内事件由 ReasoningLoop 自己的通道发送
    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, ev: ReactEvent) {
        send_event(self.event_tx.as_ref(), ev);
    }

    fn fallback_respond(&self, state: &mut ConversationState) {
        tracing::info!("no confident route, answering with clarification");
        self.emit(ReactEvent::Answer {
            text: FALLBACK_RESPONSE.to_string(),
            exhausted: false,
        });
        state.push_step(ReasoningStep::answer(FALLBACK_RESPONSE));
    }

    /// 执行一轮；唯一的错误是推理循环中补全服务不可用 / 超时，
    /// 此时返回 TurnAborted，携带 loop_state 为 Failed 的完整轮次记录
    pub async fn invoke(&self, mut state: ConversationState) -> Result<TurnOutput, AgentError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let usage_before = self.llm.token_usage();
        let mut completion_calls = 0;

        if self.compressor.needs_compression(&state.messages) {
            let before = state.messages.len();
            state.messages = self.compressor.compress(&state.messages).await;
            completion_calls += 1;
            self.emit(ReactEvent::Compressed {
                before,
                after: state.messages.len(),
            });
        }

        let mut node = GraphNode::Router;
        let mut loop_state = LoopState::Iterating;
        let mut failure = None;
        while node != GraphNode::End {
            match node {
                GraphNode::Router => {
                    let decision = self.router.route(&mut state).await;
                    completion_calls += 1;
                    self.emit(ReactEvent::Routed {
                        destination: decision.destination,
                        secondary: decision.secondary_domains,
                        confidence: decision.confidence,
                    });
                }
                GraphNode::Reasoning => {
                    let outcome = self.reasoning.run(&mut state).await;
                    completion_calls += outcome.completion_calls;
                    loop_state = outcome.state;
                    failure = outcome.failure;
                }
                GraphNode::Fallback => {
                    self.fallback_respond(&mut state);
                    loop_state = LoopState::Answered;
                }
                GraphNode::End => {}
            }
            node = node.next(&state);
        }

        let answer = state.final_answer().unwrap_or_default().to_string();
        state.messages.push(Message::assistant(answer));

        let usage_after = self.llm.token_usage();
        let record = TurnRecord {
            session_id: state.session_id.clone(),
            turn_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            messages: state.messages.clone(),
            reasoning_trace: state.reasoning_trace.clone(),
            current_agent: state.current_agent.clone(),
            confidence: state.confidence,
            context: state.context.clone(),
            loop_state,
            latency_ms: start.elapsed().as_millis() as u64,
            completion_calls,
            tool_call_count: state.tool_call_count,
            token_usage: TokenUsageDelta {
                prompt_tokens: usage_after.0.saturating_sub(usage_before.0),
                completion_tokens: usage_after.1.saturating_sub(usage_before.1),
                total_tokens: usage_after.2.saturating_sub(usage_before.2),
            },
        };

        tracing::info!(
            agent = %record.current_agent,
            loop_state = ?loop_state,
            latency_ms = record.latency_ms,
            completion_calls,
            tool_calls = record.tool_call_count,
            "turn finished"
        );

        if let Some(cause) = failure {
            return Err(AgentError::TurnAborted {
                cause: Box::new(cause),
                record: Box::new(record),
            });
        }

        Ok(TurnOutput {
            state,
            loop_state,
            record,
        })
    }
}
