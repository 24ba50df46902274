//! ReAct 主循环
//!
//! Think -> Act (Tool) -> Observe，直到模型给出 answer 或迭代预算耗尽。
//! 每轮恰好一次补全调用；模型输出畸形时降级为直接回复，工具失败作为 observation 继续推理。
//! 补全服务本身不可用 / 超时时，追加说明错误的 answer 步骤后以 Failed 结束，错误随 LoopOutcome 返回。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::core::AgentError;
use crate::memory::truncate_chars;
use crate::react::events::send_event;
use crate::react::planner::{parse_react_response_with_level, ParseLevel, ReactAction};
use crate::react::prompt::build_react_prompt;
use crate::react::{ConversationState, LoopState, Planner, ReactEvent, ReasoningStep, StepKind};
use crate::tools::ToolDispatcher;

/// 事件中 observation 预览的最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;
/// 迭代耗尽且没有任何 observation 时的说明
const NO_OBSERVATION_NOTE: &str = "No tool results were obtained.";
/// 补全服务中途失败时回复的前缀
pub const ABORTED_PREFIX: &str = "[Turn aborted: the language model is unavailable]";

/// 推理循环配置
#[derive(Debug, Clone)]
pub struct ReactConfig {
    /// 最大迭代次数（每次迭代一次补全调用）
    pub max_iterations: usize,
    /// prompt 中单条 observation 的最大字符数
    pub observation_max_chars: usize,
    pub request_timeout_secs: u64,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            observation_max_chars: 1500,
            request_timeout_secs: 60,
        }
    }
}

/// 一次循环的结果；最终回复在 state.reasoning_trace 末尾
#[derive(Debug)]
pub struct LoopOutcome {
    pub state: LoopState,
    pub iterations: usize,
    pub completion_calls: usize,
    /// state 为 Failed 时的补全服务错误
    pub failure: Option<AgentError>,
}

/// 迭代耗尽时的回复：优先最近一次成功的 observation，其次最近一次 observation
pub fn exhaustion_answer(state: &ConversationState, iterations: usize) -> String {
    let observations = || {
        state.reasoning_trace.iter().rev().filter_map(|s| match &s.kind {
            StepKind::Observe { content, is_error, .. } => Some((content.as_str(), *is_error)),
            _ => None,
        })
    };
    let body = observations()
        .find(|(_, is_error)| !is_error)
        .or_else(|| observations().next())
        .map(|(content, _)| content)
        .unwrap_or(NO_OBSERVATION_NOTE);

    format!(
        "[Reasoning limit reached after {} iterations] Best available result:\n{}",
        iterations, body
    )
}

/// ReAct 推理循环：Planner + 工具调度器 + 迭代上限
pub struct ReasoningLoop {
    planner: Planner,
    dispatcher: Arc<ToolDispatcher>,
    config: ReactConfig,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl ReasoningLoop {
    pub fn new(planner: Planner, dispatcher: Arc<ToolDispatcher>, config: ReactConfig) -> Self {
        Self {
            planner,
            dispatcher,
            config,
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &ReactConfig {
        &self.config
    }

    fn emit(&self, ev: ReactEvent) {
        send_event(self.event_tx.as_ref(), ev);
    }

    fn finish(&self, state: &mut ConversationState, text: String, exhausted: bool) {
        self.emit(ReactEvent::Answer {
            text: text.clone(),
            exhausted,
        });
        state.push_step(ReasoningStep::answer(text));
    }

    /// 运行循环直到 answered / exhausted / failed；无论哪条路径，返回前恰好追加一个 answer 步骤，
    /// 已执行的步骤全部保留在 state 中
    pub async fn run(&self, state: &mut ConversationState) -> LoopOutcome {
        let max = self.config.max_iterations;
        let listing = self
            .dispatcher
            .registry()
            .listing(state.context.primary_domain, &state.context.secondary_domains);
        let mut completion_calls = 0;

        for iteration in 0..max {
            self.emit(ReactEvent::Thinking {
                iteration: iteration + 1,
                max_iterations: max,
            });

            let prompt = build_react_prompt(state, &listing, &self.config);
            completion_calls += 1;
            let raw = match self.planner.plan(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        iteration,
                        tool_calls = state.tool_call_count,
                        "completion service failed inside reasoning loop"
                    );
                    self.emit(ReactEvent::Error { text: e.to_string() });
                    state.push_step(ReasoningStep::answer(format!("{} {}", ABORTED_PREFIX, e)));
                    return LoopOutcome {
                        state: LoopState::Failed,
                        iterations: iteration + 1,
                        completion_calls,
                        failure: Some(e),
                    };
                }
            };

            let (decision, level) = parse_react_response_with_level(&raw);
            if level != ParseLevel::Strict {
                tracing::debug!(?level, "model output needed lenient parsing");
            }

            if !decision.reasoning.is_empty() {
                self.emit(ReactEvent::ThoughtContent {
                    text: decision.reasoning.clone(),
                });
            }
            state.push_step(ReasoningStep::think(decision.reasoning));

            match decision.action {
                ReactAction::Answer { response } => {
                    self.finish(state, response, false);
                    tracing::info!(iterations = iteration + 1, "reasoning loop answered");
                    return LoopOutcome {
                        state: LoopState::Answered,
                        iterations: iteration + 1,
                        completion_calls,
                        failure: None,
                    };
                }
                ReactAction::Tool { tool, args } => {
                    self.emit(ReactEvent::ToolCall {
                        tool: tool.clone(),
                        args: args.clone(),
                    });
                    state.push_step(ReasoningStep::act(tool.clone(), args.clone()));

                    let observation = self.dispatcher.dispatch_detailed(&tool, args).await;
                    state.tool_call_count += 1;
                    let is_error = observation.outcome.is_error();

                    self.emit(ReactEvent::Observation {
                        tool: tool.clone(),
                        preview: truncate_chars(&observation.content, OBSERVATION_PREVIEW_CHARS),
                        is_error,
                    });
                    state.push_step(ReasoningStep::observe(tool, observation.content, is_error));
                }
            }
        }

        let answer = exhaustion_answer(state, max);
        tracing::warn!(max_iterations = max, tool_calls = state.tool_call_count, "reasoning loop exhausted");
        self.finish(state, answer, true);
        LoopOutcome {
            state: LoopState::Exhausted,
            iterations: max,
            completion_calls,
            failure: None,
        }
    }
}
