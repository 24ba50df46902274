//! 推理层：单轮状态、Planner、prompt 构造与 ReAct 主循环

pub mod events;
pub mod loop_;
pub mod planner;
pub mod prompt;
pub mod state;

pub use events::ReactEvent;
pub use loop_::{exhaustion_answer, ABORTED_PREFIX, LoopOutcome, ReactConfig, ReasoningLoop};
pub use planner::{
    parse_react_response, parse_react_response_with_level, ParseLevel, Planner, ReactAction,
    ReactDecision,
};
pub use prompt::build_react_prompt;
pub use state::{ConversationState, LoopState, ReasoningStep, RouterHints, StepKind};
