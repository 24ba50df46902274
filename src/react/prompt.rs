//! ReAct prompt 构造
//!
//! 对相同的状态与工具列表输出完全相同的消息序列，测试可以逐字比对。

use crate::memory::{truncate_chars, Message, Role};
use crate::react::{ConversationState, ReactConfig, StepKind};
use crate::router::Domain;
use crate::tools::{ToolListing, ToolTier};

const REACT_INSTRUCTIONS: &str = "You are an enterprise assistant that solves the user's request step by step.\n\
At each step either call exactly one tool, or give the final answer.\n\
Use tool observations as facts; if a tool fails, decide whether another tool or an answer is better.\n\n\
Reply with a single JSON object and nothing else:\n\
{\"reasoning\": \"why\", \"action\": \"tool\", \"tool\": \"<tool name>\", \"args\": {...}}\n\
or\n\
{\"reasoning\": \"why\", \"action\": \"answer\", \"response\": \"<final answer for the user>\"}";

fn render_tool(t: &ToolListing) -> String {
    match (t.tier, t.domain) {
        (ToolTier::Related, Some(d)) => format!("- {} [related: {}]: {}", t.name, d, t.description),
        _ => format!("- {}: {}", t.name, t.description),
    }
}

fn render_tools(listing: &[ToolListing], primary: Domain) -> String {
    if listing.is_empty() {
        return "Tools: none. Answer directly.".to_string();
    }

    let preferred: Vec<String> = listing
        .iter()
        .filter(|t| t.tier == ToolTier::Preferred)
        .map(render_tool)
        .collect();
    let others: Vec<String> = listing
        .iter()
        .filter(|t| t.tier != ToolTier::Preferred)
        .map(render_tool)
        .collect();

    let mut out = String::new();
    if !preferred.is_empty() {
        out.push_str(&format!("Preferred tools ({}):\n{}", primary, preferred.join("\n")));
    }
    if !others.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        let header = if preferred.is_empty() { "Available tools" } else { "Also available" };
        out.push_str(&format!("{}:\n{}", header, others.join("\n")));
    }
    out
}

fn render_hints(state: &ConversationState) -> String {
    let hints = &state.context;
    let secondary = if hints.secondary_domains.is_empty() {
        "none".to_string()
    } else {
        hints
            .secondary_domains
            .iter()
            .map(Domain::id)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut line = format!("Domain hints: primary={}; secondary={}", hints.primary_domain, secondary);
    if !hints.rationale.is_empty() {
        line.push_str(&format!("; rationale: {}", hints.rationale));
    }
    line
}

/// 把推理轨迹渲染为 Thought / Action / Observation 行；超长 observation 截断
pub fn render_trace(state: &ConversationState, observation_max_chars: usize) -> String {
    state
        .reasoning_trace
        .iter()
        .map(|step| match &step.kind {
            StepKind::Think { content } => format!("Thought: {}", content),
            StepKind::Act { tool, args } => format!("Action: {} {}", tool, args),
            StepKind::Observe { tool, content, .. } => {
                format!("Observation ({}): {}", tool, truncate_chars(content, observation_max_chars))
            }
            StepKind::Answer { content } => format!("Answer: {}", content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 构造一次决策请求的消息序列：
/// system（说明 + 工具列表）+ 先前对话 + user（问题、领域提示、轨迹）
pub fn build_react_prompt(
    state: &ConversationState,
    listing: &[ToolListing],
    config: &ReactConfig,
) -> Vec<Message> {
    let system = format!(
        "{}\n\n{}",
        REACT_INSTRUCTIONS,
        render_tools(listing, state.context.primary_domain)
    );
    let mut messages = vec![Message::system(system)];

    // 先前对话（含压缩摘要），不含本轮问题
    let question_idx = state.messages.iter().rposition(|m| m.role == Role::User);
    messages.extend(
        state
            .messages
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != question_idx)
            .map(|(_, m)| m.clone()),
    );

    let mut user = format!("Question: {}\n{}", state.question(), render_hints(state));
    let trace = render_trace(state, config.observation_max_chars);
    if trace.is_empty() {
        user.push_str("\n\nNo steps taken yet.");
    } else {
        user.push_str("\n\nSteps so far:\n");
        user.push_str(&trace);
    }
    messages.push(Message::user(user));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::react::{ReasoningStep, RouterHints};
    use serde_json::json;

    fn listing() -> Vec<ToolListing> {
        let entry = |name: &str, domain, tier| ToolListing {
            name: name.to_string(),
            description: "d".to_string(),
            domain,
            tier,
        };
        vec![
            entry("stock_lookup", Some(Domain::Erp), ToolTier::Preferred),
            entry("ticket_search", Some(Domain::ItOps), ToolTier::Related),
            entry("search_knowledge_base", None, ToolTier::Available),
        ]
    }

    fn state() -> ConversationState {
        let mut s = ConversationState::new_turn(
            vec![Message::user("earlier"), Message::assistant("reply")],
            "stock of A-12?",
            None,
        );
        s.context = RouterHints {
            primary_domain: Domain::Erp,
            secondary_domains: vec![Domain::ItOps],
            rationale: "inventory".to_string(),
        };
        s
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_react_prompt(&state(), &listing(), &ReactConfig::default());
        assert_eq!(prompt.len(), 4);
        let system = &prompt[0].content;
        let preferred = system.find("Preferred tools (erp):").unwrap();
        let also = system.find("Also available:").unwrap();
        assert!(preferred < also);
        assert!(system.contains("- ticket_search [related: it_ops]: d"));
        assert_eq!(prompt[1].content, "earlier");

        let user = &prompt[3].content;
        assert!(user.starts_with("Question: stock of A-12?"));
        assert!(user.contains("primary=erp; secondary=it_ops; rationale: inventory"));
        assert!(user.contains("No steps taken yet."));
    }

    #[test]
    fn test_trace_rendering_truncates_observations() {
        let mut s = state();
        s.push_step(ReasoningStep::think("check stock"));
        s.push_step(ReasoningStep::act("stock_lookup", json!({"sku": "A-12"})));
        s.push_step(ReasoningStep::observe("stock_lookup", "x".repeat(50), false));

        let rendered = render_trace(&s, 10);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "Thought: check stock");
        assert_eq!(lines[1], r#"Action: stock_lookup {"sku":"A-12"}"#);
        assert_eq!(lines[2], format!("Observation (stock_lookup): {}...", "x".repeat(10)));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let config = ReactConfig::default();
        let a = build_react_prompt(&state(), &listing(), &config);
        let b = build_react_prompt(&state(), &listing(), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fallback_domain_lists_everything_as_available() {
        let mut s = state();
        s.context = RouterHints::default();
        let tools: Vec<ToolListing> = listing()
            .into_iter()
            .map(|mut t| {
                t.tier = ToolTier::Available;
                t
            })
            .collect();
        let prompt = build_react_prompt(&s, &tools, &ReactConfig::default());
        assert!(prompt[0].content.contains("Available tools:\n- stock_lookup: d"));
        assert!(!prompt[0].content.contains("Preferred"));
    }
}
