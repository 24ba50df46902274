//! Planner：调用 LLM 得到下一步决策，并把原始文本解析成 ReactDecision
//!
//! 解析分层进行且永不失败：
//! 严格 JSON -> ```围栏代码块``` -> 文本中内嵌的含 "action" 的对象片段 -> 整段原文视为最终回复。

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::llm::{complete_with_timeout, LlmClient, OutputSchema};
use crate::memory::Message;

/// 决策动作
#[derive(Debug, Clone, PartialEq)]
pub enum ReactAction {
    /// 调用工具
    Tool { tool: String, args: Value },
    /// 直接回复用户
    Answer { response: String },
}

/// 一次推理决策
#[derive(Debug, Clone, PartialEq)]
pub struct ReactDecision {
    pub reasoning: String,
    pub action: ReactAction,
}

impl ReactDecision {
    pub fn is_answer(&self) -> bool {
        matches!(self.action, ReactAction::Answer { .. })
    }
}

/// 解析命中的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseLevel {
    Strict,
    Fenced,
    Fragment,
    /// 全部失败，原文即回复
    Literal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
enum ActionKind {
    Tool,
    Answer,
}

/// 模型应输出的 JSON 形状（同时用于 schemars 生成约束）
#[derive(Debug, Deserialize, JsonSchema)]
struct WireDecision {
    /// 简短说明为什么这样做
    #[serde(default)]
    reasoning: String,
    /// "tool" 调用工具，"answer" 直接回复
    action: ActionKind,
    /// action 为 tool 时的工具名
    #[serde(default)]
    tool: Option<String>,
    /// action 为 tool 时的参数对象
    #[serde(default)]
    args: Option<Map<String, Value>>,
    /// action 为 answer 时给用户的回复
    #[serde(default)]
    response: Option<String>,
}

impl WireDecision {
    fn into_decision(self) -> Option<ReactDecision> {
        let action = match self.action {
            ActionKind::Answer => ReactAction::Answer {
                response: self.response?,
            },
            ActionKind::Tool => {
                let tool = self.tool.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
                ReactAction::Tool {
                    tool,
                    args: Value::Object(self.args.unwrap_or_default()),
                }
            }
        };
        Some(ReactDecision {
            reasoning: self.reasoning,
            action,
        })
    }
}

/// ReAct 决策的输出形状约束
pub fn decision_schema() -> OutputSchema {
    OutputSchema::of::<WireDecision>("react_decision")
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fenced block regex")
    })
}

fn action_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""action"\s*:"#).expect("action key regex"))
}

fn try_strict(text: &str) -> Option<ReactDecision> {
    serde_json::from_str::<WireDecision>(text.trim())
        .ok()
        .and_then(WireDecision::into_decision)
}

/// 所有 ```...``` 围栏内的内容
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    fenced_block_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
        .collect()
}

/// 文本中所有括号配平的最外层 `{...}` 片段（跳过字符串字面量里的括号），按出现顺序
///
/// 单趟扫描：左括号位置入栈，右括号出栈时记录片段；未闭合的左括号不会导致回扫。
pub fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut opens: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        // 括号外的引号属于普通文本
        if opens.is_empty() {
            if b == b'{' {
                opens.push(i);
            }
            continue;
        }
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => opens.push(i),
            b'}' => {
                if let Some(open) = opens.pop() {
                    // 已记录的、起点在 open 之后的片段都嵌套在本片段内
                    while spans.last().is_some_and(|&(start, _)| start > open) {
                        spans.pop();
                    }
                    spans.push((open, i));
                }
            }
            _ => {}
        }
    }

    spans.into_iter().map(|(open, close)| &text[open..=close]).collect()
}

/// 解析模型输出，返回决策及命中的层级；永不失败
pub fn parse_react_response_with_level(raw: &str) -> (ReactDecision, ParseLevel) {
    if let Some(d) = try_strict(raw) {
        return (d, ParseLevel::Strict);
    }

    for block in fenced_blocks(raw) {
        if let Some(d) = try_strict(block) {
            return (d, ParseLevel::Fenced);
        }
    }

    if action_key_re().is_match(raw) {
        for fragment in balanced_objects(raw) {
            if !action_key_re().is_match(fragment) {
                continue;
            }
            if let Some(d) = try_strict(fragment) {
                return (d, ParseLevel::Fragment);
            }
        }
    }

    (
        ReactDecision {
            reasoning: String::new(),
            action: ReactAction::Answer {
                response: raw.to_string(),
            },
        },
        ParseLevel::Literal,
    )
}

/// 解析模型输出为决策；无法解析时把原文当作最终回复
pub fn parse_react_response(raw: &str) -> ReactDecision {
    parse_react_response_with_level(raw).0
}

/// Planner：持有 LLM 与单次调用超时，负责发起一次决策请求
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    schema: OutputSchema,
    timeout: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            schema: decision_schema(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 发起一次补全，返回原始文本；传输失败 / 超时作为终止错误返回
    pub async fn plan(&self, messages: &[Message]) -> Result<String, AgentError> {
        complete_with_timeout(self.llm.as_ref(), messages, Some(&self.schema), self.timeout)
            .await
            .map_err(AgentError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_answer_without_reasoning() {
        let (d, level) = parse_react_response_with_level(r#"{"action":"answer","response":"X"}"#);
        assert_eq!(level, ParseLevel::Strict);
        assert_eq!(
            d.action,
            ReactAction::Answer {
                response: "X".to_string()
            }
        );
        assert!(d.reasoning.is_empty());
    }

    #[test]
    fn test_strict_tool_defaults_args() {
        let d = parse_react_response(r#"{"reasoning":"need stock","action":"tool","tool":"t"}"#);
        assert_eq!(
            d.action,
            ReactAction::Tool {
                tool: "t".to_string(),
                args: json!({})
            }
        );
        assert_eq!(d.reasoning, "need stock");
    }

    #[test]
    fn test_fenced_block() {
        let raw = "Sure.\n```json\n{\"reasoning\":\"r\",\"action\":\"tool\",\"tool\":\"lookup\",\"args\":{\"sku\":\"A-12\"}}\n```\n";
        let (d, level) = parse_react_response_with_level(raw);
        assert_eq!(level, ParseLevel::Fenced);
        assert_eq!(
            d.action,
            ReactAction::Tool {
                tool: "lookup".to_string(),
                args: json!({"sku": "A-12"})
            }
        );
    }

    #[test]
    fn test_embedded_fragment() {
        let raw = r#"I will check it. {"reasoning":"r","action":"answer","response":"brace } inside"} thanks"#;
        let (d, level) = parse_react_response_with_level(raw);
        assert_eq!(level, ParseLevel::Fragment);
        assert_eq!(
            d.action,
            ReactAction::Answer {
                response: "brace } inside".to_string()
            }
        );
    }

    #[test]
    fn test_fragment_skips_objects_without_action() {
        let raw = r#"context {"a":1} then {"action":"tool","tool":"t","args":{"k":{"n":2}}}"#;
        let (d, level) = parse_react_response_with_level(raw);
        assert_eq!(level, ParseLevel::Fragment);
        assert!(matches!(d.action, ReactAction::Tool { ref tool, .. } if tool == "t"));
    }

    #[test]
    fn test_malformed_inputs_degrade_to_literal_answer() {
        let cases = [
            "plain prose answer",
            r#"{"action": "tool", "tool": "#,
            r#"{"reasoning": "x", "response": "missing action"}"#,
            r#"{"action": "tool", "args": {}}"#,
            r#"{"action": "answer"}"#,
            r#"{"action": "dance", "response": "x"}"#,
            "",
        ];
        for raw in cases {
            let (d, level) = parse_react_response_with_level(raw);
            assert_eq!(level, ParseLevel::Literal, "case {raw:?}");
            assert_eq!(
                d.action,
                ReactAction::Answer {
                    response: raw.to_string()
                }
            );
        }
    }

    #[test]
    fn test_balanced_objects_handles_nesting_and_strings() {
        let objs = balanced_objects(r#"x {"a":{"b":"}"}} y {"c":2} {unclosed"#);
        assert_eq!(objs, vec![r#"{"a":{"b":"}"}}"#, r#"{"c":2}"#]);
    }

    #[test]
    fn test_balanced_objects_inside_unclosed_object() {
        let objs = balanced_objects(r#"{"outer": {"action":"answer","response":"ok"} trailing"#);
        assert_eq!(objs, vec![r#"{"action":"answer","response":"ok"}"#]);
    }

    #[test]
    fn test_brace_heavy_output_parses_in_linear_time() {
        let raw = format!("\"action\": {}", "{".repeat(200_000));
        let start = std::time::Instant::now();
        let (_, level) = parse_react_response_with_level(&raw);
        assert_eq!(level, ParseLevel::Literal);
        assert!(balanced_objects(&raw).is_empty());
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_decision_schema_mentions_fields() {
        let text = decision_schema().schema.to_string();
        assert!(text.contains("action"));
        assert!(text.contains("response"));
    }
}
