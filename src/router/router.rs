//! 领域路由器
//!
//! 读取最近 N 条消息，发起一次结构化补全，得到主领域 + 次要领域。
//! 任何失败（传输错误、超时、无法解析、领域不在闭集、置信度过低）都降级为
//! `fallback`、置信度 0.0，从不向调用方抛错。

use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::llm::{complete_with_timeout, LlmClient, OutputSchema};
use crate::memory::{truncate_chars, Message, Role};
use crate::react::{ConversationState, RouterHints};
use crate::react::planner::{balanced_objects, fenced_blocks};
use crate::router::Domain;

/// 路由时单条消息的最大字符数
const ROUTE_MESSAGE_MAX_CHARS: usize = 800;

/// 路由配置
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// 只看最近 N 条消息
    pub history_window: usize,
    /// 低于该置信度降级为 fallback
    pub min_confidence: f32,
    pub request_timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            min_confidence: 0.3,
            request_timeout_secs: 60,
        }
    }
}

/// 路由结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub destination: Domain,
    /// 仅用于审计，从不解析
    pub reasoning: String,
    /// 与 destination 不相交、去重、保持模型给出的顺序
    pub secondary_domains: Vec<Domain>,
    pub confidence: f32,
}

impl RouteDecision {
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            destination: Domain::Fallback,
            reasoning: reasoning.into(),
            secondary_domains: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.destination.is_fallback()
    }
}

/// 模型应输出的路由 JSON
#[derive(Debug, Deserialize, JsonSchema)]
struct RawRouteDecision {
    /// 目的地，如 "erp_agent"、"it_ops_agent"，无法归类时为 "fallback"
    destination: String,
    /// 一句话说明归类理由
    #[serde(default)]
    reasoning: String,
    /// 问题同样涉及的其它领域（可为空）
    #[serde(default)]
    secondary_domains: Vec<String>,
    /// 0.0 - 1.0
    #[serde(default)]
    confidence: Option<f32>,
}

fn route_schema() -> OutputSchema {
    OutputSchema::of::<RawRouteDecision>("route_decision")
}

fn parse_raw(text: &str) -> Option<RawRouteDecision> {
    let attempt = |t: &str| serde_json::from_str::<RawRouteDecision>(t.trim()).ok();
    attempt(text)
        .or_else(|| fenced_blocks(text).into_iter().find_map(attempt))
        .or_else(|| balanced_objects(text).into_iter().find_map(attempt))
}

fn routing_system_prompt() -> String {
    let domains = Domain::ROUTABLE
        .iter()
        .map(|d| format!("- {}: {}", d.agent_id(), d.description()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a request router. Classify the user's latest request into exactly one destination.\n\n\
         Destinations:\n{}\n- fallback: {}\n\n\
         Also list any other destinations whose tools the request may need as secondary_domains \
         (never repeat the destination). Give a confidence between 0.0 and 1.0.",
        domains,
        Domain::Fallback.description()
    )
}

/// 领域路由器：共享只读的 LLM 客户端，每轮一次补全调用
pub struct DomainRouter {
    llm: Arc<dyn LlmClient>,
    config: RouterConfig,
    schema: OutputSchema,
}

impl DomainRouter {
    pub fn new(llm: Arc<dyn LlmClient>, config: RouterConfig) -> Self {
        Self {
            llm,
            config,
            schema: route_schema(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// 构造路由 prompt：系统说明 + 最近 history_window 条非 system 消息
    fn build_prompt(&self, messages: &[Message]) -> Vec<Message> {
        let recent: Vec<&Message> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();
        let skip = recent.len().saturating_sub(self.config.history_window.max(1));
        let transcript = recent[skip..]
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), truncate_chars(&m.content, ROUTE_MESSAGE_MAX_CHARS)))
            .collect::<Vec<_>>()
            .join("\n");

        vec![
            Message::system(routing_system_prompt()),
            Message::user(format!(
                "Conversation (most recent last):\n{}\n\nRoute the latest user request.",
                transcript
            )),
        ]
    }

    /// 把模型输出校验为 RouteDecision
    fn validate(&self, raw: RawRouteDecision) -> RouteDecision {
        let Some(destination) = Domain::parse(&raw.destination) else {
            tracing::warn!(destination = %raw.destination, "router returned unknown destination");
            return RouteDecision::fallback(raw.reasoning);
        };
        if destination.is_fallback() {
            return RouteDecision::fallback(raw.reasoning);
        }

        let confidence = raw.confidence.unwrap_or(1.0).clamp(0.0, 1.0);
        if confidence < self.config.min_confidence {
            tracing::info!(%destination, confidence, "router confidence below threshold");
            return RouteDecision::fallback(raw.reasoning);
        }

        let mut secondary = Vec::new();
        for d in raw.secondary_domains.iter().filter_map(|s| Domain::parse(s)) {
            if d != destination && !d.is_fallback() && !secondary.contains(&d) {
                secondary.push(d);
            }
        }

        RouteDecision {
            destination,
            reasoning: raw.reasoning,
            secondary_domains: secondary,
            confidence,
        }
    }

    /// 对消息序列分类；恰好一次补全调用，从不失败
    pub async fn classify(&self, messages: &[Message]) -> RouteDecision {
        let prompt = self.build_prompt(messages);
        let timeout = Duration::from_secs(self.config.request_timeout_secs);

        let text = match complete_with_timeout(self.llm.as_ref(), &prompt, Some(&self.schema), timeout).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "routing call failed, using fallback");
                return RouteDecision::fallback(format!("routing failed: {}", e));
            }
        };

        match parse_raw(&text) {
            Some(raw) => self.validate(raw),
            None => {
                tracing::warn!(preview = %truncate_chars(&text, 120), "unparseable routing output, using fallback");
                RouteDecision::fallback("unparseable routing output")
            }
        }
    }

    /// 分类并把结果写入状态：current_agent、confidence、context
    pub async fn route(&self, state: &mut ConversationState) -> RouteDecision {
        let decision = self.classify(&state.messages).await;

        state.current_agent = decision.destination.agent_id();
        state.confidence = decision.confidence;
        state.context = RouterHints {
            primary_domain: decision.destination,
            secondary_domains: decision.secondary_domains.clone(),
            rationale: decision.reasoning.clone(),
        };

        tracing::info!(
            destination = %state.current_agent,
            secondary = ?decision.secondary_domains,
            confidence = decision.confidence,
            "routed"
        );
        decision
    }
}
