//! Headless 运行时
//!
//! 供 REPL / HTTP 等前端调用的无界面逻辑：
//! build_graph_from_config 组装编排图，create_session_store 选择存储后端，
//! process_message 对单条用户输入跑一轮（读历史 -> invoke -> 持久化）并返回结果；
//! 补全服务中途失败的轮次同样持久化后再返回错误。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{AgentError, GraphBuilder, OrchestrationGraph, TurnOutput};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{InMemorySessionStore, JsonFileSessionStore, SessionStore, TurnRecord};
use crate::react::{ConversationState, ReactEvent};
use crate::tools::{InMemoryKnowledgeBase, KnowledgeSearchTool, ToolRegistry};

/// 知识检索工具每次返回的最多文档数
const KNOWLEDGE_MAX_RESULTS: usize = 3;

/// 按配置构建工具注册表；配置了知识库文件时注册 search_knowledge_base
pub fn build_tool_registry(cfg: &AppConfig) -> ToolRegistry {
    let mut tools = ToolRegistry::new();

    if let Some(path) = &cfg.tools.knowledge_file {
        match InMemoryKnowledgeBase::from_json_file(path) {
            Ok(kb) => {
                tracing::info!(path = %path.display(), docs = kb.len(), "knowledge base loaded");
                tools.register(KnowledgeSearchTool::new(Arc::new(kb), KNOWLEDGE_MAX_RESULTS));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load knowledge base, tool disabled");
            }
        }
    }

    tools
}

/// 用给定 LLM 与配置组装编排图
pub fn build_graph(
    llm: Arc<dyn LlmClient>,
    cfg: &AppConfig,
    tools: ToolRegistry,
    event_tx: Option<tokio::sync::mpsc::UnboundedSender<ReactEvent>>,
) -> OrchestrationGraph {
    let builder = GraphBuilder::from_config(llm, cfg).with_tools(tools);
    match event_tx {
        Some(tx) => builder.with_event_tx(tx).build(),
        None => builder.build(),
    }
}

/// 从配置构建编排图：LLM 后端由 [llm] 段与环境变量决定
pub fn build_graph_from_config(cfg: &AppConfig) -> OrchestrationGraph {
    let llm = create_llm_from_config(cfg);
    build_graph(llm, cfg, build_tool_registry(cfg), None)
}

/// 按 [session] 段选择会话存储：memory / json
pub fn create_session_store(cfg: &AppConfig) -> Result<Arc<dyn SessionStore>, AgentError> {
    match cfg.session.store.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemorySessionStore::new())),
        "json" => Ok(Arc::new(JsonFileSessionStore::new(&cfg.session.dir))),
        other => Err(AgentError::ConfigError(format!(
            "unknown session store `{}` (expected memory or json)",
            other
        ))),
    }
}

/// 处理单条用户消息：读取会话历史、构建新状态、执行一轮、持久化
///
/// 持久化失败只记录告警，不影响本轮回复。
pub async fn process_message(
    graph: &OrchestrationGraph,
    store: &dyn SessionStore,
    session_id: Option<&str>,
    user_input: &str,
) -> Result<TurnOutput, AgentError> {
    let history = match session_id {
        Some(id) => store.load_messages(id).await.unwrap_or_else(|e| {
            tracing::warn!(session_id = %id, error = %e, "failed to load history, starting fresh");
            Vec::new()
        }),
        None => Vec::new(),
    };

    let state = ConversationState::new_turn(history, user_input, session_id.map(str::to_string));
    let output = match graph.invoke(state).await {
        Ok(output) => output,
        Err(e) => {
            if let Some(record) = e.partial_record() {
                persist(store, record).await;
            }
            return Err(e);
        }
    };

    persist(store, &output.record).await;
    Ok(output)
}

async fn persist(store: &dyn SessionStore, record: &TurnRecord) {
    if let Err(e) = store.save_turn(record).await {
        tracing::warn!(error = %e, "failed to persist turn");
    }
}
