//! 编排图构建器：统一组装 Compressor / Router / ReasoningLoop
//!
//! 所有依赖（LLM 客户端、工具注册表）显式注入，测试可替换为确定性的假实现。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::core::OrchestrationGraph;
use crate::llm::LlmClient;
use crate::memory::{CompressionConfig, ContextCompressor};
use crate::react::{Planner, ReactConfig, ReactEvent, ReasoningLoop};
use crate::router::{DomainRouter, RouterConfig};
use crate::tools::{ToolDispatcher, ToolRegistry};

/// 默认单次工具调用超时（秒）
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

pub struct GraphBuilder {
    llm: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    router: RouterConfig,
    react: ReactConfig,
    compression: CompressionConfig,
    tool_timeout_secs: u64,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl GraphBuilder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            registry: ToolRegistry::new(),
            router: RouterConfig::default(),
            react: ReactConfig::default(),
            compression: CompressionConfig::default(),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            event_tx: None,
        }
    }

    /// 用配置文件中的各段参数初始化
    pub fn from_config(llm: Arc<dyn LlmClient>, config: &AppConfig) -> Self {
        Self::new(llm)
            .with_router(config.router_config())
            .with_react(config.react_config())
            .with_compression(config.compression_config())
            .with_tool_timeout(config.tools.tool_timeout_secs)
    }

    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_router(mut self, config: RouterConfig) -> Self {
        self.router = config;
        self
    }

    pub fn with_react(mut self, config: ReactConfig) -> Self {
        self.react = config;
        self
    }

    pub fn with_compression(mut self, config: CompressionConfig) -> Self {
        self.compression = config;
        self
    }

    pub fn with_tool_timeout(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    /// 过程事件通道：图与推理循环共用同一发送端
    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn build(self) -> OrchestrationGraph {
        tracing::debug!(tools = ?self.registry.tool_names(), "building orchestration graph");
        let dispatcher = Arc::new(ToolDispatcher::new(
            Arc::new(self.registry),
            self.tool_timeout_secs,
        ));
        let planner = Planner::new(self.llm.clone(), self.react.request_timeout_secs);
        let mut reasoning = ReasoningLoop::new(planner, dispatcher, self.react);
        let compressor = ContextCompressor::new(self.llm.clone(), self.compression);
        let router = DomainRouter::new(self.llm.clone(), self.router);

        match self.event_tx {
            Some(tx) => {
                reasoning = reasoning.with_event_tx(tx.clone());
                OrchestrationGraph::new(compressor, router, reasoning, self.llm).with_event_tx(tx)
            }
            None => OrchestrationGraph::new(compressor, router, reasoning, self.llm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_from_config_applies_sections() {
        let mut config = AppConfig::default();
        config.react.max_iterations = 2;
        config.router.history_window = 3;
        let builder = GraphBuilder::from_config(Arc::new(MockLlmClient::new()), &config);
        assert_eq!(builder.react.max_iterations, 2);
        assert_eq!(builder.router.history_window, 3);
        assert_eq!(builder.tool_timeout_secs, 30);
    }
}
