//! LLM 层：客户端抽象、输出形状约束与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod schema;
pub mod traits;

use std::sync::Arc;

pub use mock::{MockLlmClient, MockReply};
pub use openai::{OpenAiClient, TokenUsage};
pub use schema::OutputSchema;
pub use traits::{complete_with_timeout, inject_schema, LlmClient, LlmError};

use crate::config::AppConfig;

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = match provider.as_str() {
        "deepseek" => std::env::var("DEEPSEEK_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok(),
        "mock" => None,
        _ => std::env::var("OPENAI_API_KEY").ok(),
    };

    match api_key {
        Some(key) => {
            let base_url = cfg.llm.base_url.clone().or_else(|| {
                (provider == "deepseek").then(|| "https://api.deepseek.com".to_string())
            });
            tracing::info!(provider = %provider, model = %cfg.llm.model, "Using OpenAI-compatible LLM");
            Arc::new(OpenAiClient::new(
                base_url.as_deref(),
                &cfg.llm.model,
                Some(key.as_str()),
            ))
        }
        None => {
            tracing::warn!("No API key set or provider is mock, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}
