//! 工具调度器
//!
//! 持有 ToolRegistry 与单次调用超时；dispatch(tool_name, args) 是全函数：
//! 找不到工具、执行出错、超时都转成固定格式的 observation 文本，从不向调用方抛错。
//! 每次调用输出一条结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::tools::ToolRegistry;

/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 调度结果类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ok,
    NotFound,
    Error,
    Timeout,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Ok => "ok",
            DispatchOutcome::NotFound => "not_found",
            DispatchOutcome::Error => "error",
            DispatchOutcome::Timeout => "timeout",
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, DispatchOutcome::Ok)
    }
}

/// 一次调度得到的 observation
#[derive(Debug, Clone)]
pub struct Observation {
    pub content: String,
    pub outcome: DispatchOutcome,
}

/// 未注册工具的固定格式文本
pub fn tool_not_found_message(tool_name: &str) -> String {
    format!("Error: tool `{}` not found", tool_name)
}

/// 工具执行失败的固定格式文本
pub fn tool_error_message(tool_name: &str, message: &str) -> String {
    format!("Error executing `{}`: {}", tool_name, message)
}

/// 工具调度器：对每次调用施加超时，并把所有失败映射为 observation 文本
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行工具并返回 observation 文本；永不失败
    pub async fn dispatch(&self, tool_name: &str, args: Value) -> String {
        self.dispatch_detailed(tool_name, args).await.content
    }

    /// 同 dispatch，但保留结果类别，供推理循环标注失败的 observation
    pub async fn dispatch_detailed(&self, tool_name: &str, args: Value) -> Observation {
        let start = Instant::now();
        let args_preview = args_preview(&args);

        let observation = match self.registry.get(tool_name) {
            None => Observation {
                content: tool_not_found_message(tool_name),
                outcome: DispatchOutcome::NotFound,
            },
            Some(tool) => match timeout(self.timeout, tool.execute(args)).await {
                Ok(Ok(content)) => Observation {
                    content,
                    outcome: DispatchOutcome::Ok,
                },
                Ok(Err(e)) => {
                    tracing::warn!(tool = %tool_name, error = %e, "tool execution failed");
                    Observation {
                        content: tool_error_message(tool_name, &e),
                        outcome: DispatchOutcome::Error,
                    }
                }
                Err(_) => {
                    let reason = format!("timed out after {}s", self.timeout.as_secs());
                    tracing::warn!(tool = %tool_name, "tool execution timed out");
                    Observation {
                        content: tool_error_message(tool_name, &reason),
                        outcome: DispatchOutcome::Timeout,
                    }
                }
            },
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": !observation.outcome.is_error(),
            "outcome": observation.outcome.as_str(),
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        observation
    }
}

fn args_preview(args: &Value) -> String {
    crate::memory::truncate_chars(&args.to_string(), ARGS_PREVIEW_CHARS)
}
