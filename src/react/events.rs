//! 编排过程事件：路由、思考、工具调用、观察与回复，供 REPL / 前端实时展示

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::router::Domain;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 上下文被压缩（消息条数变化）
    Compressed { before: usize, after: usize },
    /// 路由完成
    Routed {
        destination: Domain,
        secondary: Vec<Domain>,
        confidence: f32,
    },
    /// 正在调用 LLM 思考（第几轮）
    Thinking { iteration: usize, max_iterations: usize },
    /// 模型给出的推理说明
    ThoughtContent { text: String },
    /// 调用工具
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览）
    Observation {
        tool: String,
        preview: String,
        is_error: bool,
    },
    /// 最终回复；exhausted 表示由迭代上限合成
    Answer { text: String, exhausted: bool },
    /// 终止错误
    Error { text: String },
}

/// 发送事件；接收端已关闭时静默忽略
pub(crate) fn send_event(tx: Option<&UnboundedSender<ReactEvent>>, ev: ReactEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}
