//! 会话 / 审计存储
//!
//! 每轮结束后编排图产出一条 TurnRecord（最终消息、完整推理轨迹、延迟与 token 用量），
//! 交给 SessionStore 持久化。save_turn 返回前写入必须已完成，下一轮才能读到最新历史。
//! 核心不做重试，也不保证存储端的持久性。
//!
//! 文件存储先写临时文件再 rename 覆盖；无法解析的会话文件在下一次 save_turn 时
//! 被改名隔离（`<id>.json.corrupt-<时间戳>`），会话从空历史重新开始。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::AgentError;
use crate::memory::Message;
use crate::react::{LoopState, ReasoningStep, RouterHints};

/// 单轮 token 用量（本轮增量）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsageDelta {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// 一轮对话的持久化载荷（字段顺序与名称即对外稳定格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub session_id: Option<String>,
    pub turn_id: String,
    pub started_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub reasoning_trace: Vec<ReasoningStep>,
    pub current_agent: String,
    pub confidence: f32,
    pub context: RouterHints,
    pub loop_state: LoopState,
    pub latency_ms: u64,
    pub completion_calls: usize,
    pub tool_call_count: usize,
    pub token_usage: TokenUsageDelta,
}

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 持久化一轮；session_id 为 None 的无状态调用不写入
    async fn save_turn(&self, record: &TurnRecord) -> Result<(), AgentError>;

    /// 最近一轮的最终消息列表，作为下一轮的历史；没有记录时为空
    async fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, AgentError>;

    /// 会话的全部轮次（供审计 / 回看）
    async fn list_turns(&self, session_id: &str) -> Result<Vec<TurnRecord>, AgentError>;
}

/// 内存会话存储
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<TurnRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_turn(&self, record: &TurnRecord) -> Result<(), AgentError> {
        let Some(session_id) = &record.session_id else {
            return Ok(());
        };
        self.sessions
            .write()
            .await
            .entry(session_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, AgentError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .and_then(|turns| turns.last())
            .map(|t| t.messages.clone())
            .unwrap_or_default())
    }

    async fn list_turns(&self, session_id: &str) -> Result<Vec<TurnRecord>, AgentError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// 文件会话存储：每个会话一个 JSON 文件（轮次数组），父目录不存在时自动创建
#[derive(Debug)]
pub struct JsonFileSessionStore {
    dir: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf, AgentError> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AgentError::Persistence(format!(
                "invalid session id: {session_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    async fn read_turns(&self, path: &Path) -> Result<Vec<TurnRecord>, AgentError> {
        match tokio::fs::read_to_string(path).await {
            Ok(data) => Ok(serde_json::from_str(&data)
                .map_err(|e| AgentError::Persistence(format!("{}: {}", path.display(), e)))?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取已有轮次用于追加；文件无法解析时改名隔离并返回空列表
    async fn turns_for_append(&self, path: &Path) -> Result<Vec<TurnRecord>, AgentError> {
        let data = match tokio::fs::read_to_string(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&data) {
            Ok(turns) => Ok(turns),
            Err(e) => {
                let aside = quarantine_path(path);
                tokio::fs::rename(path, &aside).await?;
                tracing::warn!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "unreadable session file moved aside, starting a new history"
                );
                Ok(Vec::new())
            }
        }
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
    path.with_extension(format!("json.corrupt-{stamp}"))
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn save_turn(&self, record: &TurnRecord) -> Result<(), AgentError> {
        let Some(session_id) = &record.session_id else {
            return Ok(());
        };
        let path = self.session_path(session_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut turns = self.turns_for_append(&path).await?;
        turns.push(record.clone());
        let data = serde_json::to_string_pretty(&turns)
            .map_err(|e| AgentError::Persistence(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(session_id = %session_id, turns = turns.len(), "turn persisted");
        Ok(())
    }

    async fn load_messages(&self, session_id: &str) -> Result<Vec<Message>, AgentError> {
        let path = self.session_path(session_id)?;
        Ok(self
            .read_turns(&path)
            .await?
            .pop()
            .map(|t| t.messages)
            .unwrap_or_default())
    }

    async fn list_turns(&self, session_id: &str) -> Result<Vec<TurnRecord>, AgentError> {
        let path = self.session_path(session_id)?;
        self.read_turns(&path).await
    }
}
