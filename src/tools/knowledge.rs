//! 知识库检索工具：search_knowledge_base(query, domain)
//!
//! 对推理循环而言只是一个普通的命名工具；检索与排序由 KnowledgeBase 实现决定。
//! InMemoryKnowledgeBase 用关键词命中计分，供本地运行与测试使用。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::router::Domain;
use crate::tools::Tool;

/// 知识库中的一篇文档
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub domain: Option<Domain>,
}

/// 检索命中
#[derive(Debug, Clone)]
pub struct KnowledgeHit {
    pub title: String,
    pub snippet: String,
    pub score: f32,
}

/// 知识检索后端（向量库、全文索引等的边界接口）
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn search(
        &self,
        query: &str,
        domain: Option<Domain>,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, String>;
}

/// 内存知识库：按查询词在标题 / 正文中的命中数计分
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeBase {
    docs: Vec<KnowledgeDoc>,
}

impl InMemoryKnowledgeBase {
    pub fn new(docs: Vec<KnowledgeDoc>) -> Self {
        Self { docs }
    }

    /// 从 JSON 文件（KnowledgeDoc 数组）加载
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&data)?))
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    async fn search(
        &self,
        query: &str,
        domain: Option<Domain>,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, String> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<KnowledgeHit> = self
            .docs
            .iter()
            .filter(|d| match (domain, d.domain) {
                (Some(want), Some(have)) => want == have,
                _ => true,
            })
            .filter_map(|d| {
                let haystack = format!("{} {}", d.title, d.body).to_lowercase();
                let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (matched > 0).then(|| KnowledgeHit {
                    title: d.title.clone(),
                    snippet: crate::memory::truncate_chars(&d.body, 300),
                    score: matched as f32 / terms.len() as f32,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

/// search_knowledge_base 工具
pub struct KnowledgeSearchTool {
    kb: Arc<dyn KnowledgeBase>,
    max_results: usize,
}

impl KnowledgeSearchTool {
    pub const NAME: &'static str = "search_knowledge_base";

    pub fn new(kb: Arc<dyn KnowledgeBase>, max_results: usize) -> Self {
        Self { kb, max_results }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search internal documents and policies. Args: {\"query\": \"text\", \"domain\": \"erp|it_ops|hr|finance\" (optional)}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| "missing required argument `query`".to_string())?;
        let domain = args
            .get("domain")
            .and_then(|v| v.as_str())
            .and_then(Domain::parse)
            .filter(|d| !d.is_fallback());

        let hits = self.kb.search(query, domain, self.max_results).await?;
        if hits.is_empty() {
            return Ok(format!("No documents matched \"{}\".", query));
        }

        Ok(hits
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{}. {} (score {:.2})\n{}", i + 1, h.title, h.score, h.snippet))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kb() -> Arc<dyn KnowledgeBase> {
        Arc::new(InMemoryKnowledgeBase::new(vec![
            KnowledgeDoc {
                title: "VPN access policy".to_string(),
                body: "Contractors request VPN access through an IT ticket.".to_string(),
                domain: Some(Domain::ItOps),
            },
            KnowledgeDoc {
                title: "Reorder policy".to_string(),
                body: "Stock is reordered when it falls below the safety level.".to_string(),
                domain: Some(Domain::Erp),
            },
            KnowledgeDoc {
                title: "Travel policy".to_string(),
                body: "Travel must be approved before booking.".to_string(),
                domain: None,
            },
        ]))
    }

    #[tokio::test]
    async fn test_search_ranks_by_term_hits() {
        let hits = kb().search("VPN access policy", None, 5).await.unwrap();
        assert_eq!(hits[0].title, "VPN access policy");
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_domain_filter_keeps_shared_docs() {
        let hits = kb().search("policy", Some(Domain::Erp), 5).await.unwrap();
        let titles: Vec<_> = hits.iter().map(|h| h.title.as_str()).collect();
        assert!(titles.contains(&"Reorder policy"));
        assert!(titles.contains(&"Travel policy"));
        assert!(!titles.contains(&"VPN access policy"));
    }

    #[tokio::test]
    async fn test_tool_requires_query() {
        let tool = KnowledgeSearchTool::new(kb(), 3);
        assert!(tool.execute(json!({})).await.is_err());
        let out = tool
            .execute(json!({"query": "reorder stock", "domain": "erp_agent"}))
            .await
            .unwrap();
        assert!(out.starts_with("1. Reorder policy"));
    }

    #[tokio::test]
    async fn test_tool_reports_no_match() {
        let tool = KnowledgeSearchTool::new(kb(), 3);
        let out = tool.execute(json!({"query": "quantum"})).await.unwrap();
        assert!(out.contains("No documents matched"));
    }
}
