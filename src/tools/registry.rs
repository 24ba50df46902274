//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / domain / execute），由 ToolRegistry 按名注册与查找。
//! 注册顺序即枚举顺序，prompt 中的工具列表依赖它保持确定。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::router::Domain;

/// 工具 trait：名称、描述（供 LLM 理解）、所属领域、异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（决策 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能与参数）
    fn description(&self) -> &str;

    /// 所属领域；None 表示跨领域通用工具
    fn domain(&self) -> Option<Domain> {
        None
    }

    /// 执行工具，失败时返回错误描述
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 工具在 prompt 中的分组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolTier {
    /// 属于主领域，优先使用
    Preferred,
    /// 属于次要领域
    Related,
    /// 其它所有工具
    Available,
}

/// prompt 中的一行工具说明
#[derive(Debug, Clone, PartialEq)]
pub struct ToolListing {
    pub name: String,
    pub description: String,
    pub domain: Option<Domain>,
    pub tier: ToolTier,
}

/// 工具注册表：只读地被所有并发轮次共享
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名工具原位替换，不改变枚举顺序
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&i) => self.tools[i] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序的工具名
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 生成 prompt 工具列表：主领域工具在前（Preferred），其余按注册顺序跟随；
    /// 次要领域只影响标注（Related），不改变顺序，也从不隐藏任何工具
    pub fn listing(&self, primary: Domain, secondary: &[Domain]) -> Vec<ToolListing> {
        let entry = |t: &Arc<dyn Tool>, tier: ToolTier| ToolListing {
            name: t.name().to_string(),
            description: t.description().to_string(),
            domain: t.domain(),
            tier,
        };

        let is_primary = |t: &Arc<dyn Tool>| !primary.is_fallback() && t.domain() == Some(primary);

        let mut out: Vec<ToolListing> = self
            .tools
            .iter()
            .filter(|t| is_primary(t))
            .map(|t| entry(t, ToolTier::Preferred))
            .collect();

        out.extend(self.tools.iter().filter(|t| !is_primary(t)).map(|t| {
            let related = t.domain().is_some_and(|d| secondary.contains(&d));
            entry(t, if related { ToolTier::Related } else { ToolTier::Available })
        }));
        out
    }
}
