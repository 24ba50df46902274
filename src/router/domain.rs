//! 能力领域：固定的闭集 + fallback 哨兵
//!
//! 目的地标识带 `_agent` 后缀（如 `erp_agent`），写入上下文时去掉后缀（`erp`）。

use std::fmt;

use serde::{Deserialize, Serialize};

const AGENT_SUFFIX: &str = "_agent";

/// 能力领域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// 订单、库存、采购、供应商
    Erp,
    /// 事件工单、服务器、部署、访问申请、IT 策略
    ItOps,
    /// 请假、薪资、福利、入职、人事制度
    Hr,
    /// 发票、预算、报销、会计
    Finance,
    /// 无法可靠归类
    Fallback,
}

impl Domain {
    /// 可路由的领域（不含 Fallback），顺序即 prompt 中的列举顺序
    pub const ROUTABLE: [Domain; 4] = [Domain::Erp, Domain::ItOps, Domain::Hr, Domain::Finance];

    pub fn id(&self) -> &'static str {
        match self {
            Domain::Erp => "erp",
            Domain::ItOps => "it_ops",
            Domain::Hr => "hr",
            Domain::Finance => "finance",
            Domain::Fallback => "fallback",
        }
    }

    /// 路由目的地标识，如 `erp_agent`；Fallback 为 `fallback`
    pub fn agent_id(&self) -> String {
        match self {
            Domain::Fallback => "fallback".to_string(),
            d => format!("{}{}", d.id(), AGENT_SUFFIX),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Domain::Erp => "orders, inventory and stock levels, purchasing, suppliers, shipments",
            Domain::ItOps => {
                "incidents and support tickets, servers, deployments, access requests, IT policy"
            }
            Domain::Hr => "leave, payroll, benefits, onboarding, HR policy",
            Domain::Finance => "invoices, budgets, expenses, accounting, payments",
            Domain::Fallback => "none of the above / not enough information",
        }
    }

    /// 宽松解析：忽略大小写、`-`/空格与 `_agent` 后缀；不在闭集内返回 None
    pub fn parse(raw: &str) -> Option<Domain> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        let base = normalized
            .strip_suffix(AGENT_SUFFIX)
            .unwrap_or(normalized.as_str());
        match base {
            "erp" => Some(Domain::Erp),
            "it_ops" | "itops" | "it" => Some(Domain::ItOps),
            "hr" => Some(Domain::Hr),
            "finance" => Some(Domain::Finance),
            "fallback" => Some(Domain::Fallback),
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Domain::Fallback)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
