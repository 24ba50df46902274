//! 领域路由：闭集领域与一次结构化分类

pub mod domain;
#[allow(clippy::module_inception)]
pub mod router;

pub use domain::Domain;
pub use router::{DomainRouter, RouteDecision, RouterConfig};
