//! Hive - 企业多领域智能体编排核心
//!
//! 模块划分：
//! - **agent**: 无头运行时（组装编排图、选择会话存储、处理单条消息）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、编排图（Router -> ReasoningLoop / Fallback）与构建器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、输出形状约束
//! - **memory**: 消息、token 估算、上下文压缩、会话 / 审计存储
//! - **observability**: 日志初始化
//! - **react**: 单轮状态、Planner、prompt 构造、ReAct 主循环
//! - **router**: 能力领域与领域路由器
//! - **tools**: 工具注册表、调度器、知识库检索工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod router;
pub mod tools;
