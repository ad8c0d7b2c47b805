//! Triage - 医疗多专家对话编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、会话状态模型、引擎构建器、临时产物清理
//! - **gates**: 语言边界、安全闸门、置信度回退、人工复核
//! - **graph**: 编排图节点、转移函数与单轮执行器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: 日志初始化与用量汇总
//! - **router**: 专家路由（LLM / 规则）与路由约束
//! - **service**: 对外的提交轮次 / 提交复核接口
//! - **session**: 会话存储（内存 / SQLite）与线程锁
//! - **specialists**: 专家接口、注册表与内置专家

pub mod config;
pub mod core;
pub mod gates;
pub mod graph;
pub mod llm;
pub mod observability;
pub mod router;
pub mod service;
pub mod session;
pub mod specialists;

pub use crate::core::{EngineBuilder, TriageError};
pub use service::{
    TriageService, TurnRequest, TurnResponse, TurnStatus, ValidationDecision, ValidationRequest,
};
