//! 编排图：节点枚举、纯转移函数、单轮执行器

pub mod context;
pub mod executor;
pub mod node;

pub use context::{EngineContext, EngineSettings};
pub use executor::{degraded_message, GraphExecutor};
pub use node::{transition, Node};
