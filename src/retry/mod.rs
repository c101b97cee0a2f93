//! # 重试模块
//!
//! 弹性调用层：错误分类、指数退避 + 抖动、统一的尝试日志

pub mod caller;
pub mod policy;

pub use caller::ResilientCaller;
pub use policy::RetryConfig;
