//! # Stock Sync 核心库
//!
//! 经销商平台的外部数据同步层：在慢速、限流、偶发不可靠的上游市场 API
//! 之上维护本地库存缓存。读取永远立即命中缓存，刷新在后台单飞执行，
//! 令牌生命周期、重试与进度上报由各组件分工完成。

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod sync;
pub mod testing;
pub mod upstream;

// Re-export commonly used types
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use sync::{FetchOutcome, SyncFacade};
