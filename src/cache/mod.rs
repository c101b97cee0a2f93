//! # 缓存模块
//!
//! 刷新键定义和库存快照存储

pub mod keys;
pub mod snapshot;

pub use keys::RefreshKey;
pub use snapshot::{SnapshotStore, StockSnapshot};
