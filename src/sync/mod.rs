//! # 同步模块
//!
//! 刷新协调与对外门面：单飞后台刷新、进度上报、stale-while-revalidate 读取

pub mod coordinator;
pub mod facade;
pub mod status;

pub use coordinator::{EnsureRefresh, RefreshCoordinator};
pub use facade::{FetchOutcome, SyncFacade};
pub use status::{FetchPlan, RefreshStatus};
