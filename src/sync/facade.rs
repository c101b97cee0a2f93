//! # 同步门面
//!
//! 系统其余部分消费同步层的唯一入口：
//! 读取立即返回缓存数据，同时无条件触发后台刷新（stale-while-revalidate）。

use std::sync::Arc;
use tracing::debug;

use super::coordinator::RefreshCoordinator;
use super::status::{FetchPlan, RefreshStatus};
use crate::cache::{RefreshKey, SnapshotStore, StockSnapshot};

/// `fetch` 的返回
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// 当前缓存的快照（可能为空，也可能已过时）
    pub immediate: Option<Arc<StockSnapshot>>,
    /// 是否有刷新在途
    pub is_refreshing: bool,
}

/// 同步门面
///
/// 门面不承诺返回值反映最新的上游状态：读与在途刷新的写并发时，
/// 观察到新旧快照都是允许的（最终一致）。
pub struct SyncFacade {
    snapshots: Arc<SnapshotStore>,
    coordinator: Arc<RefreshCoordinator>,
    plan: FetchPlan,
}

impl SyncFacade {
    /// 创建同步门面
    ///
    /// `plan` 是每次读取触发刷新时使用的拉取计划
    #[must_use]
    pub const fn new(
        snapshots: Arc<SnapshotStore>,
        coordinator: Arc<RefreshCoordinator>,
        plan: FetchPlan,
    ) -> Self {
        Self {
            snapshots,
            coordinator,
            plan,
        }
    }

    /// 读取缓存并触发后台刷新
    ///
    /// 总是立即返回快照存储里的内容，不等待刷新；
    /// 每次读取都无条件调用 `ensure_refresh`，单飞保证不会产生重复上游负载。
    /// 这里刻意不做 TTL 判断：新鲜度策略是"永远后台再验证，永不阻塞读取"。
    #[must_use]
    pub fn fetch(&self, key: &RefreshKey) -> FetchOutcome {
        let immediate = self.snapshots.read(key);

        let ensure = self.coordinator.ensure_refresh(key, self.plan.clone());
        debug!(
            component = "sync_facade",
            key = %key,
            cached = immediate.is_some(),
            piggybacked = ensure.already_running,
            "Serving stock from cache with background revalidation"
        );

        // 刷新可能在本调用内瞬间结束，以登记表的观测为准
        let is_refreshing = self.coordinator.get_status(key).is_some();

        FetchOutcome {
            immediate,
            is_refreshing,
        }
    }

    /// 查询刷新进度（轮询端点用）
    #[must_use]
    pub fn status(&self, key: &RefreshKey) -> Option<RefreshStatus> {
        self.coordinator.get_status(key)
    }

    /// 显式清除某个分区的缓存
    pub fn clear(&self, key: &RefreshKey) -> bool {
        self.snapshots.clear(key)
    }
}
