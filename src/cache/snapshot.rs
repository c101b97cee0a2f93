//! # 快照存储
//!
//! 上游库存数据的进程级缓存，按刷新键索引。
//! 纯键值存储：新鲜度判断属于调用方（门面层），这里不做任何时间逻辑，
//! 因而可以脱离时间独立测试。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::keys::RefreshKey;
use crate::upstream::StockVehicle;

/// 库存快照
///
/// 每次成功刷新整体替换，失败的刷新不会留下部分数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSnapshot {
    /// 所属刷新键
    pub key: RefreshKey,
    /// 车辆记录
    pub vehicles: Vec<StockVehicle>,
    /// 缓存写入时间
    pub cached_at: DateTime<Utc>,
}

/// 快照存储
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: DashMap<RefreshKey, Arc<StockSnapshot>>,
}

impl SnapshotStore {
    /// 创建快照存储
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取快照
    #[must_use]
    pub fn read(&self, key: &RefreshKey) -> Option<Arc<StockSnapshot>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// 写入快照，整体替换该键下的全部数据
    ///
    /// 返回写入时间戳，供写后验证比对
    pub fn write(&self, key: &RefreshKey, vehicles: Vec<StockVehicle>) -> DateTime<Utc> {
        let cached_at = Utc::now();
        let count = vehicles.len();
        let snapshot = Arc::new(StockSnapshot {
            key: key.clone(),
            vehicles,
            cached_at,
        });
        self.entries.insert(key.clone(), snapshot);
        debug!(
            component = "snapshot_store",
            key = %key,
            vehicles = count,
            "Replaced stock snapshot"
        );
        cached_at
    }

    /// 清除快照
    pub fn clear(&self, key: &RefreshKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// 当前缓存的分区数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 缓存是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(id: &str) -> StockVehicle {
        StockVehicle {
            vehicle_id: id.to_string(),
            make: "VW".to_string(),
            model: "Golf".to_string(),
            variant: None,
            first_registration: None,
            mileage_km: Some(42_000),
            price_cents: Some(1_599_000),
            currency: Some("EUR".to_string()),
            fuel_type: None,
            vin: None,
        }
    }

    #[test]
    fn test_read_absent_key() {
        let store = SnapshotStore::new();
        assert!(store.read(&RefreshKey::new(1, "adv")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let store = SnapshotStore::new();
        let key = RefreshKey::new(1, "adv");

        let cached_at = store.write(&key, vec![vehicle("a"), vehicle("b")]);
        let snapshot = store.read(&key).expect("写入后应可读取");

        assert_eq!(snapshot.vehicles.len(), 2);
        assert_eq!(snapshot.cached_at, cached_at);
        assert_eq!(snapshot.key, key);
    }

    #[test]
    fn test_write_replaces_wholesale() {
        let store = SnapshotStore::new();
        let key = RefreshKey::new(1, "adv");

        store.write(&key, vec![vehicle("a"), vehicle("b"), vehicle("c")]);
        store.write(&key, vec![vehicle("d")]);

        let snapshot = store.read(&key).expect("应当存在");
        assert_eq!(snapshot.vehicles.len(), 1);
        assert_eq!(snapshot.vehicles[0].vehicle_id, "d");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_removes_only_target_key() {
        let store = SnapshotStore::new();
        let key_a = RefreshKey::new(1, "adv");
        let key_b = RefreshKey::new(2, "adv");

        store.write(&key_a, vec![vehicle("a")]);
        store.write(&key_b, vec![vehicle("b")]);

        assert!(store.clear(&key_a));
        assert!(!store.clear(&key_a));
        assert!(store.read(&key_a).is_none());
        assert!(store.read(&key_b).is_some());
    }
}
