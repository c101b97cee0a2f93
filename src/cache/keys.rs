//! # 缓存键命名规范
//!
//! 刷新键标识一个逻辑缓存分区：租户 + 上游查询维度。
//! 快照存储和在途登记表共用同一个键。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 刷新键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefreshKey {
    /// 本地租户标识（经销商）
    pub tenant_id: i64,
    /// 上游广告主标识
    pub advertiser_id: String,
}

impl RefreshKey {
    /// 创建刷新键
    pub fn new(tenant_id: i64, advertiser_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            advertiser_id: advertiser_id.into(),
        }
    }

    /// 生成缓存键字符串 - `stock:{tenant_id}:{advertiser_id}`
    #[must_use]
    pub fn build(&self) -> String {
        format!(
            "stock:{}:{}",
            self.tenant_id,
            sanitize_advertiser(&self.advertiser_id)
        )
    }
}

impl fmt::Display for RefreshKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

/// 清理广告主标识，确保可以安全用作缓存键
fn sanitize_advertiser(advertiser_id: &str) -> String {
    advertiser_id
        .replace(['/', ':', '?', '&', '='], "_")
        .to_lowercase()
}
