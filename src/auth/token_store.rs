//! # Token 缓存
//!
//! 缓存上游颁发的短期访问令牌，按凭据指纹索引。
//! 令牌剩余有效期低于安全边际时按缺失处理并剔除，避免用一个请求中途过期的令牌。

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

/// 上游凭据
///
/// 只在构造缓存键和调用认证接口时使用，指纹中不保留原始密钥
#[derive(Debug, Clone)]
pub struct UpstreamCredentials {
    /// 客户端标识
    pub client_id: String,
    /// 客户端密钥
    pub client_secret: String,
    /// 目标上游的基础 URL
    pub base_url: String,
}

impl UpstreamCredentials {
    /// 创建凭据
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: base_url.into(),
        }
    }

    /// 计算凭据指纹，作为 token 缓存键
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!("{}:{}:{}", self.client_id, self.client_secret, self.base_url).as_bytes(),
        );
        hex::encode(hasher.finalize())
    }
}

/// 缓存的访问令牌
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// 令牌值
    pub token_value: String,
    /// 过期时间
    pub expires_at: DateTime<Utc>,
    /// 颁发时间
    pub issued_at: DateTime<Utc>,
}

impl CachedToken {
    /// 在给定时刻是否仍然有效（剩余有效期必须超过安全边际）
    fn is_valid_at(&self, now: DateTime<Utc>, safety_margin: Duration) -> bool {
        self.expires_at - now > safety_margin
    }
}

/// Token 缓存统计信息
///
/// 仅用于诊断，统计过程不加全局锁，数值可能与瞬时真实状态有偏差
#[derive(Debug, Clone, Copy)]
pub struct TokenStoreStats {
    /// 缓存条目总数
    pub total: usize,
    /// 当前有效条目数
    pub valid: usize,
}

/// 进程级 token 缓存
///
/// 纯内存实现，进程重启后所有身份需要重新认证。
/// 相对于缓存命中节省的上游调用，重新颁发的成本可以接受。
pub struct TokenStore {
    entries: DashMap<String, CachedToken>,
    safety_margin: Duration,
}

impl TokenStore {
    /// 创建 token 缓存
    ///
    /// `safety_margin_minutes` 为过期安全边际（分钟）
    #[must_use]
    pub fn new(safety_margin_minutes: i64) -> Self {
        Self {
            entries: DashMap::new(),
            safety_margin: Duration::minutes(safety_margin_minutes),
        }
    }

    /// 获取有效令牌
    ///
    /// 令牌不存在或剩余有效期不足安全边际时返回 `None`，过期条目随即被剔除
    #[must_use]
    pub fn get_token(&self, identity: &str) -> Option<CachedToken> {
        self.get_token_at(identity, Utc::now())
    }

    /// 在指定时刻获取有效令牌（主要用于测试）
    #[must_use]
    pub fn get_token_at(&self, identity: &str, now: DateTime<Utc>) -> Option<CachedToken> {
        let stale = match self.entries.get(identity) {
            None => return None,
            Some(entry) => {
                if entry.is_valid_at(now, self.safety_margin) {
                    return Some(entry.clone());
                }
                true
            }
        };

        // 读守卫已释放，可以安全地剔除过期条目
        if stale {
            self.entries.remove(identity);
            debug!(
                component = "token_store",
                identity = %&identity[..identity.len().min(8)],
                "Evicted expired token"
            );
        }
        None
    }

    /// 写入令牌，无条件覆盖
    pub fn set_token(&self, identity: &str, token_value: String, expires_at: DateTime<Utc>) {
        let token = CachedToken {
            token_value,
            expires_at,
            issued_at: Utc::now(),
        };
        self.entries.insert(identity.to_string(), token);
        debug!(
            component = "token_store",
            identity = %&identity[..identity.len().min(8)],
            expires_at = %expires_at,
            "Cached issued token"
        );
    }

    /// 移除令牌
    ///
    /// 上游返回认证错误时调用，迫使下一个调用方重新颁发
    pub fn invalidate(&self, identity: &str) -> bool {
        let removed = self.entries.remove(identity).is_some();
        if removed {
            debug!(
                component = "token_store",
                identity = %&identity[..identity.len().min(8)],
                "Invalidated cached token"
            );
        }
        removed
    }

    /// 获取缓存统计信息
    #[must_use]
    pub fn stats(&self) -> TokenStoreStats {
        let now = Utc::now();
        let total = self.entries.len();
        let valid = self
            .entries
            .iter()
            .filter(|entry| entry.is_valid_at(now, self.safety_margin))
            .count();
        TokenStoreStats { total, valid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TokenStore {
        TokenStore::new(5)
    }

    #[test]
    fn test_fingerprint_stable_and_secret_free() {
        let creds = UpstreamCredentials::new("client", "secret", "https://api.example");
        let fp1 = creds.fingerprint();
        let fp2 = creds.fingerprint();

        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 64); // SHA256产生64字符的hex字符串
        assert!(!fp1.contains("secret"));

        let other = UpstreamCredentials::new("client", "other-secret", "https://api.example");
        assert_ne!(fp1, other.fingerprint());
    }

    #[test]
    fn test_safety_margin_boundary() {
        let store = store();
        let now = Utc::now();

        // 剩余4分钟：低于5分钟边际，视为无效
        store.set_token("id-a", "tok-a".to_string(), now + Duration::minutes(4));
        assert!(store.get_token_at("id-a", now).is_none());

        // 剩余6分钟：高于边际，有效
        store.set_token("id-b", "tok-b".to_string(), now + Duration::minutes(6));
        let token = store.get_token_at("id-b", now).expect("应当有效");
        assert_eq!(token.token_value, "tok-b");
    }

    #[test]
    fn test_expiry_scenario_evicts_entry() {
        let store = store();
        let issued_at = Utc::now();

        store.set_token(
            "identity",
            "tok".to_string(),
            issued_at + Duration::seconds(3600),
        );
        assert!(store.get_token_at("identity", issued_at).is_some());

        // 模拟时间推进3596秒，仅剩4秒，低于5分钟边际
        let later = issued_at + Duration::seconds(3596);
        assert!(store.get_token_at("identity", later).is_none());

        // 条目已被剔除
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn test_invalidate_forces_reissue() {
        let store = store();
        let now = Utc::now();
        store.set_token("identity", "tok".to_string(), now + Duration::hours(1));

        assert!(store.invalidate("identity"));
        assert!(store.get_token_at("identity", now).is_none());
        // 再次失效是幂等的
        assert!(!store.invalidate("identity"));
    }

    #[test]
    fn test_set_token_overwrites() {
        let store = store();
        let now = Utc::now();
        store.set_token("identity", "old".to_string(), now + Duration::hours(1));
        store.set_token("identity", "new".to_string(), now + Duration::hours(2));

        let token = store.get_token_at("identity", now).expect("应当有效");
        assert_eq!(token.token_value, "new");
        assert_eq!(store.stats().total, 1);
    }

    #[test]
    fn test_stats_counts_valid_entries() {
        let store = store();
        let now = Utc::now();
        store.set_token("a", "tok".to_string(), now + Duration::hours(1));
        store.set_token("b", "tok".to_string(), now - Duration::hours(1));

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.valid, 1);
    }
}
