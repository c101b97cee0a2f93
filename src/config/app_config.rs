//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 上游市场 API 配置
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// 重试配置
    #[serde(default)]
    pub retry: RetrySettings,
    /// Token 缓存配置
    #[serde(default)]
    pub token_cache: TokenCacheConfig,
    /// 刷新配置
    #[serde(default)]
    pub refresh: RefreshSettings,
}

/// 上游市场 API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API 基础 URL
    pub base_url: String,
    /// 单次 HTTP 请求超时时间（秒）
    pub timeout_seconds: u64,
    /// 认证接口路径
    pub auth_path: String,
    /// 库存列表接口路径
    pub stock_path: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.marketplace.example".to_string(),
            timeout_seconds: 30,
            auth_path: "/auth/token".to_string(),
            stock_path: "/stock".to_string(),
        }
    }
}

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    /// 基础退避延迟（毫秒）
    pub base_delay_ms: u64,
    /// 最大退避延迟（毫秒）
    pub max_delay_ms: u64,
    /// 退避倍率
    pub backoff_multiplier: f64,
    /// 是否启用抖动
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,          // 最多重试3次
            base_delay_ms: 1000,     // 基础延迟1秒
            max_delay_ms: 10000,     // 延迟上限10秒
            backoff_multiplier: 2.0, // 每次翻倍
            jitter: true,            // 避免多租户同步重试风暴
        }
    }
}

/// Token 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCacheConfig {
    /// 过期安全边际（分钟），token 剩余有效期低于该值视为无效
    pub safety_margin_minutes: i64,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            safety_margin_minutes: 5,
        }
    }
}

/// 刷新配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// 每页条目数
    pub page_size: u32,
    /// 后台模式单次运行的页数预算
    pub background_max_pages: u32,
    /// 后台模式单次运行的时间预算（秒）
    pub background_time_budget_seconds: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            background_max_pages: 20,
            background_time_budget_seconds: 50, // 托管环境的执行时限之内
        }
    }
}
