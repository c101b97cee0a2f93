//! # 重试策略
//!
//! 指数退避的延迟计算，带上限和抖动

use std::time::Duration;

use crate::config::RetrySettings;

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
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

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            backoff_multiplier: settings.backoff_multiplier,
            jitter: settings.jitter,
        }
    }
}

impl RetryConfig {
    /// 计算第 `attempt` 次重试前的退避延迟（`attempt` 从 0 开始）
    ///
    /// 延迟为 `min(max_delay, base_delay * multiplier^attempt)`；
    /// 启用抖动时再乘以 [0.5, 1.0) 区间的均匀随机因子，
    /// 避免多租户在上游恢复后同步发起重试风暴
    #[must_use]
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let exponential = (self.base_delay_ms as f64)
            * self
                .backoff_multiplier
                .powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        #[allow(clippy::cast_precision_loss)]
        let capped = exponential.min(self.max_delay_ms as f64);

        let with_jitter = if self.jitter {
            capped * (0.5 + fastrand::f64() * 0.5)
        } else {
            capped
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(with_jitter as u64)
    }
}
