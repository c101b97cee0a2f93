//! # 弹性调用器
//!
//! 用错误分类 + 有界重试包装任意上游调用。
//! 所有尝试和最终结果都带上下文标签记录，便于在不复现的情况下诊断上游抖动。

use std::time::Instant;
use tracing::{debug, info, warn};

use super::policy::RetryConfig;
use crate::error::{Result, SyncError, UpstreamError};

/// 弹性调用器
///
/// 仅瞬时/基础设施类错误会重试；分类为认证、参数或资源错误时立即传播
#[derive(Debug, Clone, Default)]
pub struct ResilientCaller {
    config: RetryConfig,
}

impl ResilientCaller {
    /// 创建弹性调用器
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// 获取重试配置
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// 以重试包装上游调用
    ///
    /// `context_label` 出现在每条日志里，标识是哪个上游操作在抖动
    pub async fn execute_with_retry<F, Fut, R>(
        &self,
        context_label: &str,
        mut operation: F,
    ) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<R>>,
    {
        let total_started = Instant::now();
        let max_attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let attempt_started = Instant::now();

            match operation().await {
                Ok(value) => {
                    debug!(
                        component = "resilient_caller",
                        context = context_label,
                        attempt = attempt,
                        duration_ms = attempt_started.elapsed().as_millis() as u64,
                        total_ms = total_started.elapsed().as_millis() as u64,
                        "Upstream call succeeded"
                    );
                    return Ok(value);
                }
                Err(e) => {
                    let kind = e.as_upstream().map(UpstreamError::kind);
                    warn!(
                        component = "resilient_caller",
                        context = context_label,
                        attempt = attempt,
                        duration_ms = attempt_started.elapsed().as_millis() as u64,
                        kind = kind.map(|k| k.as_str()),
                        error = %e,
                        "Upstream call attempt failed"
                    );

                    // 最后一次尝试：保存错误并退出循环
                    if attempt == max_attempts {
                        last_error = Some(e);
                        break;
                    }

                    if !e.is_retryable() {
                        debug!(
                            component = "resilient_caller",
                            context = context_label,
                            kind = kind.map(|k| k.as_str()),
                            "Error not retryable, propagating immediately"
                        );
                        return Err(e);
                    }

                    // 上游给出的 Retry-After 提示优先于计算的退避
                    let delay = e
                        .as_upstream()
                        .and_then(UpstreamError::retry_after)
                        .unwrap_or_else(|| self.config.compute_delay(attempt - 1));

                    info!(
                        component = "resilient_caller",
                        context = context_label,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying upstream call after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // 所有尝试都失败了，返回最后一个错误
        let err = last_error.unwrap_or_else(|| {
            SyncError::internal(format!("{context_label}所有重试尝试都失败了"))
        });
        warn!(
            component = "resilient_caller",
            context = context_label,
            attempts = max_attempts,
            total_ms = total_started.elapsed().as_millis() as u64,
            "Upstream call exhausted retries"
        );
        Err(err)
    }
}
