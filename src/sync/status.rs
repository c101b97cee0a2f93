//! # 刷新状态与拉取计划

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::config::RefreshSettings;

/// 刷新状态
///
/// 进程内瞬态数据，按刷新键登记在途表。刷新结束后终态会短暂可见，
/// 随即条目被回收；轮询方拿到"不存在"应理解为空闲/已完成，
/// 并结合快照的 `cached_at` 展示最近更新时间。
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    /// 是否仍在刷新
    pub is_refreshing: bool,
    /// 进度（0-100）
    pub progress: u8,
    /// 已完成的页号
    pub current_page: u32,
    /// 总页数（首页返回前为0）
    pub total_pages: u32,
    /// 预计剩余秒数
    pub estimated_seconds_remaining: Option<u64>,
    /// 最近一次更新时间
    pub last_updated: DateTime<Utc>,
    /// 失败信息（仅失败终态存在）
    pub error: Option<String>,
    /// 本次运行的标识，取消与接管判定用
    #[serde(skip)]
    pub(crate) run_id: u64,
}

impl RefreshStatus {
    /// 刷新开始时的初始状态
    pub(crate) fn started(run_id: u64) -> Self {
        Self {
            is_refreshing: true,
            progress: 0,
            current_page: 0,
            total_pages: 0,
            estimated_seconds_remaining: None,
            last_updated: Utc::now(),
            error: None,
            run_id,
        }
    }

    /// 记录一页完成
    pub(crate) fn record_page(&mut self, current_page: u32, total_pages: u32, elapsed: Duration) {
        self.current_page = current_page;
        self.total_pages = total_pages;
        self.progress = progress_percent(current_page, total_pages);
        self.estimated_seconds_remaining = estimate_remaining(current_page, total_pages, elapsed);
        self.last_updated = Utc::now();
    }

    /// 记录成功终态
    pub(crate) fn record_completed(&mut self) {
        self.is_refreshing = false;
        self.progress = 100;
        self.estimated_seconds_remaining = None;
        self.last_updated = Utc::now();
    }

    /// 记录失败终态
    pub(crate) fn record_failed(&mut self, message: String) {
        self.is_refreshing = false;
        self.error = Some(message);
        self.estimated_seconds_remaining = None;
        self.last_updated = Utc::now();
    }
}

/// 计算进度百分比
fn progress_percent(current_page: u32, total_pages: u32) -> u8 {
    if total_pages == 0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = (f64::from(current_page) / f64::from(total_pages) * 100.0) as u8;
    percent.min(100)
}

/// 按已用时间和剩余页数估算剩余时间
fn estimate_remaining(current_page: u32, total_pages: u32, elapsed: Duration) -> Option<u64> {
    if current_page == 0 || total_pages <= current_page {
        return None;
    }
    let per_page = elapsed.as_secs_f64() / f64::from(current_page);
    let remaining = per_page * f64::from(total_pages - current_page);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(remaining.ceil() as u64)
}

/// 拉取计划
///
/// 后台模式通过页数和墙钟预算把一次长刷新拆成多个短批次，
/// 以便在托管环境的执行时限内完成
#[derive(Debug, Clone)]
pub struct FetchPlan {
    /// 每页条目数
    pub page_size: u32,
    /// 单次运行的页数预算
    pub max_pages: Option<u32>,
    /// 单次运行的墙钟时间预算
    pub time_budget: Option<Duration>,
}

impl FetchPlan {
    /// 交互式计划：完整拉取，不设预算
    #[must_use]
    pub const fn interactive(page_size: u32) -> Self {
        Self {
            page_size,
            max_pages: None,
            time_budget: None,
        }
    }

    /// 后台计划：超出预算时提前停止，部分结果按完成处理
    #[must_use]
    pub const fn background(settings: &RefreshSettings) -> Self {
        Self {
            page_size: settings.page_size,
            max_pages: Some(settings.background_max_pages),
            time_budget: Some(Duration::from_secs(
                settings.background_time_budget_seconds,
            )),
        }
    }

    /// 预算是否已经用尽
    pub(crate) fn budget_exhausted(&self, pages_fetched: u32, elapsed: Duration) -> bool {
        if self.max_pages.is_some_and(|max| pages_fetched >= max) {
            return true;
        }
        self.time_budget.is_some_and(|budget| elapsed >= budget)
    }
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self::interactive(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(1, 4), 25);
        assert_eq!(progress_percent(4, 4), 100);
        // 总页数缩水时不超过100
        assert_eq!(progress_percent(5, 4), 100);
    }

    #[test]
    fn test_estimate_remaining() {
        // 2页耗时10秒 → 每页5秒，剩余3页约15秒
        assert_eq!(
            estimate_remaining(2, 5, Duration::from_secs(10)),
            Some(15)
        );
        assert_eq!(estimate_remaining(0, 5, Duration::from_secs(10)), None);
        assert_eq!(estimate_remaining(5, 5, Duration::from_secs(10)), None);
    }

    #[test]
    fn test_background_plan_from_settings() {
        let plan = FetchPlan::background(&RefreshSettings::default());
        assert_eq!(plan.page_size, 100);
        assert_eq!(plan.max_pages, Some(20));
        assert_eq!(plan.time_budget, Some(Duration::from_secs(50)));
    }

    #[test]
    fn test_budget_exhausted() {
        let plan = FetchPlan {
            page_size: 50,
            max_pages: Some(3),
            time_budget: Some(Duration::from_secs(30)),
        };

        assert!(!plan.budget_exhausted(2, Duration::from_secs(1)));
        assert!(plan.budget_exhausted(3, Duration::from_secs(1)));
        assert!(plan.budget_exhausted(1, Duration::from_secs(31)));

        let unlimited = FetchPlan::interactive(50);
        assert!(!unlimited.budget_exhausted(10_000, Duration::from_secs(3600)));
    }
}
