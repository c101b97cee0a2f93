//! # 上游测试替身
//!
//! 脚本化的市场 API 实现：记录调用次数，按脚本顺序注入失败，
//! 可选的每页延迟用来稳定并发测试的时间窗口

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::auth::UpstreamCredentials;
use crate::error::{Result, UpstreamError};
use crate::upstream::{IssuedToken, Marketplace, StockPage, StockQuery, StockVehicle};

/// 脚本化的上游市场替身
pub struct MockMarketplace {
    pages: Vec<Vec<StockVehicle>>,
    page_delay: Duration,
    token_expires_in: i64,
    auth_calls: AtomicU32,
    list_calls: AtomicU32,
    sequences_started: AtomicU32,
    auth_failures: Mutex<VecDeque<UpstreamError>>,
    list_failures: Mutex<VecDeque<UpstreamError>>,
}

impl MockMarketplace {
    /// 用给定的分页数据创建替身
    #[must_use]
    pub fn with_pages(pages: Vec<Vec<StockVehicle>>) -> Self {
        Self {
            pages,
            page_delay: Duration::ZERO,
            token_expires_in: 3600,
            auth_calls: AtomicU32::new(0),
            list_calls: AtomicU32::new(0),
            sequences_started: AtomicU32::new(0),
            auth_failures: Mutex::new(VecDeque::new()),
            list_failures: Mutex::new(VecDeque::new()),
        }
    }

    /// 设置每页的人工延迟
    #[must_use]
    pub const fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// 设置颁发令牌的有效期（秒）
    #[must_use]
    pub const fn with_token_expires_in(mut self, seconds: i64) -> Self {
        self.token_expires_in = seconds;
        self
    }

    /// 追加一次认证失败（在后续成功前按序返回）
    pub fn queue_auth_failure(&self, err: UpstreamError) {
        self.auth_failures.lock().unwrap().push_back(err);
    }

    /// 追加一次列表失败
    pub fn queue_list_failure(&self, err: UpstreamError) {
        self.list_failures.lock().unwrap().push_back(err);
    }

    /// 认证调用次数
    #[must_use]
    pub fn auth_calls(&self) -> u32 {
        self.auth_calls.load(Ordering::SeqCst)
    }

    /// 分页调用次数
    #[must_use]
    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// 启动的完整分页序列数（以第1页的调用计）
    #[must_use]
    pub fn sequences_started(&self) -> u32 {
        self.sequences_started.load(Ordering::SeqCst)
    }

    /// 便捷构造一条车辆记录
    #[must_use]
    pub fn vehicle(id: &str) -> StockVehicle {
        StockVehicle {
            vehicle_id: id.to_string(),
            make: "Skoda".to_string(),
            model: "Octavia".to_string(),
            variant: Some("Combi".to_string()),
            first_registration: Some("2021-03".to_string()),
            mileage_km: Some(58_000),
            price_cents: Some(1_890_000),
            currency: Some("EUR".to_string()),
            fuel_type: Some("diesel".to_string()),
            vin: None,
        }
    }
}

#[async_trait]
impl Marketplace for MockMarketplace {
    async fn authenticate(&self, _credentials: &UpstreamCredentials) -> Result<IssuedToken> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.auth_failures.lock().unwrap().pop_front() {
            return Err(err.into());
        }
        Ok(IssuedToken {
            access_token: "mock-token".to_string(),
            expires_in: self.token_expires_in,
        })
    }

    async fn list_stock(&self, _token: &str, _query: &StockQuery, page: u32) -> Result<StockPage> {
        if page == 1 {
            self.sequences_started.fetch_add(1, Ordering::SeqCst);
        }
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }

        if let Some(err) = self.list_failures.lock().unwrap().pop_front() {
            return Err(err.into());
        }

        #[allow(clippy::cast_possible_truncation)]
        let total_pages = self.pages.len().max(1) as u32;
        let items = self
            .pages
            .get((page - 1) as usize)
            .cloned()
            .unwrap_or_default();

        Ok(StockPage {
            items,
            current_page: page,
            total_pages,
        })
    }
}
