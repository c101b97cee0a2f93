//! # 刷新协调器
//!
//! 编排一个缓存分区的后台刷新：保证每个键同时至多一个刷新在途，
//! 上报进度，并发布成功/失败终态供轮询方读取。
//!
//! 状态机（按键）：Idle → Running → (Completed | Failed) → Idle。
//! 终态写入登记表后条目随即被移除，外部通过 `get_status` 有一个
//! 短暂但确定的窗口观察到终态。

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::status::{FetchPlan, RefreshStatus};
use crate::auth::{CachedToken, TokenStore, UpstreamCredentials};
use crate::cache::{RefreshKey, SnapshotStore};
use crate::error::{ErrorKind, Result, UpstreamError};
use crate::retry::{ResilientCaller, RetryConfig};
use crate::upstream::{Marketplace, StockQuery, StockVehicle};

/// `ensure_refresh` 的结果
#[derive(Debug, Clone, Copy)]
pub struct EnsureRefresh {
    /// 该键是否已有刷新在途（本次调用挂靠而非新启动）
    pub already_running: bool,
}

/// 刷新协调器
///
/// 在途登记表是唯一需要"检查并写入"原子性的结构：
/// 登记用 `DashMap::entry` 一步完成"不存在则插入"，
/// 并且在所有路径（成功、失败、取消）上被移除，
/// 否则一个键会永久卡在"刷新中"。
pub struct RefreshCoordinator {
    snapshots: Arc<SnapshotStore>,
    tokens: Arc<TokenStore>,
    marketplace: Arc<dyn Marketplace>,
    credentials: UpstreamCredentials,
    caller: ResilientCaller,
    in_flight: Arc<DashMap<RefreshKey, RefreshStatus>>,
    run_counter: AtomicU64,
}

impl RefreshCoordinator {
    /// 创建刷新协调器
    #[must_use]
    pub fn new(
        snapshots: Arc<SnapshotStore>,
        tokens: Arc<TokenStore>,
        marketplace: Arc<dyn Marketplace>,
        credentials: UpstreamCredentials,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            snapshots,
            tokens,
            marketplace,
            credentials,
            caller: ResilientCaller::new(retry_config),
            in_flight: Arc::new(DashMap::new()),
            run_counter: AtomicU64::new(0),
        }
    }

    /// 确保该键有一个刷新在途
    ///
    /// 已有刷新时立即返回挂靠结果，不产生重复的上游负载；
    /// 否则登记该键并启动分离的后台任务。本方法不等待刷新完成，
    /// 刷新结果只通过登记表和快照存储回传。
    pub fn ensure_refresh(&self, key: &RefreshKey, plan: FetchPlan) -> EnsureRefresh {
        let run_id = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(
                    component = "refresh_coordinator",
                    key = %key,
                    "Refresh already in flight, piggybacking"
                );
                return EnsureRefresh {
                    already_running: true,
                };
            }
            Entry::Vacant(vacant) => {
                let run_id = self.run_counter.fetch_add(1, Ordering::Relaxed) + 1;
                vacant.insert(RefreshStatus::started(run_id));
                run_id
            }
        };

        info!(
            component = "refresh_coordinator",
            key = %key,
            run_id = run_id,
            "Starting background stock refresh"
        );

        let run = RefreshRun {
            snapshots: Arc::clone(&self.snapshots),
            tokens: Arc::clone(&self.tokens),
            marketplace: Arc::clone(&self.marketplace),
            credentials: self.credentials.clone(),
            caller: self.caller.clone(),
            in_flight: Arc::clone(&self.in_flight),
            key: key.clone(),
            plan,
            run_id,
        };
        tokio::spawn(run.execute());

        EnsureRefresh {
            already_running: false,
        }
    }

    /// 查询刷新状态
    ///
    /// 不存在表示从未刷新，或刷新已结束且终态已被回收；
    /// 调用方结合快照的 `cached_at` 判断最近更新时间
    #[must_use]
    pub fn get_status(&self, key: &RefreshKey) -> Option<RefreshStatus> {
        self.in_flight.get(key).map(|status| status.value().clone())
    }

    /// 取消刷新（尽力而为）
    ///
    /// 分页拉取无法抢占，这里只移除登记让状态上报停止；
    /// 在途的上游调用继续执行，其结果在写入前的复查中被丢弃
    pub fn cancel(&self, key: &RefreshKey) -> bool {
        let removed = self.in_flight.remove(key).is_some();
        if removed {
            info!(
                component = "refresh_coordinator",
                key = %key,
                "Cancelled refresh bookkeeping, in-flight result will be discarded"
            );
        }
        removed
    }

    /// 当前在途刷新数量（诊断用）
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// 分页拉取的结果
enum RunOutcome {
    /// 拉取完成（可能因预算提前停止）
    Fetched {
        vehicles: Vec<StockVehicle>,
        pages_fetched: u32,
        stopped_early: bool,
    },
    /// 登记被移除，本次运行作废
    Cancelled,
}

/// 一次后台刷新运行
///
/// 持有各组件的克隆句柄，独立于协调器和发起方存活（分离任务）
struct RefreshRun {
    snapshots: Arc<SnapshotStore>,
    tokens: Arc<TokenStore>,
    marketplace: Arc<dyn Marketplace>,
    credentials: UpstreamCredentials,
    caller: ResilientCaller,
    in_flight: Arc<DashMap<RefreshKey, RefreshStatus>>,
    key: RefreshKey,
    plan: FetchPlan,
    run_id: u64,
}

impl RefreshRun {
    async fn execute(self) {
        let started = Instant::now();

        match self.fetch_all(started).await {
            Ok(RunOutcome::Cancelled) => {
                info!(
                    component = "refresh_coordinator",
                    key = %self.key,
                    run_id = self.run_id,
                    "Refresh cancelled mid-run, discarding partial result"
                );
            }
            Ok(RunOutcome::Fetched {
                vehicles,
                pages_fetched,
                stopped_early,
            }) => {
                // 写入前复查：被取消或被后继运行接管时不得写入
                if !self.still_registered() {
                    info!(
                        component = "refresh_coordinator",
                        key = %self.key,
                        run_id = self.run_id,
                        "Registration gone at write time, discarding fetched result"
                    );
                    return;
                }

                let vehicle_count = vehicles.len();
                let cached_at = self.snapshots.write(&self.key, vehicles);

                // 写后验证：确认存储反映了新的时间戳；结论不明只告警，不判失败
                match self.snapshots.read(&self.key) {
                    Some(snapshot) if snapshot.cached_at == cached_at => {}
                    _ => warn!(
                        component = "refresh_coordinator",
                        key = %self.key,
                        "Post-write verification inconclusive"
                    ),
                }

                info!(
                    component = "refresh_coordinator",
                    key = %self.key,
                    run_id = self.run_id,
                    pages_fetched = pages_fetched,
                    vehicles = vehicle_count,
                    stopped_early = stopped_early,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Stock refresh completed"
                );

                self.record_terminal(RefreshStatus::record_completed);
                self.remove_registration();
            }
            Err(e) => {
                // 认证失败：剔除缓存令牌，下一次刷新会重新颁发。
                // 不在本次运行内紧接着重新认证，避免颁发-失败的循环。
                if e.as_upstream().map(UpstreamError::kind) == Some(ErrorKind::Authentication) {
                    self.tokens.invalidate(&self.credentials.fingerprint());
                }

                error!(
                    component = "refresh_coordinator",
                    key = %self.key,
                    run_id = self.run_id,
                    error = %e,
                    "Stock refresh failed, previous snapshot left untouched"
                );

                self.record_terminal(|status| status.record_failed(e.to_string()));
                self.remove_registration();
            }
        }
    }

    /// 顺序分页拉取全部库存
    ///
    /// 页与页之间不并行：上游有速率限制，且翻页可能依赖有状态游标
    async fn fetch_all(&self, started: Instant) -> Result<RunOutcome> {
        let token = self.obtain_token().await?;
        let query = StockQuery {
            advertiser_id: self.key.advertiser_id.clone(),
            page_size: self.plan.page_size,
        };

        let mut vehicles = Vec::new();
        let mut page = 1_u32;
        let mut stopped_early = false;
        let label = format!("list_stock[{}]", self.key);

        loop {
            // 合作式取消检查
            if !self.still_registered() {
                return Ok(RunOutcome::Cancelled);
            }

            let stock_page = self
                .caller
                .execute_with_retry(&label, || {
                    self.marketplace
                        .list_stock(&token.token_value, &query, page)
                })
                .await?;

            let total_pages = stock_page.total_pages.max(1);
            vehicles.extend(stock_page.items);
            self.update_progress(page, total_pages, started.elapsed());

            if page >= total_pages {
                break;
            }

            if self.plan.budget_exhausted(page, started.elapsed()) {
                info!(
                    component = "refresh_coordinator",
                    key = %self.key,
                    pages_fetched = page,
                    total_pages = total_pages,
                    "Refresh budget exhausted, stopping early and treating partial result as complete"
                );
                stopped_early = true;
                break;
            }

            page += 1;
        }

        Ok(RunOutcome::Fetched {
            vehicles,
            pages_fetched: page,
            stopped_early,
        })
    }

    /// 获取访问令牌：优先用缓存，缺失时通过弹性调用颁发并回填缓存
    async fn obtain_token(&self) -> Result<CachedToken> {
        let identity = self.credentials.fingerprint();
        if let Some(token) = self.tokens.get_token(&identity) {
            debug!(
                component = "refresh_coordinator",
                key = %self.key,
                "Using cached upstream token"
            );
            return Ok(token);
        }

        let issued = self
            .caller
            .execute_with_retry("authenticate", || {
                self.marketplace.authenticate(&self.credentials)
            })
            .await?;

        let issued_at = Utc::now();
        let expires_at = issued_at + chrono::Duration::seconds(issued.expires_in);
        self.tokens
            .set_token(&identity, issued.access_token.clone(), expires_at);

        Ok(CachedToken {
            token_value: issued.access_token,
            expires_at,
            issued_at,
        })
    }

    /// 本次运行是否仍然持有该键的登记
    fn still_registered(&self) -> bool {
        self.in_flight
            .get(&self.key)
            .is_some_and(|status| status.run_id == self.run_id)
    }

    /// 更新进度（登记已不属于本次运行时静默跳过）
    fn update_progress(&self, current_page: u32, total_pages: u32, elapsed: std::time::Duration) {
        if let Some(mut status) = self.in_flight.get_mut(&self.key) {
            if status.run_id == self.run_id {
                status.record_page(current_page, total_pages, elapsed);
            }
        }
    }

    /// 记录终态（短暂可见，随后登记即被移除）
    fn record_terminal(&self, update: impl FnOnce(&mut RefreshStatus)) {
        if let Some(mut status) = self.in_flight.get_mut(&self.key) {
            if status.run_id == self.run_id {
                update(status.value_mut());
            }
        }
    }

    /// 移除登记
    ///
    /// 成功与失败路径都必须到达这里，等价于 finally；
    /// 按运行标识移除，不会误删后继运行的登记
    fn remove_registration(&self) {
        self.in_flight
            .remove_if(&self.key, |_, status| status.run_id == self.run_id);
    }
}
