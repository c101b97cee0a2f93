//! # 上游市场 API 模块
//!
//! 定义上游契约（认证 + 分页库存列表）及其 HTTP 实现

pub mod client;
pub mod types;

pub use client::{Marketplace, MarketplaceClient};
pub use types::{IssuedToken, StockPage, StockQuery, StockVehicle};
