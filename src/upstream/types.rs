//! # 上游数据结构
//!
//! 市场 API 的线格式定义，字段以上游返回为准

use serde::{Deserialize, Serialize};

/// 上游颁发的访问令牌
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedToken {
    /// 访问令牌
    pub access_token: String,
    /// 有效期（秒）
    pub expires_in: i64,
}

/// 车辆库存记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockVehicle {
    /// 上游车辆标识
    pub vehicle_id: String,
    /// 品牌
    pub make: String,
    /// 车型
    pub model: String,
    /// 配置版本
    #[serde(default)]
    pub variant: Option<String>,
    /// 首次上牌（如 "2019-05"）
    #[serde(default)]
    pub first_registration: Option<String>,
    /// 里程（公里）
    #[serde(default)]
    pub mileage_km: Option<u32>,
    /// 价格（分）
    #[serde(default)]
    pub price_cents: Option<i64>,
    /// 币种
    #[serde(default)]
    pub currency: Option<String>,
    /// 燃料类型
    #[serde(default)]
    pub fuel_type: Option<String>,
    /// 车架号
    #[serde(default)]
    pub vin: Option<String>,
}

/// 一页库存数据
#[derive(Debug, Clone, Deserialize)]
pub struct StockPage {
    /// 本页条目
    pub items: Vec<StockVehicle>,
    /// 当前页号（从1开始）
    pub current_page: u32,
    /// 总页数
    pub total_pages: u32,
}

/// 库存查询参数（上游维度）
#[derive(Debug, Clone)]
pub struct StockQuery {
    /// 上游广告主标识
    pub advertiser_id: String,
    /// 每页条目数
    pub page_size: u32,
}
