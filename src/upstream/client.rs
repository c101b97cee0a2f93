//! # 市场 API HTTP 客户端
//!
//! 实现上游市场的认证和分页库存列表调用。
//! 非 2xx 响应统一映射为类型化上游错误，429 会捕获 Retry-After 提示。

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{IssuedToken, StockPage, StockQuery};
use crate::auth::UpstreamCredentials;
use crate::config::UpstreamConfig;
use crate::error::{Result, UpstreamError};

/// API请求超时时间（秒）
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// 默认认证接口路径
const DEFAULT_AUTH_PATH: &str = "/auth/token";

/// 默认库存列表接口路径
const DEFAULT_STOCK_PATH: &str = "/stock";

/// 上游市场契约
///
/// 协调器只依赖该契约，测试用脚本化替身实现
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// 用凭据换取访问令牌
    async fn authenticate(&self, credentials: &UpstreamCredentials) -> Result<IssuedToken>;

    /// 拉取一页库存（页号从1开始）
    async fn list_stock(&self, token: &str, query: &StockQuery, page: u32) -> Result<StockPage>;
}

/// 市场 API HTTP 客户端
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http_client: Client,
    base_url: String,
    auth_path: String,
    stock_path: String,
}

impl MarketplaceClient {
    /// 按配置创建客户端
    #[must_use]
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::build(
            &config.base_url,
            &config.auth_path,
            &config.stock_path,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// 使用自定义base URL创建客户端（主要用于测试）
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self::build(
            base_url,
            DEFAULT_AUTH_PATH,
            DEFAULT_STOCK_PATH,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        )
    }

    fn build(base_url: &str, auth_path: &str, stock_path: &str, timeout: Duration) -> Self {
        let http_client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    component = "marketplace_client",
                    error = %e,
                    "Failed to build HTTP client with timeout, falling back to defaults"
                );
                Client::new()
            }
        };

        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_path: auth_path.to_string(),
            stock_path: stock_path.to_string(),
        }
    }

    /// 检查响应状态，非 2xx 映射为类型化错误
    async fn check_response(response: Response, operation: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        debug!(
            component = "marketplace_client",
            operation = operation,
            status = status.as_u16(),
            "Upstream returned non-success status"
        );

        Err(UpstreamError::from_status(
            status.as_u16(),
            format!("{operation}失败: {body}"),
            retry_after,
        )
        .into())
    }
}

#[async_trait]
impl Marketplace for MarketplaceClient {
    async fn authenticate(&self, credentials: &UpstreamCredentials) -> Result<IssuedToken> {
        let url = format!("{}{}", self.base_url, self.auth_path);
        let response = self
            .http_client
            .post(&url)
            .json(&json!({
                "client_id": credentials.client_id,
                "client_secret": credentials.client_secret,
            }))
            .send()
            .await?;

        let response = Self::check_response(response, "authenticate").await?;
        let token: IssuedToken = response.json().await?;
        debug!(
            component = "marketplace_client",
            expires_in = token.expires_in,
            "Issued upstream token"
        );
        Ok(token)
    }

    async fn list_stock(&self, token: &str, query: &StockQuery, page: u32) -> Result<StockPage> {
        let url = format!("{}{}", self.base_url, self.stock_path);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("advertiser_id", query.advertiser_id.clone()),
                ("page", page.to_string()),
                ("page_size", query.page_size.to_string()),
            ])
            .send()
            .await?;

        let response = Self::check_response(response, "list_stock").await?;
        let stock_page: StockPage = response.json().await?;
        debug!(
            component = "marketplace_client",
            advertiser_id = %query.advertiser_id,
            page = stock_page.current_page,
            total_pages = stock_page.total_pages,
            items = stock_page.items.len(),
            "Fetched stock page"
        );
        Ok(stock_page)
    }
}

/// 解析 Retry-After 头（仅支持秒数形式）
fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_parse_retry_after_absent_or_http_date() {
        let headers = header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        // HTTP 日期形式不支持，按无提示处理
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::RETRY_AFTER,
            "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = MarketplaceClient::with_base_url("https://api.example/");
        assert_eq!(client.base_url, "https://api.example");
    }
}
