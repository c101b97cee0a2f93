//! # 上游客户端与重试集成测试
//!
//! 用 wiremock 模拟真实 HTTP 状态码，验证错误分类、重试次数和 Retry-After 提示

use std::time::{Duration, Instant};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stock_sync::auth::UpstreamCredentials;
use stock_sync::error::ErrorKind;
use stock_sync::retry::{ResilientCaller, RetryConfig};
use stock_sync::upstream::{Marketplace, MarketplaceClient, StockQuery};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        base_delay_ms: 5,
        max_delay_ms: 20,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

fn credentials(server: &MockServer) -> UpstreamCredentials {
    UpstreamCredentials::new("client-id", "client-secret", server.uri())
}

fn query() -> StockQuery {
    StockQuery {
        advertiser_id: "adv-1".to_string(),
        page_size: 50,
    }
}

fn stock_body(count: usize) -> serde_json::Value {
    let items: Vec<_> = (0..count)
        .map(|i| {
            serde_json::json!({
                "vehicle_id": format!("v{i}"),
                "make": "BMW",
                "model": "320d",
                "mileage_km": 80_000,
                "price_cents": 2_450_000,
                "currency": "EUR"
            })
        })
        .collect();
    serde_json::json!({
        "items": items,
        "current_page": 1,
        "total_pages": 1
    })
}

#[tokio::test]
async fn test_authenticate_success_and_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "issued-token",
            "expires_in": 3600
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let client = MarketplaceClient::with_base_url(&server.uri());
    let token = client.authenticate(&credentials(&server)).await.unwrap();
    assert_eq!(token.access_token, "issued-token");
    assert_eq!(token.expires_in, 3600);

    // 第二次请求命中兜底的 401
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let err = client.authenticate(&credentials(&server)).await.unwrap_err();
    let upstream = err.as_upstream().expect("应为上游错误");
    assert_eq!(upstream.kind(), ErrorKind::Authentication);
    assert!(!upstream.is_retryable());
}

#[tokio::test]
async fn test_not_found_and_validation_single_attempt() {
    for (status, kind) in [(404_u16, ErrorKind::NotFound), (400, ErrorKind::Validation)] {
        let server = MockServer::start().await;
        // expect(1)：经过重试层也只允许一次请求
        Mock::given(method("GET"))
            .and(path("/stock"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let client = MarketplaceClient::with_base_url(&server.uri());
        let caller = ResilientCaller::new(fast_retry());
        let q = query();

        let result = caller
            .execute_with_retry("list_stock", || client.list_stock("tok", &q, 1))
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.as_upstream().unwrap().kind(), kind);
        server.verify().await;
    }
}

#[tokio::test]
async fn test_server_error_retried_until_exhaustion() {
    let server = MockServer::start().await;
    // max_retries=3 → 总共4次尝试
    Mock::given(method("GET"))
        .and(path("/stock"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let client = MarketplaceClient::with_base_url(&server.uri());
    let caller = ResilientCaller::new(fast_retry());
    let q = query();

    let result = caller
        .execute_with_retry("list_stock", || client.list_stock("tok", &q, 1))
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.as_upstream().unwrap().kind(), ErrorKind::Server);
    server.verify().await;
}

#[tokio::test]
async fn test_rate_limited_twice_then_success() {
    let server = MockServer::start().await;
    // 前两次 429，之后成功
    Mock::given(method("GET"))
        .and(path("/stock"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stock_body(3)))
        .mount(&server)
        .await;

    let client = MarketplaceClient::with_base_url(&server.uri());
    let caller = ResilientCaller::new(fast_retry());
    let q = query();

    let started = Instant::now();
    let page = caller
        .execute_with_retry("list_stock", || client.list_stock("tok", &q, 1))
        .await
        .expect("两次重试后应当成功");
    let elapsed = started.elapsed();

    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total_pages, 1);

    // 两次退避：base + base*multiplier，上限封顶
    let config = fast_retry();
    let lower = Duration::from_millis(config.base_delay_ms);
    let upper = Duration::from_millis(
        (config.base_delay_ms as f64 * config.backoff_multiplier) as u64 + config.max_delay_ms,
    ) + Duration::from_secs(2); // 调度开销余量
    assert!(elapsed >= lower, "实际耗时 {elapsed:?} 低于退避下界");
    assert!(elapsed <= upper, "实际耗时 {elapsed:?} 超出退避上界");
}

#[tokio::test]
async fn test_retry_after_hint_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stock"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "3")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let client = MarketplaceClient::with_base_url(&server.uri());
    let err = client.list_stock("tok", &query(), 1).await.unwrap_err();

    let upstream = err.as_upstream().expect("应为上游错误");
    assert_eq!(upstream.kind(), ErrorKind::RateLimit);
    assert_eq!(upstream.retry_after(), Some(Duration::from_secs(3)));
}

#[tokio::test]
async fn test_timeout_status_classified_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stock"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&server)
        .await;

    let client = MarketplaceClient::with_base_url(&server.uri());
    let err = client.list_stock("tok", &query(), 1).await.unwrap_err();

    let upstream = err.as_upstream().unwrap();
    assert_eq!(upstream.kind(), ErrorKind::Timeout);
    assert!(upstream.is_retryable());
}
