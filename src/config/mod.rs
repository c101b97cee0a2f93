//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;

pub use app_config::{RefreshSettings, RetrySettings, SyncConfig, TokenCacheConfig, UpstreamConfig};

use std::env;
use std::path::Path;

/// 加载配置文件
pub fn load_config() -> crate::error::Result<SyncConfig> {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let config_file = format!("config/config.{env}.toml");

    if !Path::new(&config_file).exists() {
        return Err(crate::error::SyncError::config(format!(
            "配置文件不存在: {config_file}"
        )));
    }

    let config_content = std::fs::read_to_string(&config_file).map_err(|e| {
        crate::error::SyncError::config_with_source(format!("读取配置文件失败: {config_file}"), e)
    })?;

    let config: SyncConfig = toml::from_str(&config_content)?;

    // 验证配置的有效性
    validate_config(&config)?;

    Ok(config)
}

/// 验证配置有效性
pub fn validate_config(config: &SyncConfig) -> crate::error::Result<()> {
    // 验证上游配置
    if config.upstream.base_url.is_empty() {
        return Err(crate::error::SyncError::config("上游base_url不能为空"));
    }

    if config.upstream.timeout_seconds == 0 {
        return Err(crate::error::SyncError::config("上游请求超时必须大于0"));
    }

    // 验证重试配置
    if config.retry.backoff_multiplier < 1.0 {
        return Err(crate::error::SyncError::config(format!(
            "退避倍率必须不小于1: {}",
            config.retry.backoff_multiplier
        )));
    }

    if config.retry.max_delay_ms < config.retry.base_delay_ms {
        return Err(crate::error::SyncError::config(
            "最大退避延迟不能小于基础延迟",
        ));
    }

    // 验证token缓存配置
    if config.token_cache.safety_margin_minutes < 0 {
        return Err(crate::error::SyncError::config("过期安全边际不能为负数"));
    }

    // 验证刷新配置
    if config.refresh.page_size == 0 {
        return Err(crate::error::SyncError::config("每页条目数必须大于0"));
    }

    if config.refresh.background_max_pages == 0 {
        return Err(crate::error::SyncError::config("后台页数预算必须大于0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = SyncConfig::default();
        config.upstream.base_url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_bad_backoff_rejected() {
        let mut config = SyncConfig::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(validate_config(&config).is_err());

        let mut config = SyncConfig::default();
        config.retry.max_delay_ms = 10;
        config.retry.base_delay_ms = 100;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_dev_config_file() {
        // cargo 将工作目录设为包根，config/config.dev.toml 随仓库提供
        let config = load_config().expect("加载开发配置失败");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.token_cache.safety_margin_minutes, 5);
    }

    #[test]
    fn test_parse_partial_toml() {
        let parsed: SyncConfig = toml::from_str(
            r#"
            [upstream]
            base_url = "https://api.mobile.example"
            timeout_seconds = 15
            auth_path = "/oauth/token"
            stock_path = "/seller-api/stock"

            [retry]
            max_retries = 5
            base_delay_ms = 200
            max_delay_ms = 5000
            backoff_multiplier = 2.0
            jitter = false
            "#,
        )
        .expect("解析配置失败");

        assert_eq!(parsed.upstream.timeout_seconds, 15);
        assert_eq!(parsed.retry.max_retries, 5);
        assert!(!parsed.retry.jitter);
        // 未给出的段落使用默认值
        assert_eq!(parsed.token_cache.safety_margin_minutes, 5);
        assert_eq!(parsed.refresh.page_size, 100);
    }
}
