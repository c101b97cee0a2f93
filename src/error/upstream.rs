//! # 上游错误分类
//!
//! 将上游市场 API 的失败映射为类型化错误，并给出统一的重试判定

use std::time::Duration;
use thiserror::Error;

/// 上游错误类别
///
/// 重试层只依赖类别做决策，不关心具体的错误文本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 认证或授权失败（401/403）
    Authentication,
    /// 请求参数无效（400）
    Validation,
    /// 资源不存在（404）
    NotFound,
    /// 速率限制（429）
    RateLimit,
    /// 请求超时（408/504 或传输层超时）
    Timeout,
    /// 上游服务器错误（5xx）
    Server,
    /// 传输层失败（连接被拒绝、DNS 失败等）
    Network,
}

impl ErrorKind {
    /// 判断该类别是否可以重试
    ///
    /// 仅瞬时/基础设施类错误可重试；认证、参数和资源错误重试只会得到同样的结果
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Timeout | Self::Server | Self::Network
        )
    }

    /// 类别的日志标识
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::Server => "server",
            Self::Network => "network",
        }
    }
}

/// 上游调用错误
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// 认证失败
    #[error("上游认证失败: {message}")]
    Authentication { message: String },

    /// 请求无效
    #[error("上游请求无效: {message}")]
    Validation { message: String },

    /// 资源不存在
    #[error("上游资源不存在: {message}")]
    NotFound { message: String },

    /// 速率限制，可能携带上游给出的 Retry-After 提示
    #[error("上游速率限制: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// 请求超时
    #[error("上游请求超时: {message}")]
    Timeout { message: String },

    /// 服务器错误
    #[error("上游服务器错误 (status={status}): {message}")]
    Server { status: u16, message: String },

    /// 传输层失败
    #[error("上游网络错误: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl UpstreamError {
    /// 按 HTTP 状态码分类
    ///
    /// 未在分类表中的状态码一律归入服务器错误，保持可重试
    #[must_use]
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Authentication { message },
            400 => Self::Validation { message },
            404 => Self::NotFound { message },
            429 => Self::RateLimit {
                message,
                retry_after,
            },
            408 | 504 => Self::Timeout { message },
            _ => Self::Server { status, message },
        }
    }

    /// 创建传输层错误
    pub fn network<T: Into<String>, E: Into<anyhow::Error>>(message: T, source: E) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 获取错误类别
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Server { .. } => ErrorKind::Server,
            Self::Network { .. } => ErrorKind::Network,
        }
    }

    /// 判断是否可重试
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// 上游给出的重试等待提示（仅速率限制携带）
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
