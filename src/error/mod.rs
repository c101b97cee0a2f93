//! The unified error handling system for the application.

// 1. Core Types
pub use types::SyncError;
pub use upstream::{ErrorKind, UpstreamError};

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, SyncError>;

// 2. Module declarations
pub mod types;
pub mod upstream;

// 3. Context Trait for adding context to errors.
pub trait Context<T, E> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<SyncError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => {
                let context_message = context().to_string();
                Err(SyncError::Context {
                    context: context_message,
                    source: Box::new(error.into()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_error() {
        let result: Result<()> = Err(SyncError::cache("底层失败")).context("读取快照时");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("读取快照时"));
    }

    #[test]
    fn test_as_upstream_through_context() {
        let inner = SyncError::Upstream(UpstreamError::from_status(503, "boom", None));
        let result: Result<()> = Err(inner).context("拉取库存页");
        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.as_upstream().unwrap().kind(), ErrorKind::Server);
    }
}
