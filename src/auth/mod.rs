//! # 认证模块
//!
//! 上游凭据指纹与访问令牌的进程级缓存

pub mod token_store;

pub use token_store::{CachedToken, TokenStore, TokenStoreStats, UpstreamCredentials};
