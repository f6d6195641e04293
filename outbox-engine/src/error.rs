//! 引擎统一错误定义
//!
//! 聚焦入箱（enqueue）、存储、注册与载荷校验等最小必要集合，
//! 便于在各实现层统一转换为 `OutboxError`。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OutboxError {
    // --- 序列化/载荷 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid payload: topic={topic}, reason={reason}")]
    InvalidPayload { topic: String, reason: String },

    // --- 注册 ---
    #[error("namespace already registered: {namespace}")]
    NamespaceExists { namespace: String },
    #[error("topic already registered: namespace={namespace}, topic={topic}")]
    TopicAlreadyRegistered { namespace: String, topic: String },
    #[error("unknown topic: namespace={namespace}, topic={topic}")]
    UnknownTopic { namespace: String, topic: String },

    // --- 存储/持久化 ---
    #[error("store error: {reason}")]
    Store { reason: String },
    #[error("database error: {reason}")]
    Database { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },

    // --- 通用 ---
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
}

/// 统一 Result 类型别名
pub type OutboxResult<T> = Result<T, OutboxError>;

// ---- Cross-crate conversions for infrastructure convenience ----
// 允许在存储适配层直接使用 `?` 将 sqlx 错误转换为 OutboxError

#[cfg(feature = "store-sqlx")]
impl From<sqlx::Error> for OutboxError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => OutboxError::NotFound {
                reason: "row not found".to_string(),
            },
            other => OutboxError::Database {
                reason: other.to_string(),
            },
        }
    }
}
