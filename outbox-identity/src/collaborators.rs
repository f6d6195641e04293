//! 下游协作方协议
//!
//! 引擎只保证"何时、以何种载荷"调用协作方，以及协作方返回失败时
//! 记录保持 Pending；协作方自身的线协议不在本 crate 范围内：
//! - `AuditLogClient`：审计日志追加；
//! - `EventPublisher`：消息代理发布；
//! - `SessionRevoker`：认证会话失效。
//!
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一条审计日志条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 动作名，约定与出箱主题一致
    pub action: String,
    /// 操作者（来自业务载荷的 visitor，可缺省）
    pub actor: Option<String>,
    /// 动作细节，原样携带业务载荷中的关键信息
    pub detail: Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, actor: Option<String>, detail: Value) -> Self {
        Self {
            action: action.into(),
            actor,
            detail,
            occurred_at: Utc::now(),
        }
    }
}

/// 审计日志客户端
#[async_trait]
pub trait AuditLogClient: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> anyhow::Result<()>;
}

/// 消息代理发布客户端
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, body: &Value) -> anyhow::Result<()>;
}

/// 会话失效客户端：按主体（用户或应用账号）吊销全部会话
#[async_trait]
pub trait SessionRevoker: Send + Sync {
    async fn revoke_sessions(&self, principal_id: &str) -> anyhow::Result<()>;
}
