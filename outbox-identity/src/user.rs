//! user 命名空间接线
//!
//! 用户增删改的出箱主题与处理器：全部动作写审计日志，
//! 删除用户额外吊销其全部认证会话。
//!
use crate::collaborators::{AuditEntry, AuditLogClient, SessionRevoker};
use async_trait::async_trait;
use outbox_engine::{NamespaceRegistry, OutboxResult, TypedHandler};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const NAMESPACE: &str = "user";

pub const TOPIC_ADDED: &str = "user.added";
pub const TOPIC_UPDATED: &str = "user.updated";
pub const TOPIC_DELETED: &str = "user.deleted";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAddedPayload {
    pub visitor: Option<String>,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUpdatedPayload {
    pub visitor: Option<String>,
    pub user_id: String,
    /// 变更明细（字段 → 新值），引擎与审计均不解释其内容
    pub changes: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDeletedPayload {
    pub visitor: Option<String>,
    pub user_id: String,
}

struct UserAddedHandler {
    audit: Arc<dyn AuditLogClient>,
}

#[async_trait]
impl TypedHandler for UserAddedHandler {
    type Payload = UserAddedPayload;

    fn topic(&self) -> &str {
        TOPIC_ADDED
    }

    async fn handle(&self, payload: UserAddedPayload) -> anyhow::Result<()> {
        let detail = serde_json::json!({
            "user_id": payload.user_id,
            "user_name": payload.user_name,
        });
        self.audit
            .append(AuditEntry::new(TOPIC_ADDED, payload.visitor, detail))
            .await
    }
}

struct UserUpdatedHandler {
    audit: Arc<dyn AuditLogClient>,
}

#[async_trait]
impl TypedHandler for UserUpdatedHandler {
    type Payload = UserUpdatedPayload;

    fn topic(&self) -> &str {
        TOPIC_UPDATED
    }

    async fn handle(&self, payload: UserUpdatedPayload) -> anyhow::Result<()> {
        let detail = serde_json::json!({
            "user_id": payload.user_id,
            "changes": payload.changes,
        });
        self.audit
            .append(AuditEntry::new(TOPIC_UPDATED, payload.visitor, detail))
            .await
    }
}

struct UserDeletedHandler {
    audit: Arc<dyn AuditLogClient>,
    sessions: Arc<dyn SessionRevoker>,
}

#[async_trait]
impl TypedHandler for UserDeletedHandler {
    type Payload = UserDeletedPayload;

    fn topic(&self) -> &str {
        TOPIC_DELETED
    }

    async fn handle(&self, payload: UserDeletedPayload) -> anyhow::Result<()> {
        // 会话先行吊销；重复投递时重复吊销是无害的幂等操作
        self.sessions.revoke_sessions(&payload.user_id).await?;
        let detail = serde_json::json!({"user_id": payload.user_id});
        self.audit
            .append(AuditEntry::new(TOPIC_DELETED, payload.visitor, detail))
            .await
    }
}

pub fn registry(
    audit: Arc<dyn AuditLogClient>,
    sessions: Arc<dyn SessionRevoker>,
) -> OutboxResult<NamespaceRegistry> {
    Ok(NamespaceRegistry::builder(NAMESPACE)
        .handler(Arc::new(UserAddedHandler {
            audit: audit.clone(),
        }))?
        .handler(Arc::new(UserUpdatedHandler {
            audit: audit.clone(),
        }))?
        .handler(Arc::new(UserDeletedHandler { audit, sessions }))?
        .build())
}
