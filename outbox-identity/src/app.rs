//! app 命名空间接线
//!
//! 应用账号的出箱主题与处理器：新增写审计日志，
//! 凭证轮换额外吊销该应用账号的全部会话。
//!
use crate::collaborators::{AuditEntry, AuditLogClient, SessionRevoker};
use async_trait::async_trait;
use outbox_engine::{NamespaceRegistry, OutboxResult, TypedHandler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const NAMESPACE: &str = "app";

pub const TOPIC_ADDED: &str = "app.added";
pub const TOPIC_SECRET_ROTATED: &str = "app.secret-rotated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppAddedPayload {
    pub visitor: Option<String>,
    pub app_id: String,
    pub app_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSecretRotatedPayload {
    pub visitor: Option<String>,
    pub app_id: String,
}

struct AppAddedHandler {
    audit: Arc<dyn AuditLogClient>,
}

#[async_trait]
impl TypedHandler for AppAddedHandler {
    type Payload = AppAddedPayload;

    fn topic(&self) -> &str {
        TOPIC_ADDED
    }

    async fn handle(&self, payload: AppAddedPayload) -> anyhow::Result<()> {
        let detail = serde_json::json!({
            "app_id": payload.app_id,
            "app_name": payload.app_name,
        });
        self.audit
            .append(AuditEntry::new(TOPIC_ADDED, payload.visitor, detail))
            .await
    }
}

struct AppSecretRotatedHandler {
    audit: Arc<dyn AuditLogClient>,
    sessions: Arc<dyn SessionRevoker>,
}

#[async_trait]
impl TypedHandler for AppSecretRotatedHandler {
    type Payload = AppSecretRotatedPayload;

    fn topic(&self) -> &str {
        TOPIC_SECRET_ROTATED
    }

    async fn handle(&self, payload: AppSecretRotatedPayload) -> anyhow::Result<()> {
        // 旧凭证签发的会话一并失效
        self.sessions.revoke_sessions(&payload.app_id).await?;
        let detail = serde_json::json!({"app_id": payload.app_id});
        self.audit
            .append(AuditEntry::new(
                TOPIC_SECRET_ROTATED,
                payload.visitor,
                detail,
            ))
            .await
    }
}

pub fn registry(
    audit: Arc<dyn AuditLogClient>,
    sessions: Arc<dyn SessionRevoker>,
) -> OutboxResult<NamespaceRegistry> {
    Ok(NamespaceRegistry::builder(NAMESPACE)
        .handler(Arc::new(AppAddedHandler {
            audit: audit.clone(),
        }))?
        .handler(Arc::new(AppSecretRotatedHandler { audit, sessions }))?
        .build())
}
