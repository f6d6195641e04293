//! anonymous-share 命名空间接线
//!
//! 匿名分享的出箱主题与处理器：创建写审计日志，
//! 过期时写审计并发布通知（供清理与提醒类消费方使用）。
//!
use crate::collaborators::{AuditEntry, AuditLogClient, EventPublisher};
use async_trait::async_trait;
use outbox_engine::{NamespaceRegistry, OutboxResult, TypedHandler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const NAMESPACE: &str = "anonymous-share";

pub const TOPIC_CREATED: &str = "share.created";
pub const TOPIC_EXPIRED: &str = "share.expired";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareCreatedPayload {
    pub visitor: Option<String>,
    pub token: String,
    pub resource: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareExpiredPayload {
    pub token: String,
}

struct ShareCreatedHandler {
    audit: Arc<dyn AuditLogClient>,
}

#[async_trait]
impl TypedHandler for ShareCreatedHandler {
    type Payload = ShareCreatedPayload;

    fn topic(&self) -> &str {
        TOPIC_CREATED
    }

    async fn handle(&self, payload: ShareCreatedPayload) -> anyhow::Result<()> {
        let detail = serde_json::json!({
            "token": payload.token,
            "resource": payload.resource,
        });
        self.audit
            .append(AuditEntry::new(TOPIC_CREATED, payload.visitor, detail))
            .await
    }
}

struct ShareExpiredHandler {
    audit: Arc<dyn AuditLogClient>,
    publisher: Arc<dyn EventPublisher>,
}

#[async_trait]
impl TypedHandler for ShareExpiredHandler {
    type Payload = ShareExpiredPayload;

    fn topic(&self) -> &str {
        TOPIC_EXPIRED
    }

    async fn handle(&self, payload: ShareExpiredPayload) -> anyhow::Result<()> {
        let detail = serde_json::json!({"token": payload.token});
        self.audit
            .append(AuditEntry::new(TOPIC_EXPIRED, None, detail.clone()))
            .await?;
        self.publisher.publish(TOPIC_EXPIRED, &detail).await
    }
}

pub fn registry(
    audit: Arc<dyn AuditLogClient>,
    publisher: Arc<dyn EventPublisher>,
) -> OutboxResult<NamespaceRegistry> {
    Ok(NamespaceRegistry::builder(NAMESPACE)
        .handler(Arc::new(ShareCreatedHandler {
            audit: audit.clone(),
        }))?
        .handler(Arc::new(ShareExpiredHandler { audit, publisher }))?
        .build())
}
