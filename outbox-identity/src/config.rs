//! config 命名空间接线
//!
//! 系统配置变更的出箱主题与处理器：写审计日志并向消息代理发布，
//! 让其他进程感知配置已变化。
//!
use crate::collaborators::{AuditEntry, AuditLogClient, EventPublisher};
use async_trait::async_trait;
use outbox_engine::{NamespaceRegistry, OutboxResult, TypedHandler};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const NAMESPACE: &str = "config";

pub const TOPIC_CHANGED: &str = "config.changed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChangedPayload {
    pub visitor: Option<String>,
    pub key: String,
    pub value: Value,
}

struct ConfigChangedHandler {
    audit: Arc<dyn AuditLogClient>,
    publisher: Arc<dyn EventPublisher>,
}

#[async_trait]
impl TypedHandler for ConfigChangedHandler {
    type Payload = ConfigChangedPayload;

    fn topic(&self) -> &str {
        TOPIC_CHANGED
    }

    async fn handle(&self, payload: ConfigChangedPayload) -> anyhow::Result<()> {
        let detail = serde_json::json!({
            "key": payload.key,
            "value": payload.value,
        });
        self.audit
            .append(AuditEntry::new(
                TOPIC_CHANGED,
                payload.visitor,
                detail.clone(),
            ))
            .await?;
        self.publisher.publish(TOPIC_CHANGED, &detail).await
    }
}

pub fn registry(
    audit: Arc<dyn AuditLogClient>,
    publisher: Arc<dyn EventPublisher>,
) -> OutboxResult<NamespaceRegistry> {
    Ok(NamespaceRegistry::builder(NAMESPACE)
        .handler(Arc::new(ConfigChangedHandler { audit, publisher }))?
        .build())
}
