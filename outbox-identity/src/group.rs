//! group 命名空间接线
//!
//! 群组变更的出箱主题与处理器：写审计日志并向消息代理发布通知，
//! 审计条目原样携带载荷中的 group_info。
//!
use crate::collaborators::{AuditEntry, AuditLogClient, EventPublisher};
use async_trait::async_trait;
use outbox_engine::{NamespaceRegistry, OutboxResult, TypedHandler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const NAMESPACE: &str = "group";

pub const TOPIC_ADDED: &str = "group.added";
pub const TOPIC_REMOVED: &str = "group.removed";
pub const TOPIC_MEMBER_CHANGED: &str = "group.member-changed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub gid: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChangedPayload {
    pub visitor: Option<String>,
    pub group_info: GroupInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMemberChangedPayload {
    pub visitor: Option<String>,
    pub group_info: GroupInfo,
    pub member_id: String,
    /// "added" 或 "removed"
    pub change: String,
}

struct GroupChangedHandler {
    topic: &'static str,
    audit: Arc<dyn AuditLogClient>,
    publisher: Arc<dyn EventPublisher>,
}

#[async_trait]
impl TypedHandler for GroupChangedHandler {
    type Payload = GroupChangedPayload;

    fn topic(&self) -> &str {
        self.topic
    }

    async fn handle(&self, payload: GroupChangedPayload) -> anyhow::Result<()> {
        let detail = serde_json::to_value(&payload.group_info)?;
        self.audit
            .append(AuditEntry::new(
                self.topic,
                payload.visitor.clone(),
                detail.clone(),
            ))
            .await?;
        self.publisher.publish(self.topic, &detail).await
    }
}

struct GroupMemberChangedHandler {
    audit: Arc<dyn AuditLogClient>,
    publisher: Arc<dyn EventPublisher>,
}

#[async_trait]
impl TypedHandler for GroupMemberChangedHandler {
    type Payload = GroupMemberChangedPayload;

    fn topic(&self) -> &str {
        TOPIC_MEMBER_CHANGED
    }

    async fn handle(&self, payload: GroupMemberChangedPayload) -> anyhow::Result<()> {
        let detail = serde_json::json!({
            "group_info": payload.group_info,
            "member_id": payload.member_id,
            "change": payload.change,
        });
        self.audit
            .append(AuditEntry::new(
                TOPIC_MEMBER_CHANGED,
                payload.visitor,
                detail.clone(),
            ))
            .await?;
        self.publisher.publish(TOPIC_MEMBER_CHANGED, &detail).await
    }
}

pub fn registry(
    audit: Arc<dyn AuditLogClient>,
    publisher: Arc<dyn EventPublisher>,
) -> OutboxResult<NamespaceRegistry> {
    Ok(NamespaceRegistry::builder(NAMESPACE)
        .handler(Arc::new(GroupChangedHandler {
            topic: TOPIC_ADDED,
            audit: audit.clone(),
            publisher: publisher.clone(),
        }))?
        .handler(Arc::new(GroupChangedHandler {
            topic: TOPIC_REMOVED,
            audit: audit.clone(),
            publisher: publisher.clone(),
        }))?
        .handler(Arc::new(GroupMemberChangedHandler { audit, publisher }))?
        .build())
}
