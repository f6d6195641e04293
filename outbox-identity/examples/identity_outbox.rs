//! 端到端演示：内存存储 + 全部身份命名空间
//!
//! 业务事务内入箱 → 提交 → 唤醒，随后由各命名空间的调度器
//! 调用审计/发布/会话失效协作方。

use async_trait::async_trait;
use outbox_engine::{DispatcherConfig, InMemoryStore, OutboxEngine};
use outbox_identity::collaborators::{AuditEntry, AuditLogClient, EventPublisher, SessionRevoker};
use outbox_identity::{IdentityCollaborators, config, group, register_namespaces, user};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

struct StdoutAudit;

#[async_trait]
impl AuditLogClient for StdoutAudit {
    async fn append(&self, entry: AuditEntry) -> anyhow::Result<()> {
        println!(
            "[audit] action={} actor={:?} detail={}",
            entry.action, entry.actor, entry.detail
        );
        Ok(())
    }
}

struct StdoutPublisher;

#[async_trait]
impl EventPublisher for StdoutPublisher {
    async fn publish(&self, topic: &str, body: &Value) -> anyhow::Result<()> {
        println!("[publish] topic={topic} body={body}");
        Ok(())
    }
}

struct StdoutRevoker;

#[async_trait]
impl SessionRevoker for StdoutRevoker {
    async fn revoke_sessions(&self, principal_id: &str) -> anyhow::Result<()> {
        println!("[sessions] revoked all sessions of {principal_id}");
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("outbox_engine=debug")),
        )
        .init();

    let store = Arc::new(InMemoryStore::new());
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(DispatcherConfig {
            poll_interval: Duration::from_millis(200),
            ..DispatcherConfig::default()
        })
        .build();

    let deps = IdentityCollaborators {
        audit: Arc::new(StdoutAudit),
        publisher: Arc::new(StdoutPublisher),
        sessions: Arc::new(StdoutRevoker),
    };
    register_namespaces(&engine, &deps)?;

    // 新建用户
    let users = engine.handle(user::NAMESPACE).expect("user namespace");
    let mut tx = store.begin();
    users
        .enqueue(
            user::TOPIC_ADDED,
            json!({"visitor": "admin-1", "user_id": "u-1", "user_name": "vivian"}),
            &mut tx,
        )
        .await?;
    tx.commit().await;
    users.notify();

    // 新建群组
    let groups = engine.handle(group::NAMESPACE).expect("group namespace");
    let mut tx = store.begin();
    groups
        .enqueue(
            group::TOPIC_ADDED,
            json!({"visitor": "admin-1", "group_info": {"gid": 7, "name": "staff"}}),
            &mut tx,
        )
        .await?;
    tx.commit().await;
    groups.notify();

    // 配置变更（回滚演示：这条永远不会投递）
    let configs = engine.handle(config::NAMESPACE).expect("config namespace");
    let mut tx = store.begin();
    configs
        .enqueue(
            config::TOPIC_CHANGED,
            json!({"visitor": "admin-1", "key": "mail.host", "value": "smtp.internal"}),
            &mut tx,
        )
        .await?;
    tx.rollback();

    // 删除用户：审计 + 会话吊销
    let mut tx = store.begin();
    users
        .enqueue(
            user::TOPIC_DELETED,
            json!({"visitor": "admin-1", "user_id": "u-1"}),
            &mut tx,
        )
        .await?;
    tx.commit().await;
    users.notify();

    tokio::time::sleep(Duration::from_millis(500)).await;

    engine.shutdown();
    engine.join().await;
    println!("records: {}", store.records().await.len());
    Ok(())
}
