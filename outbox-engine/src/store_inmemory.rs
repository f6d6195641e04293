//! 内存版出箱存储（InMemoryStore）
//!
//! 满足 `OutboxStore` 协议的轻量实现，典型用途：测试环境、示例与本地开发。
//! 提供显式事务语义以便验证原子性：
//! - `begin`：打开一个内存事务，插入先暂存在事务内；
//! - `commit`：暂存记录按提交顺序进入共享存储，此后才对调度器可见；
//! - 直接丢弃事务即回滚，暂存记录不复存在。
//!
use crate::error::{OutboxError, OutboxResult};
use crate::record::{EventRecord, EventStatus};
use crate::store::OutboxStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Vec<EventRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开一个内存事务
    pub fn begin(&self) -> MemoryTx {
        MemoryTx {
            store: self.clone(),
            staged: Vec::new(),
        }
    }

    /// 当前全部记录的快照（测试与诊断用）
    pub async fn records(&self) -> Vec<EventRecord> {
        self.inner.lock().await.clone()
    }

    async fn with_record<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut EventRecord) -> T,
    ) -> OutboxResult<T> {
        let mut records = self.inner.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| OutboxError::NotFound {
                reason: format!("record {id}"),
            })?;
        Ok(f(record))
    }
}

/// 内存事务：commit 前的插入对存储不可见，drop 即回滚
pub struct MemoryTx {
    store: InMemoryStore,
    staged: Vec<EventRecord>,
}

impl MemoryTx {
    /// 提交：暂存记录按提交顺序进入共享存储
    pub async fn commit(self) {
        if self.staged.is_empty() {
            return;
        }
        let mut records = self.store.inner.lock().await;
        records.extend(self.staged);
    }

    /// 回滚：显式丢弃暂存记录（与直接 drop 等价）
    pub fn rollback(self) {}
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    type Tx = MemoryTx;

    async fn insert_pending(
        &self,
        tx: &mut Self::Tx,
        namespace: &str,
        topic: &str,
        payload: &Value,
    ) -> OutboxResult<String> {
        if !Arc::ptr_eq(&self.inner, &tx.store.inner) {
            return Err(OutboxError::Store {
                reason: "transaction belongs to a different store".to_string(),
            });
        }

        let id = Uuid::new_v4().to_string();
        let record = EventRecord::builder()
            .id(id.clone())
            .namespace(namespace.to_string())
            .topic(topic.to_string())
            .payload(payload.clone())
            .status(EventStatus::Pending)
            .attempts(0)
            .created_at(Utc::now())
            .build();
        tx.staged.push(record);
        Ok(id)
    }

    async fn load_pending(&self, namespace: &str, limit: usize) -> OutboxResult<Vec<EventRecord>> {
        let records = self.inner.lock().await;
        Ok(records
            .iter()
            .filter(|r| r.namespace() == namespace && r.status() == EventStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_delivered(&self, id: &str) -> OutboxResult<()> {
        self.with_record(id, |r| r.set_status(EventStatus::Delivered))
            .await
    }

    async fn increment_attempts(&self, id: &str) -> OutboxResult<u32> {
        self.with_record(id, EventRecord::bump_attempts).await
    }

    async fn mark_dead(&self, id: &str, _reason: &str) -> OutboxResult<()> {
        self.with_record(id, |r| r.set_status(EventStatus::Dead))
            .await
    }
}
