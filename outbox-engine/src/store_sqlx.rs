//! Postgres 版出箱存储（PgOutboxStore）
//!
//! 基于 sqlx 的 `OutboxStore` 实现：事务句柄即 `sqlx::Transaction`，
//! 插入借助调用方事务的原子性，提交前对调度器不可见。
//! 单进程内每个命名空间只应运行一个调度器；查询形态与未来的
//! `FOR UPDATE SKIP LOCKED` 多副本认领保持兼容。
//!
use crate::error::OutboxResult;
use crate::record::{EventRecord, EventStatus};
use crate::store::OutboxStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS outbox_events (
    id         TEXT PRIMARY KEY,
    namespace  TEXT NOT NULL,
    topic      TEXT NOT NULL,
    payload    JSONB NOT NULL,
    status     TEXT NOT NULL DEFAULT 'pending',
    attempts   INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS outbox_events_pending_idx
    ON outbox_events (namespace, status, created_at);
"#;

pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 建表与索引（本地开发与测试用；生产环境建议走迁移）
    pub async fn ensure_schema(&self) -> OutboxResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> OutboxResult<EventRecord> {
    let status: String = row.try_get("status")?;
    let attempts: i32 = row.try_get("attempts")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(EventRecord::builder()
        .id(row.try_get::<String, _>("id")?)
        .namespace(row.try_get::<String, _>("namespace")?)
        .topic(row.try_get::<String, _>("topic")?)
        .payload(row.try_get::<Value, _>("payload")?)
        .status(EventStatus::parse(&status)?)
        .attempts(attempts.max(0) as u32)
        .created_at(created_at)
        .build())
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    type Tx = Transaction<'static, Postgres>;

    async fn insert_pending(
        &self,
        tx: &mut Self::Tx,
        namespace: &str,
        topic: &str,
        payload: &Value,
    ) -> OutboxResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO outbox_events (id, namespace, topic, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&id)
        .bind(namespace)
        .bind(topic)
        .bind(payload)
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn load_pending(&self, namespace: &str, limit: usize) -> OutboxResult<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, namespace, topic, payload, status, attempts, created_at
            FROM outbox_events
            WHERE namespace = $1 AND status = 'pending'
            ORDER BY created_at, id
            LIMIT $2
            "#,
        )
        .bind(namespace)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn mark_delivered(&self, id: &str) -> OutboxResult<()> {
        sqlx::query("UPDATE outbox_events SET status = 'delivered' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_attempts(&self, id: &str) -> OutboxResult<u32> {
        let row = sqlx::query(
            "UPDATE outbox_events SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        let attempts: i32 = row.try_get("attempts")?;
        Ok(attempts.max(0) as u32)
    }

    async fn mark_dead(&self, id: &str, reason: &str) -> OutboxResult<()> {
        sqlx::query("UPDATE outbox_events SET status = 'dead', last_error = $2 WHERE id = $1")
            .bind(id)
            .bind(reason)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
