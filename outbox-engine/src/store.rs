//! 出箱存储（OutboxStore）协议
//!
//! 定义待投递记录的持久化契约：
//! - `insert_pending`：在调用方已打开的事务内追加一条 Pending 记录，
//!   不做任何独立提交，原子性完全由事务成员关系保证；
//! - `load_pending`：按创建顺序加载某命名空间的 Pending 记录；
//! - `mark_delivered` / `increment_attempts` / `mark_dead`：投递结果标记。
//!
//! 事务句柄类型由实现决定（关联类型 `Tx`），引擎不拥有也不回滚事务。
//!
use crate::error::OutboxResult;
use crate::record::EventRecord;
use async_trait::async_trait;
use serde_json::Value;

/// 出箱存储：待投递记录的唯一共享资源
#[async_trait]
pub trait OutboxStore: Send + Sync + 'static {
    /// 调用方事务句柄类型（如 `sqlx::Transaction`、内存事务等）
    type Tx: Send;

    /// 在调用方事务内插入一条 Pending 记录，返回存储层分配的记录 ID。
    /// 插入失败时由调用方负责回滚其自身事务。
    async fn insert_pending(
        &self,
        tx: &mut Self::Tx,
        namespace: &str,
        topic: &str,
        payload: &Value,
    ) -> OutboxResult<String>;

    /// 按创建顺序加载某命名空间的 Pending 记录（最多 `limit` 条）
    async fn load_pending(&self, namespace: &str, limit: usize) -> OutboxResult<Vec<EventRecord>>;

    /// 标记记录已成功投递
    async fn mark_delivered(&self, id: &str) -> OutboxResult<()>;

    /// 递增尝试次数，返回递增后的值
    async fn increment_attempts(&self, id: &str) -> OutboxResult<u32>;

    /// 标记记录为死信（达到重试上限后移出活跃重试）
    async fn mark_dead(&self, id: &str, reason: &str) -> OutboxResult<()>;
}
