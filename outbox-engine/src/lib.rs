//! 事务出箱与可靠事件投递引擎（outbox-engine）
//!
//! 保证"数据库变更提交成功，外部副作用（审计、通知、会话失效）
//! 最终一定发生"的基础库：
//! - 记录模型（`record`）与出箱存储协议（`store`）
//! - 主题处理器（`handler`）与命名空间注册表（`registry`）
//! - 合并式唤醒信号（`signal`）与长驻调度器（`dispatcher`）
//! - 引擎门面（`engine`）：依赖注入、命名空间生命周期与受监督关闭
//!
//! 本 crate 不绑定具体存储与下游实现，仅定义协议与运行时；
//! 内置内存存储用于测试与本地开发，Postgres 适配经
//! `store-sqlx` 特性启用。
//!
//! 典型用法：
//! 1. 为每个主题实现 `TypedHandler`（或直接实现 `TopicHandler`）；
//! 2. 用 `NamespaceRegistry::builder` 组装命名空间注册表；
//! 3. 构建 `OutboxEngine` 并 `register` 各命名空间；
//! 4. 业务事务内 `enqueue`，提交后 `notify`，其余交给调度器。
//!
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handler;
pub mod record;
pub mod registry;
pub mod signal;
pub mod store;
pub mod store_inmemory;
#[cfg(feature = "store-sqlx")]
pub mod store_sqlx;

pub use dispatcher::DispatcherConfig;
pub use engine::{NamespaceHandle, OutboxEngine};
pub use error::{OutboxError, OutboxResult};
pub use handler::{TopicHandler, TypedHandler};
pub use record::{EventRecord, EventStatus};
pub use registry::{NamespaceRegistry, NamespaceRegistryBuilder};
pub use signal::{WakeupListener, WakeupSignal, wakeup_channel};
pub use store::OutboxStore;
pub use store_inmemory::{InMemoryStore, MemoryTx};
#[cfg(feature = "store-sqlx")]
pub use store_sqlx::PgOutboxStore;
