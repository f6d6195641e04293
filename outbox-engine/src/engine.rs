//! 出箱引擎（OutboxEngine）
//!
//! 显式依赖注入的引擎上下文：持有存储与配置，不依赖任何全局单例，
//! 因而可以按测试、按进程创建多个实例。
//! - `register`：一次性、无竞争地创建命名空间并启动其调度任务，
//!   重复注册直接报错而非静默吞掉；
//! - `handle`：重复获取同一命名空间句柄，得到同一实例；
//! - `shutdown` / `join`：受监督的关闭流程，各调度器排空后退出。
//!
//! 业务侧通过 `NamespaceHandle` 在自己的事务内入箱、提交后唤醒。
//!
use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::error::{OutboxError, OutboxResult};
use crate::registry::NamespaceRegistry;
use crate::signal::{WakeupSignal, wakeup_channel};
use crate::store::OutboxStore;
use bon::Builder;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// 出箱引擎：命名空间表 + 调度任务的监督者
#[derive(Builder)]
pub struct OutboxEngine<S: OutboxStore> {
    store: Arc<S>,
    #[builder(default)]
    config: DispatcherConfig,
    #[builder(skip = DashMap::new())]
    namespaces: DashMap<String, NamespaceHandle<S>>,
    #[builder(skip = CancellationToken::new())]
    token: CancellationToken,
    #[builder(skip = TaskTracker::new())]
    tracker: TaskTracker,
}

impl<S: OutboxStore> OutboxEngine<S> {
    /// 一次性创建命名空间并启动其调度任务。
    /// 同名命名空间已存在时返回 `NamespaceExists`。
    pub fn register(&self, registry: NamespaceRegistry) -> OutboxResult<NamespaceHandle<S>> {
        let name = registry.namespace().to_string();
        match self.namespaces.entry(name.clone()) {
            Entry::Occupied(_) => Err(OutboxError::NamespaceExists { namespace: name }),
            Entry::Vacant(slot) => {
                let registry = Arc::new(registry);
                let (signal, listener) = wakeup_channel();
                let dispatcher = Dispatcher::new(
                    registry.clone(),
                    self.store.clone(),
                    listener,
                    self.config,
                    self.token.child_token(),
                );
                self.tracker.spawn(dispatcher.run());
                debug!(namespace = %name, "namespace registered, dispatcher started");

                let handle = NamespaceHandle {
                    inner: Arc::new(HandleInner {
                        namespace: name,
                        store: self.store.clone(),
                        registry,
                        signal,
                    }),
                };
                slot.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    /// 获取已注册命名空间的句柄；重复调用返回同一实例
    pub fn handle(&self, namespace: &str) -> Option<NamespaceHandle<S>> {
        self.namespaces.get(namespace).map(|e| e.clone())
    }

    /// 请求关闭全部调度任务（各自做最后一次排空扫描）
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// 等待全部调度任务退出。应在所有命名空间注册完成之后、
    /// `shutdown` 之后调用。
    pub async fn join(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl<S: OutboxStore> Drop for OutboxEngine<S> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

struct HandleInner<S: OutboxStore> {
    namespace: String,
    store: Arc<S>,
    registry: Arc<NamespaceRegistry>,
    signal: WakeupSignal,
}

/// 命名空间句柄：业务侧的入箱与唤醒入口
pub struct NamespaceHandle<S: OutboxStore> {
    inner: Arc<HandleInner<S>>,
}

// 手写 Clone，避免给 S 附加 Clone 约束
impl<S: OutboxStore> Clone for NamespaceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: OutboxStore> NamespaceHandle<S> {
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// 在调用方事务内追加一条 Pending 记录。
    /// 入箱时即校验主题已注册、载荷符合主题约定，
    /// 配置错误在提交前暴露而不是留到投递时。
    /// 返回错误时由调用方回滚其自身事务。
    pub async fn enqueue(
        &self,
        topic: &str,
        payload: Value,
        tx: &mut S::Tx,
    ) -> OutboxResult<String> {
        let handler = self
            .inner
            .registry
            .get(topic)
            .ok_or_else(|| OutboxError::UnknownTopic {
                namespace: self.inner.namespace.clone(),
                topic: topic.to_string(),
            })?;
        handler.validate(&payload)?;

        self.inner
            .store
            .insert_pending(tx, &self.inner.namespace, topic, &payload)
            .await
    }

    /// 触发一次扫描；必须在事务提交之后调用。
    /// 非阻塞、可合并，丢失由周期兜底扫描补偿。
    pub fn notify(&self) {
        self.inner.signal.notify();
    }
}
