//! 调度器（Dispatcher）
//!
//! 每个命名空间一个长驻任务，编排"等待 → 扫描 → 逐条投递"的循环：
//! - 由唤醒信号或周期兜底扫描触发（兜底扫描负责进程重启后
//!   没有内存信号、但存量 Pending 记录仍在的恢复场景）；
//! - 按创建顺序逐条调用注册的处理器，单条失败不影响同批其余记录；
//! - 处理器失败或超时则递增 attempts，达到上限转入死信；
//! - 出现失败的扫描之后按指数退避节流，避免对持续失败的处理器热循环；
//! - 收到取消令牌后做最后一次排空扫描再退出。
//!
use crate::record::EventRecord;
use crate::registry::NamespaceRegistry;
use crate::signal::WakeupListener;
use crate::store::OutboxStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// 调度器配置
#[derive(Clone, Copy, Debug)]
pub struct DispatcherConfig {
    /// 兜底扫描间隔（唤醒信号丢失或从未发出时的活性保证）
    pub poll_interval: Duration,
    /// 单次处理器调用的超时上限
    pub handler_timeout: Duration,
    /// 转入死信前的尝试次数上限
    pub max_attempts: u32,
    /// 失败扫描后的退避基准
    pub retry_backoff: Duration,
    /// 退避上限
    pub max_backoff: Duration,
    /// 单批扫描的记录数上限
    pub batch_limit: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            handler_timeout: Duration::from_secs(30),
            max_attempts: 10,
            retry_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            batch_limit: 128,
        }
    }
}

pub(crate) struct Dispatcher<S: OutboxStore> {
    namespace: String,
    registry: Arc<NamespaceRegistry>,
    store: Arc<S>,
    wakeup: WakeupListener,
    config: DispatcherConfig,
    token: CancellationToken,
}

impl<S: OutboxStore> Dispatcher<S> {
    pub(crate) fn new(
        registry: Arc<NamespaceRegistry>,
        store: Arc<S>,
        wakeup: WakeupListener,
        config: DispatcherConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            namespace: registry.namespace().to_string(),
            registry,
            store,
            wakeup,
            config,
            token,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ticker = time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval 的首个 tick 立即完成，顺带覆盖启动时的存量扫描
        let mut failure_streak: u32 = 0;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    self.scan_batch().await;
                    break;
                }
                _ = ticker.tick() => {}
                _ = self.wakeup.recv() => {}
            }

            let failures = self.scan_batch().await;
            if failures == 0 {
                failure_streak = 0;
                continue;
            }

            failure_streak = failure_streak.saturating_add(1);
            let backoff = backoff_delay(
                self.config.retry_backoff,
                self.config.max_backoff,
                failure_streak,
            );
            debug!(
                namespace = %self.namespace,
                failures,
                backoff_ms = backoff.as_millis() as u64,
                "scan had failures, backing off"
            );
            tokio::select! {
                _ = self.token.cancelled() => {
                    self.scan_batch().await;
                    break;
                }
                _ = time::sleep(backoff) => {}
            }
        }

        debug!(namespace = %self.namespace, "dispatcher stopped");
    }

    /// 扫描一批 Pending 记录并逐条投递，返回本批失败条数
    async fn scan_batch(&self) -> usize {
        let records = match self
            .store
            .load_pending(&self.namespace, self.config.batch_limit)
            .await
        {
            Ok(records) => records,
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "failed to load pending records");
                return 1;
            }
        };
        if records.is_empty() {
            return 0;
        }
        debug!(namespace = %self.namespace, count = records.len(), "scanning pending records");

        let mut failures = 0;
        for record in &records {
            if !self.dispatch_one(record).await {
                failures += 1;
            }
        }
        failures
    }

    /// 投递单条记录；处理器成功且标记完成才算成功
    async fn dispatch_one(&self, record: &EventRecord) -> bool {
        let Some(handler) = self.registry.get(record.topic()) else {
            // 配置缺陷：主题无处理器。大声记录并走失败计数，
            // 最终由死信兜底，绝不让调度任务崩溃。
            error!(
                namespace = %self.namespace,
                topic = record.topic(),
                id = record.id(),
                "no handler registered for topic"
            );
            self.note_failure(record, "no handler registered").await;
            return false;
        };

        match time::timeout(self.config.handler_timeout, handler.handle(record.payload())).await {
            Ok(Ok(())) => {
                if let Err(err) = self.store.mark_delivered(record.id()).await {
                    // 标记失败则记录保持 Pending，后续重复投递，
                    // 由处理器的幂等性吸收
                    warn!(
                        namespace = %self.namespace,
                        id = record.id(),
                        error = %err,
                        "handler succeeded but mark_delivered failed, record will be redelivered"
                    );
                    return false;
                }
                true
            }
            Ok(Err(err)) => {
                warn!(
                    namespace = %self.namespace,
                    topic = record.topic(),
                    id = record.id(),
                    attempts = record.attempts() + 1,
                    error = %err,
                    "handler failed"
                );
                self.note_failure(record, &err.to_string()).await;
                false
            }
            Err(_elapsed) => {
                warn!(
                    namespace = %self.namespace,
                    topic = record.topic(),
                    id = record.id(),
                    timeout_ms = self.config.handler_timeout.as_millis() as u64,
                    "handler timed out"
                );
                self.note_failure(record, "handler timed out").await;
                false
            }
        }
    }

    async fn note_failure(&self, record: &EventRecord, reason: &str) {
        match self.store.increment_attempts(record.id()).await {
            Ok(attempts) if attempts >= self.config.max_attempts => {
                error!(
                    namespace = %self.namespace,
                    topic = record.topic(),
                    id = record.id(),
                    attempts,
                    "attempt ceiling reached, moving record to dead letter"
                );
                if let Err(err) = self.store.mark_dead(record.id(), reason).await {
                    warn!(id = record.id(), error = %err, "failed to mark record dead");
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(id = record.id(), error = %err, "failed to increment attempts");
            }
        }
    }
}

/// 指数退避：base * 2^(streak-1)，封顶 max
fn backoff_delay(base: Duration, max: Duration, streak: u32) -> Duration {
    let shift = streak.saturating_sub(1).min(16);
    base.checked_mul(1u32 << shift).map_or(max, |d| d.min(max))
}
