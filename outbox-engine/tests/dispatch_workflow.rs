use async_trait::async_trait;
use outbox_engine::{
    DispatcherConfig, EventRecord, EventStatus, InMemoryStore, MemoryTx, NamespaceRegistry,
    OutboxEngine, OutboxError, OutboxResult, OutboxStore, TopicHandler,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone)]
struct SpyHandler {
    topic: &'static str,
    calls: Arc<Mutex<Vec<Value>>>,
    fail_always: bool,
    delay: Option<Duration>,
}

impl SpyHandler {
    fn new(topic: &'static str) -> Self {
        Self {
            topic,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_always: false,
            delay: None,
        }
    }

    fn failing(topic: &'static str) -> Self {
        Self {
            fail_always: true,
            ..Self::new(topic)
        }
    }

    fn wedged(topic: &'static str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(topic)
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TopicHandler for SpyHandler {
    fn topic(&self) -> &str {
        self.topic
    }

    fn validate(&self, _payload: &Value) -> OutboxResult<()> {
        Ok(())
    }

    async fn handle(&self, payload: &Value) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(payload.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_always {
            anyhow::bail!("handler requested to fail");
        }
        Ok(())
    }
}

fn registry(namespace: &str, handlers: &[SpyHandler]) -> NamespaceRegistry {
    let mut builder = NamespaceRegistry::builder(namespace);
    for h in handlers {
        builder = builder.handler(Arc::new(h.clone())).unwrap();
    }
    builder.build()
}

fn fast_config() -> DispatcherConfig {
    DispatcherConfig {
        poll_interval: Duration::from_millis(50),
        handler_timeout: Duration::from_secs(1),
        max_attempts: 10,
        retry_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(100),
        batch_limit: 64,
    }
}

/// timeout + 条件轮询，避免固定 sleep 的脆弱性
async fn wait_until(cond: impl Fn() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if cond() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// 等待某条记录达到目标状态
async fn wait_for_status(store: &InMemoryStore, id: &str, status: EventStatus) -> bool {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let hit = store
                .records()
                .await
                .iter()
                .any(|r| r.id() == id && r.status() == status);
            if hit {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test(flavor = "multi_thread")]
async fn committed_enqueue_is_delivered_at_least_once() {
    let store = Arc::new(InMemoryStore::new());
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(fast_config())
        .build();
    let handler = SpyHandler::new("group.added");
    let ns = engine
        .register(registry("group", &[handler.clone()]))
        .unwrap();

    let payload = json!({"visitor": "v-1", "group_info": {"name": "staff", "gid": 7}});
    let mut tx = store.begin();
    let id = ns
        .enqueue("group.added", payload.clone(), &mut tx)
        .await
        .unwrap();
    tx.commit().await;
    ns.notify();

    assert!(wait_until(|| handler.call_count() >= 1).await);
    assert_eq!(handler.calls.lock().unwrap()[0], payload);
    assert!(wait_for_status(&store, &id, EventStatus::Delivered).await);
    // 没有多余的重复投递
    assert_eq!(handler.call_count(), 1);

    engine.shutdown();
    engine.join().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rolled_back_enqueue_is_never_observed() {
    let store = Arc::new(InMemoryStore::new());
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(fast_config())
        .build();
    let handler = SpyHandler::new("user.added");
    let ns = engine
        .register(registry("user", &[handler.clone()]))
        .unwrap();

    let mut tx = store.begin();
    ns.enqueue("user.added", json!({"id": "u-1"}), &mut tx)
        .await
        .unwrap();
    tx.rollback();

    // 留足若干个兜底扫描周期
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handler.call_count(), 0);
    assert!(store.records().await.is_empty());

    engine.shutdown();
    engine.join().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn coalesced_notifications_do_not_starve_records() {
    let store = Arc::new(InMemoryStore::new());
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(fast_config())
        .build();
    let handler = SpyHandler::new("config.changed");
    let ns = engine
        .register(registry("config", &[handler.clone()]))
        .unwrap();

    // 快速连发：多数 notify 会被合并，但每条记录都必须被后续扫描覆盖
    let total = 20;
    for i in 0..total {
        let mut tx = store.begin();
        ns.enqueue("config.changed", json!({"key": format!("k{i}")}), &mut tx)
            .await
            .unwrap();
        tx.commit().await;
        ns.notify();
    }

    assert!(wait_until(|| handler.call_count() >= total).await);
    assert_eq!(handler.call_count(), total);

    engine.shutdown();
    engine.join().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_namespace_does_not_stall_another() {
    let store = Arc::new(InMemoryStore::new());
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(fast_config())
        .build();
    let bad = SpyHandler::failing("app.added");
    let good = SpyHandler::new("share.created");
    let ns_app = engine.register(registry("app", &[bad.clone()])).unwrap();
    let ns_share = engine
        .register(registry("anonymous-share", &[good.clone()]))
        .unwrap();

    let mut tx = store.begin();
    ns_app
        .enqueue("app.added", json!({"app": "scanner"}), &mut tx)
        .await
        .unwrap();
    ns_share
        .enqueue("share.created", json!({"token": "t-1"}), &mut tx)
        .await
        .unwrap();
    tx.commit().await;
    ns_app.notify();
    ns_share.notify();

    // app 命名空间持续失败，不妨碍 anonymous-share 正常投递
    assert!(wait_until(|| good.call_count() >= 1 && bad.call_count() >= 2).await);
    assert_eq!(good.call_count(), 1);

    engine.shutdown();
    engine.join().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn permanently_failing_record_moves_to_dead_letter() {
    let store = Arc::new(InMemoryStore::new());
    let config = DispatcherConfig {
        max_attempts: 3,
        ..fast_config()
    };
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(config)
        .build();
    let handler = SpyHandler::failing("user.deleted");
    let ns = engine
        .register(registry("user", &[handler.clone()]))
        .unwrap();

    let mut tx = store.begin();
    let id = ns
        .enqueue("user.deleted", json!({"id": "u-9"}), &mut tx)
        .await
        .unwrap();
    tx.commit().await;
    ns.notify();

    assert!(wait_for_status(&store, &id, EventStatus::Dead).await);
    // 恰好尝试了 max_attempts 次后不再投递
    let calls = handler.call_count();
    assert_eq!(calls, 3);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handler.call_count(), calls);

    engine.shutdown();
    engine.join().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn fallback_poll_recovers_records_without_notify() {
    // 模拟进程重启：存量 Pending 记录在，内存信号不在
    let store = Arc::new(InMemoryStore::new());
    let mut tx = store.begin();
    store
        .insert_pending(&mut tx, "group", "group.removed", &json!({"gid": 3}))
        .await
        .unwrap();
    tx.commit().await;

    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(fast_config())
        .build();
    let handler = SpyHandler::new("group.removed");
    // 有意不调用 notify，只靠兜底扫描
    let _ns = engine
        .register(registry("group", &[handler.clone()]))
        .unwrap();

    assert!(wait_until(|| handler.call_count() >= 1).await);

    engine.shutdown();
    engine.join().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unregistered_topic_row_does_not_crash_dispatcher() {
    // 入箱校验通常会拦住未注册主题；这里直插存储，
    // 模拟配置回退后遗留的存量行
    let store = Arc::new(InMemoryStore::new());
    let mut tx = store.begin();
    let orphan = store
        .insert_pending(&mut tx, "config", "config.reloaded", &json!({}))
        .await
        .unwrap();
    tx.commit().await;

    let config = DispatcherConfig {
        max_attempts: 2,
        ..fast_config()
    };
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(config)
        .build();
    let handler = SpyHandler::new("config.changed");
    let ns = engine
        .register(registry("config", &[handler.clone()]))
        .unwrap();

    // 孤儿行最终进入死信，调度任务本身保持存活
    assert!(wait_for_status(&store, &orphan, EventStatus::Dead).await);

    let mut tx = store.begin();
    ns.enqueue("config.changed", json!({"key": "k"}), &mut tx)
        .await
        .unwrap();
    tx.commit().await;
    ns.notify();
    assert!(wait_until(|| handler.call_count() >= 1).await);

    engine.shutdown();
    engine.join().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn wedged_handler_is_bounded_by_timeout() {
    let store = Arc::new(InMemoryStore::new());
    let config = DispatcherConfig {
        handler_timeout: Duration::from_millis(30),
        max_attempts: 2,
        ..fast_config()
    };
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(config)
        .build();
    let handler = SpyHandler::wedged("app.added", Duration::from_secs(60));
    let ns = engine.register(registry("app", &[handler.clone()])).unwrap();

    let mut tx = store.begin();
    let id = ns
        .enqueue("app.added", json!({"app": "mail"}), &mut tx)
        .await
        .unwrap();
    tx.commit().await;
    ns.notify();

    // 卡死的处理器被超时中断并按失败计数，最终转入死信
    assert!(wait_for_status(&store, &id, EventStatus::Dead).await);
    assert_eq!(handler.call_count(), 2);

    engine.shutdown();
    engine.join().await;
}

/// 标记投递失败一次的存储包装：模拟处理器成功与 mark_delivered 之间崩溃
struct FlakyMarkStore {
    inner: InMemoryStore,
    fail_next_mark: AtomicBool,
    failed_marks: AtomicUsize,
}

#[async_trait]
impl OutboxStore for FlakyMarkStore {
    type Tx = MemoryTx;

    async fn insert_pending(
        &self,
        tx: &mut Self::Tx,
        namespace: &str,
        topic: &str,
        payload: &Value,
    ) -> OutboxResult<String> {
        self.inner
            .insert_pending(tx, namespace, topic, payload)
            .await
    }

    async fn load_pending(&self, namespace: &str, limit: usize) -> OutboxResult<Vec<EventRecord>> {
        self.inner.load_pending(namespace, limit).await
    }

    async fn mark_delivered(&self, id: &str) -> OutboxResult<()> {
        if self.fail_next_mark.swap(false, Ordering::SeqCst) {
            self.failed_marks.fetch_add(1, Ordering::SeqCst);
            return Err(OutboxError::Store {
                reason: "simulated crash before delivery mark".to_string(),
            });
        }
        self.inner.mark_delivered(id).await
    }

    async fn increment_attempts(&self, id: &str) -> OutboxResult<u32> {
        self.inner.increment_attempts(id).await
    }

    async fn mark_dead(&self, id: &str, reason: &str) -> OutboxResult<()> {
        self.inner.mark_dead(id, reason).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivery_after_lost_delivery_mark_is_idempotent() {
    let inner = InMemoryStore::new();
    let store = Arc::new(FlakyMarkStore {
        inner: inner.clone(),
        fail_next_mark: AtomicBool::new(true),
        failed_marks: AtomicUsize::new(0),
    });
    let engine = OutboxEngine::builder()
        .store(store.clone())
        .config(fast_config())
        .build();
    let handler = SpyHandler::new("share.expired");
    let ns = engine
        .register(registry("anonymous-share", &[handler.clone()]))
        .unwrap();

    let mut tx = inner.begin();
    let id = ns
        .enqueue("share.expired", json!({"token": "t-2"}), &mut tx)
        .await
        .unwrap();
    tx.commit().await;
    ns.notify();

    // 处理器成功但标记丢失 → 至少一次语义下重复投递，幂等处理器吸收重复
    assert!(wait_until(|| handler.call_count() >= 2).await);
    assert_eq!(store.failed_marks.load(Ordering::SeqCst), 1);
    assert!(wait_for_status(&inner, &id, EventStatus::Delivered).await);

    engine.shutdown();
    engine.join().await;
}
