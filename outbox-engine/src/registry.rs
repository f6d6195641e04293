//! 主题注册表（NamespaceRegistry）
//!
//! 每个业务命名空间一份 topic → handler 的映射。
//! 注册在命名空间初始化阶段完成，调度器启动后不再变更，
//! 避免注册与调度观察到未注册主题之间的竞争。
//! 重复注册同一主题视为调用方错误，直接拒绝而非后写覆盖。
//!
use crate::error::{OutboxError, OutboxResult};
use crate::handler::TopicHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// 命名空间注册表：仅内存映射，不触达存储
pub struct NamespaceRegistry {
    namespace: String,
    handlers: HashMap<String, Arc<dyn TopicHandler>>,
}

impl NamespaceRegistry {
    pub fn builder(namespace: impl Into<String>) -> NamespaceRegistryBuilder {
        NamespaceRegistryBuilder {
            namespace: namespace.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, topic: &str) -> Option<&Arc<dyn TopicHandler>> {
        self.handlers.get(topic)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.handlers.contains_key(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

/// 注册表构造器：收集处理器并拒绝重复主题
pub struct NamespaceRegistryBuilder {
    namespace: String,
    handlers: HashMap<String, Arc<dyn TopicHandler>>,
}

impl NamespaceRegistryBuilder {
    pub fn handler(mut self, handler: Arc<dyn TopicHandler>) -> OutboxResult<Self> {
        let topic = handler.topic().to_string();
        if self.handlers.contains_key(&topic) {
            return Err(OutboxError::TopicAlreadyRegistered {
                namespace: self.namespace,
                topic,
            });
        }
        self.handlers.insert(topic, handler);
        Ok(self)
    }

    pub fn build(self) -> NamespaceRegistry {
        NamespaceRegistry {
            namespace: self.namespace,
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Noop(&'static str);

    #[async_trait]
    impl TopicHandler for Noop {
        fn topic(&self) -> &str {
            self.0
        }
        fn validate(&self, _payload: &Value) -> OutboxResult<()> {
            Ok(())
        }
        async fn handle(&self, _payload: &Value) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn duplicate_topic_is_rejected() {
        let result = NamespaceRegistry::builder("user")
            .handler(Arc::new(Noop("user.added")))
            .and_then(|b| b.handler(Arc::new(Noop("user.added"))));

        assert!(matches!(
            result,
            Err(OutboxError::TopicAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn lookup_by_topic() {
        let registry = NamespaceRegistry::builder("user")
            .handler(Arc::new(Noop("user.added")))
            .and_then(|b| b.handler(Arc::new(Noop("user.deleted"))))
            .map(NamespaceRegistryBuilder::build)
            .unwrap();

        assert_eq!(registry.namespace(), "user");
        assert!(registry.contains("user.added"));
        assert!(registry.get("user.updated").is_none());
        assert_eq!(registry.topics().count(), 2);
    }
}
