//! 主题处理器（TopicHandler）
//!
//! 定义消费某一主题事件的处理逻辑与元信息：
//! - `topic`：处理器订阅的主题名；
//! - `validate`：入箱时的载荷校验（主题的结构约定）；
//! - `handle`：投递时的实际处理，至少一次语义下必须幂等。
//!
//! `TypedHandler` 提供带类型载荷的便捷形态：经 serde 校验与解码，
//! 不做任何运行时类型断言。
//!
use crate::error::{OutboxError, OutboxResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 主题处理器：处理某一主题的事件载荷
#[async_trait]
pub trait TopicHandler: Send + Sync {
    /// 订阅的主题名（命名空间内唯一）
    fn topic(&self) -> &str;

    /// 入箱时校验载荷是否符合该主题的结构约定
    fn validate(&self, payload: &Value) -> OutboxResult<()>;

    /// 处理事件载荷；返回错误则记录保持 Pending 并择机重试
    async fn handle(&self, payload: &Value) -> anyhow::Result<()>;
}

/// 带类型载荷的处理器：由 serde 负责校验与解码
#[async_trait]
pub trait TypedHandler: Send + Sync {
    /// 该主题的载荷类型
    type Payload: DeserializeOwned + Send;

    fn topic(&self) -> &str;

    async fn handle(&self, payload: Self::Payload) -> anyhow::Result<()>;
}

#[async_trait]
impl<H: TypedHandler> TopicHandler for H {
    fn topic(&self) -> &str {
        TypedHandler::topic(self)
    }

    fn validate(&self, payload: &Value) -> OutboxResult<()> {
        serde_json::from_value::<H::Payload>(payload.clone())
            .map(drop)
            .map_err(|e| OutboxError::InvalidPayload {
                topic: TypedHandler::topic(self).to_string(),
                reason: e.to_string(),
            })
    }

    async fn handle(&self, payload: &Value) -> anyhow::Result<()> {
        let decoded: H::Payload = serde_json::from_value(payload.clone())?;
        TypedHandler::handle(self, decoded).await
    }
}
