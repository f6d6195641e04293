//! 事件记录（EventRecord）
//!
//! 本子系统唯一的持久化实体：一条待投递的出箱记录。
//! 记录只在调用方事务内创建，事务回滚则记录不存在；
//! namespace 与 topic 一经创建不可变更。
//!
use crate::error::{OutboxError, OutboxResult};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 记录状态：Pending 可投递，Delivered 已投递（归档），Dead 死信（不再重试）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Delivered,
    Dead,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Delivered => "delivered",
            EventStatus::Dead => "dead",
        }
    }

    /// 从存储层的文本形态解析（用于 TEXT 列）
    pub fn parse(s: &str) -> OutboxResult<Self> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "delivered" => Ok(EventStatus::Delivered),
            "dead" => Ok(EventStatus::Dead),
            other => Err(OutboxError::InvalidValue {
                reason: format!("unknown event status: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct EventRecord {
    /// 记录唯一标识符，由存储层在插入时赋值
    id: String,
    /// 业务命名空间（每个命名空间独立的注册表与调度任务）
    namespace: String,
    /// 命名空间内的逻辑事件名，用于选择处理器
    topic: String,
    /// 事件负载，引擎不解释其内容
    payload: Value,
    /// 记录状态
    status: EventStatus,
    /// 已尝试投递次数，处理器失败时递增
    attempts: u32,
    /// 插入时间
    created_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn set_status(&mut self, status: EventStatus) {
        self.status = status;
    }

    pub(crate) fn bump_attempts(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for s in [EventStatus::Pending, EventStatus::Delivered, EventStatus::Dead] {
            assert_eq!(EventStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(EventStatus::parse("archived").is_err());
    }
}
