//! 线上消息形态（TopicMessage）
//!
//! 生产者按聚合标识（`stream_id`）发布到主题的统一消息格式，
//! 载荷为动作枚举的 JSON 形态，`type_name` 为其类型名。
//!
use super::Action;
use crate::error::{DomainError, DomainResult};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// 聚合实例标识，同时作为流的分区键与锁的 id
pub type AggregateKey = String;

/// 消息种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Command,
    Event,
    Request,
    Response,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Command => "command",
            MessageKind::Event => "event",
            MessageKind::Request => "request",
            MessageKind::Response => "response",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct TopicMessage {
    /// 消息唯一标识
    #[builder(default = Uuid::new_v4().to_string())]
    id: String,
    kind: MessageKind,
    /// 聚合标识（分区键）
    stream_id: AggregateKey,
    /// 载荷的类型名
    type_name: String,
    payload: Value,
    /// 发送方标识，响应会投递到带该后缀的响应主题
    sender_id: Option<String>,
    /// 主题内序号，由传输层在发布时赋值
    #[builder(default)]
    sequence: u64,
    #[builder(default = Utc::now())]
    occurred_at: DateTime<Utc>,
}

impl TopicMessage {
    /// 将动作编码为消息
    pub fn encode<A: Action>(
        kind: MessageKind,
        stream_id: impl Into<AggregateKey>,
        action: &A,
    ) -> DomainResult<Self> {
        Ok(Self::builder()
            .kind(kind)
            .stream_id(stream_id.into())
            .type_name(action.action_type().to_string())
            .payload(serde_json::to_value(action)?)
            .build())
    }

    /// 将载荷解码为动作，并校验类型名一致
    pub fn decode<A: Action>(&self) -> DomainResult<A> {
        let action: A = serde_json::from_value(self.payload.clone())?;
        if action.action_type() != self.type_name {
            return Err(DomainError::TypeMismatch {
                expected: self.type_name.clone(),
                found: action.action_type().to_string(),
            });
        }
        Ok(action)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn sender_id(&self) -> Option<&str> {
        self.sender_id.as_deref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    pub fn with_occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = at;
        self
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}
