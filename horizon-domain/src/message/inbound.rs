use super::{MessageKind, TopicMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 驱动聚合器的入站消息
///
/// 由处理服务根据订阅的消息种类构造；迁移服务将源状态的事件映射为 `Migration`。
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Command(TopicMessage),
    Event(TopicMessage),
    Request(TopicMessage),
    Migration(TopicMessage),
}

impl InboundMessage {
    pub fn message(&self) -> &TopicMessage {
        match self {
            InboundMessage::Command(m)
            | InboundMessage::Event(m)
            | InboundMessage::Request(m)
            | InboundMessage::Migration(m) => m,
        }
    }

    pub fn key(&self) -> &str {
        self.message().stream_id()
    }

    pub fn type_name(&self) -> &str {
        self.message().type_name()
    }

    pub fn label(&self) -> &'static str {
        match self {
            InboundMessage::Command(_) => "command",
            InboundMessage::Event(_) => "event",
            InboundMessage::Request(_) => "request",
            InboundMessage::Migration(_) => "migration",
        }
    }
}

/// 业务校验失败（非错误）：状态不变，产出拒绝响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// 响应消息的类型名
pub const RESPONSE_TYPE: &str = "horizon.Response";

/// 响应状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok { payload: Value },
    Rejected { reason: String },
}

/// 响应载荷：关联到触发它的命令/请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub request_id: String,
    pub request_type: String,
    #[serde(flatten)]
    pub status: ResponseStatus,
}

impl ResponseBody {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, ResponseStatus::Ok { .. })
    }
}

/// 聚合器的产出：目标主题 + 消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub topic: String,
    pub message: TopicMessage,
}

impl Output {
    pub fn new(topic: impl Into<String>, message: TopicMessage) -> Self {
        Self {
            topic: topic.into(),
            message,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }
}
