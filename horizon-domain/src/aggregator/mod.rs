//! 聚合器（aggregator）
//!
//! 纯函数式的状态归约：给定当前状态行与同一聚合的有序入站消息，
//! 产出新的状态与有序的输出消息。
//!
//! - `SnapshotAggregator`：命令与请求驱动快照，产出事件与响应；
//! - `ViewAggregator`：事件驱动视图，无输出；
//! - `MigrationAggregator`：源状态的事件驱动目标快照，无输出。
//!
//! 归约无副作用且可重放：输出 id 由入站消息 id 与输出序号派生（UUIDv5），
//! 输出时间取入站消息时间，对同一输入得到完全相同的结果。
//! 不接受的消息种类或无法解码的载荷为致命错误。
//!
mod migration;
mod snapshot;
mod view;

pub use migration::MigrationAggregator;
pub use snapshot::SnapshotAggregator;
pub use view::ViewAggregator;

use crate::error::DomainResult;
use crate::message::{Action, InboundMessage, MessageKind, Output, TopicMessage};
use crate::state::{State, Stateful};
use uuid::Uuid;

/// 状态归约器
pub trait Reducer: Send + Sync + 'static {
    type Row: Stateful;

    /// 将订阅到的消息归类为入站消息
    fn classify(&self, message: TopicMessage) -> DomainResult<InboundMessage>;

    /// 依序应用入站消息；返回 `Err` 时调用方必须丢弃被修改的行
    fn reduce(
        &self,
        row: &mut Self::Row,
        inbound: &[InboundMessage],
    ) -> DomainResult<Vec<Output>>;

    fn state_type(&self) -> &'static str {
        <<Self::Row as Stateful>::Payload as State>::TYPE
    }
}

/// 由入站消息派生输出，保证 id 与时间可重放
struct Emitter<'a> {
    source: &'a TopicMessage,
    index: usize,
    outputs: &'a mut Vec<Output>,
}

impl<'a> Emitter<'a> {
    fn new(source: &'a TopicMessage, outputs: &'a mut Vec<Output>) -> Self {
        Self {
            source,
            index: 0,
            outputs,
        }
    }

    fn next_id(&mut self) -> String {
        let name = format!("{}/{}", self.source.id(), self.index);
        self.index += 1;
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    fn emit<A: Action>(&mut self, topic: &str, kind: MessageKind, action: &A) -> DomainResult<()> {
        let payload = serde_json::to_value(action)?;
        self.emit_raw(topic, kind, action.action_type(), payload);
        Ok(())
    }

    fn emit_raw(&mut self, topic: &str, kind: MessageKind, type_name: &str, payload: serde_json::Value) {
        let message = TopicMessage::builder()
            .id(self.next_id())
            .kind(kind)
            .stream_id(self.source.stream_id().to_string())
            .type_name(type_name.to_string())
            .payload(payload)
            .maybe_sender_id(self.source.sender_id().map(str::to_string))
            .occurred_at(self.source.occurred_at())
            .build();
        self.outputs.push(Output::new(topic, message));
    }
}

/// 应用事件：每个事件版本加一，时间取入站消息时间
fn apply_events<R: Stateful>(
    row: &mut R,
    events: &[<R::Payload as State>::Event],
    at: chrono::DateTime<chrono::Utc>,
) {
    for event in events {
        row.payload_mut().apply(event);
        row.touch(at);
    }
}
