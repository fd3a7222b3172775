use super::State;
use crate::message::Output;
use crate::persist::CrudEntity;
use crate::value_object::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::VecDeque;
use std::fmt;

/// 行上保留的已应用入站消息 id 数量下限
///
/// 单次归约的 id 总会全部保留，即使超过该值。
pub const APPLIED_WINDOW: usize = 1024;

/// 可持久化的状态信封
pub trait Stateful: CrudEntity + Serialize + DeserializeOwned + fmt::Debug {
    type Payload: State;

    /// 以默认载荷新建（版本 0）
    fn create(id: &str, at: DateTime<Utc>) -> Self;

    fn payload(&self) -> &Self::Payload;

    fn payload_mut(&mut self) -> &mut Self::Payload;

    fn state_version(&self) -> usize;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    /// 记录一次已应用的事件：版本加一并刷新更新时间
    fn touch(&mut self, at: DateTime<Utc>);

    /// 入站消息是否已经归约并落库
    fn is_applied(&self, message_id: &str) -> bool;

    /// 记录本次归约消费的入站消息 id
    fn mark_applied(&mut self, message_ids: &[&str]);

    /// 已落库、尚未确认发布的输出
    fn outbox(&self) -> &[Output];

    /// 将归约输出追加到待发布队列，随行一起落库
    fn stage(&mut self, outputs: Vec<Output>);

    fn take_outbox(&mut self) -> Vec<Output>;
}

macro_rules! state_envelope {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(bound = "T: State")]
        pub struct $name<T> {
            id: String,
            version: Version,
            state_version: usize,
            payload: T,
            created_at: DateTime<Utc>,
            updated_at: DateTime<Utc>,
            #[serde(default)]
            applied: VecDeque<String>,
            #[serde(default)]
            outbox: Vec<Output>,
        }

        impl<T: State> $name<T> {
            /// 以指定版本构造（用于装载已有数据或测试预置）
            pub fn with_payload(id: impl Into<String>, version: Version, payload: T) -> Self {
                let now = Utc::now();
                Self {
                    id: id.into(),
                    version,
                    state_version: T::SCHEMA_VERSION,
                    payload,
                    created_at: now,
                    updated_at: now,
                    applied: VecDeque::new(),
                    outbox: Vec::new(),
                }
            }
        }

        impl<T: State> CrudEntity for $name<T> {
            fn id(&self) -> &str {
                &self.id
            }

            fn version(&self) -> Version {
                self.version
            }
        }

        impl<T: State> Stateful for $name<T> {
            type Payload = T;

            fn create(id: &str, at: DateTime<Utc>) -> Self {
                Self {
                    id: id.to_string(),
                    version: Version::new(),
                    state_version: T::SCHEMA_VERSION,
                    payload: T::default(),
                    created_at: at,
                    updated_at: at,
                    applied: VecDeque::new(),
                    outbox: Vec::new(),
                }
            }

            fn payload(&self) -> &T {
                &self.payload
            }

            fn payload_mut(&mut self) -> &mut T {
                &mut self.payload
            }

            fn state_version(&self) -> usize {
                self.state_version
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }

            fn touch(&mut self, at: DateTime<Utc>) {
                self.version = self.version.next();
                self.updated_at = at;
            }

            fn is_applied(&self, message_id: &str) -> bool {
                self.applied.iter().any(|id| id == message_id)
            }

            fn mark_applied(&mut self, message_ids: &[&str]) {
                self.applied
                    .extend(message_ids.iter().map(|id| id.to_string()));
                let keep = APPLIED_WINDOW.max(message_ids.len());
                while self.applied.len() > keep {
                    self.applied.pop_front();
                }
            }

            fn outbox(&self) -> &[Output] {
                &self.outbox
            }

            fn stage(&mut self, outputs: Vec<Output>) {
                self.outbox.extend(outputs);
            }

            fn take_outbox(&mut self) -> Vec<Output> {
                std::mem::take(&mut self.outbox)
            }
        }
    };
}

state_envelope!(
    /// 快照：由命令与请求驱动的当前状态
    Snapshot
);

state_envelope!(
    /// 视图：由事件驱动的派生投影
    View
);
