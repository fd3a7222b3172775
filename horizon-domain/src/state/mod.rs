//! 状态模型（state）
//!
//! 用户定义的状态载荷 `State` 由两种信封持有：
//! - `Snapshot<T>`：可变的当前真相，由命令与请求驱动；
//! - `View<T>`：只由事件驱动的派生投影。
//!
//! 两者形状一致（id、版本、模式版本、载荷、时间戳），均实现 `Stateful`，
//! 作为存储行交给 `CrudStore` 持久化。
//!
//! 行上另记两项簿记：最近已应用的入站消息 id（重投时跳过），
//! 以及随状态一起落库、尚未确认发布的输出（outbox）。
//!
mod envelope;

pub use envelope::{APPLIED_WINDOW, Snapshot, Stateful, View};

use crate::message::{Action, Rejection};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

/// 状态载荷
///
/// `handle` / `respond` 只做校验并产出事件，状态变化统一由 `apply` 完成。
/// 不接收某类消息时，将对应关联类型设为 `NoAction` 即可，默认实现直接拒绝。
pub trait State:
    Default + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 状态类型标识（主题名与默认库名由它推导）
    const TYPE: &'static str;
    /// 载荷模式版本
    const SCHEMA_VERSION: usize = 1;

    type Command: Action;
    type Event: Action;
    type Request: Action;
    type Response: Serialize + Send + Sync;

    /// 处理命令
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Rejection> {
        Err(Rejection::new(format!(
            "{} does not accept command {}",
            Self::TYPE,
            command.action_type()
        )))
    }

    /// 处理请求：返回响应与需要应用的事件
    fn respond(
        &self,
        request: &Self::Request,
    ) -> Result<(Self::Response, Vec<Self::Event>), Rejection> {
        Err(Rejection::new(format!(
            "{} does not accept request {}",
            Self::TYPE,
            request.action_type()
        )))
    }

    /// 应用事件
    fn apply(&mut self, event: &Self::Event);
}

/// 状态迁移：以源状态的事件驱动目标状态
pub trait Migrate<Source: State>: State {
    fn migrate(&mut self, event: &Source::Event);
}
