use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

/// 消息动作（命令/事件/请求的载荷枚举）
///
/// 通常通过 `#[action]` 宏实现：`TYPES` 在编译期列出全部类型名，
/// 供类型注册表与订阅过滤使用；`action_type` 返回当前变体的类型名。
pub trait Action:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// 该枚举可能产生的全部类型名
    const TYPES: &'static [&'static str];

    /// 当前值的类型名
    fn action_type(&self) -> &'static str;
}

/// 空动作：用于不接收某类消息的状态（如只读视图没有命令）
#[horizon_macros::action]
pub enum NoAction {}
