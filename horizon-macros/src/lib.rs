//! horizon 过程宏
//!
//! - `#[action]`：为消息枚举（命令/事件/请求）生成 `Action` 实现，
//!   在编译期产出稳定的类型名列表，供类型注册表与主题推导使用；
//! - `#[value_object]`：为值对象追加常用派生。
//!
mod action;
mod utils;
mod value_object;

use proc_macro::TokenStream;

/// 消息枚举宏
///
/// 仅支持枚举，变体可以是具名字段、元组或单元形式：
///
/// ```ignore
/// #[action]
/// enum AccountCommand {
///     Open { owner: String },
///     #[action(action_type = "account.deposit")]
///     Deposit { amount: i64 },
///     Close,
/// }
/// ```
///
/// - 默认类型名为 `枚举名.变体名`，可通过变体级 `#[action(action_type = "...")]` 覆写；
/// - 枚举级 `#[action(prefix = "...")]` 为所有默认类型名追加前缀（`prefix.枚举名.变体名`）；
/// - 自动合并派生：Debug, Clone, PartialEq, Serialize, Deserialize。
#[proc_macro_attribute]
pub fn action(attr: TokenStream, item: TokenStream) -> TokenStream {
    action::expand(attr, item)
}

/// 值对象宏
///
/// - 合并派生：Default, Clone, (Debug 可控), Serialize, Deserialize, PartialEq, Eq
/// - `#[value_object(debug = false)]` 关闭 Debug 派生
/// - `#[value_object(ord = true)]` 追加 Copy, PartialOrd, Ord, Hash（适用于版本号等标量值）
#[proc_macro_attribute]
pub fn value_object(attr: TokenStream, item: TokenStream) -> TokenStream {
    value_object::expand(attr, item)
}
