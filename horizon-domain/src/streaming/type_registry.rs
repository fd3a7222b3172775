use crate::message::{Action, MessageKind};
use std::collections::HashMap;

/// 类型名的归属：消息种类 + 状态类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeBinding {
    pub kind: MessageKind,
    pub state_type: String,
}

/// 类型注册表：订阅只处理注册过的类型名
///
/// 空注册表表示不做过滤（例如直接按主题订阅原始消息）。
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeBinding>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册动作枚举的全部类型名
    pub fn register<A: Action>(&mut self, kind: MessageKind, state_type: &str) -> &mut Self {
        for name in A::TYPES {
            self.register_name(*name, kind, state_type);
        }
        self
    }

    pub fn register_name(
        &mut self,
        type_name: impl Into<String>,
        kind: MessageKind,
        state_type: &str,
    ) -> &mut Self {
        self.types.insert(
            type_name.into(),
            TypeBinding {
                kind,
                state_type: state_type.to_string(),
            },
        );
        self
    }

    pub fn lookup(&self, type_name: &str) -> Option<&TypeBinding> {
        self.types.get(type_name)
    }

    /// 是否接受该类型名
    pub fn accepts(&self, type_name: &str) -> bool {
        self.types.is_empty() || self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_macros::action;

    #[action]
    enum OrderCommand {
        Place { sku: String },
        Cancel,
    }

    #[test]
    fn registers_action_types() {
        let mut reg = TypeRegistry::new();
        assert!(reg.accepts("anything"));

        reg.register::<OrderCommand>(MessageKind::Command, "order");
        assert_eq!(reg.len(), 2);
        assert!(reg.accepts("OrderCommand.Cancel"));
        assert!(!reg.accepts("OrderCommand.Refund"));

        let binding = reg.lookup("OrderCommand.Place").unwrap();
        assert_eq!(binding.kind, MessageKind::Command);
        assert_eq!(binding.state_type, "order");
    }
}
