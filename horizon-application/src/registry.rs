//! 状态注册表（StateRegistry）
//!
//! 启动期静态登记每个状态类型的存储库名与主题命名空间；
//! 未登记的类型使用由类型标识推导的默认值。
//!
use crate::error::{AppError, AppResult};
use bon::Builder;
use dashmap::DashMap;
use horizon_domain::message::TopicResolver;
use horizon_domain::state::State;

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct StateBinding {
    #[builder(into)]
    snapshot_database: String,
    #[builder(into)]
    view_database: String,
    /// 为空时使用全局命名空间
    #[builder(into)]
    topic_namespace: Option<String>,
}

impl StateBinding {
    /// `snapshot_{type}` / `view_{type}` / 全局命名空间
    pub fn defaults(state_type: &str) -> Self {
        Self {
            snapshot_database: format!("snapshot_{state_type}"),
            view_database: format!("view_{state_type}"),
            topic_namespace: None,
        }
    }

    pub fn snapshot_database(&self) -> &str {
        &self.snapshot_database
    }

    pub fn view_database(&self) -> &str {
        &self.view_database
    }

    pub fn topic_namespace(&self) -> Option<&str> {
        self.topic_namespace.as_deref()
    }

    /// 该状态使用的主题命名器
    pub fn resolver(&self, global: &TopicResolver) -> TopicResolver {
        match &self.topic_namespace {
            Some(namespace) => TopicResolver::new(namespace.clone()),
            None => global.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StateRegistry {
    bindings: DashMap<&'static str, StateBinding>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 覆盖某个状态类型的默认绑定；同一类型只能登记一次
    pub fn register<S: State>(&self, binding: StateBinding) -> AppResult<()> {
        if self.bindings.contains_key(S::TYPE) {
            return Err(AppError::AlreadyRegistered {
                state_type: S::TYPE,
            });
        }
        self.bindings.insert(S::TYPE, binding);
        Ok(())
    }

    pub fn binding<S: State>(&self) -> StateBinding {
        self.binding_for(S::TYPE)
    }

    pub fn binding_for(&self, state_type: &str) -> StateBinding {
        self.bindings
            .get(state_type)
            .map(|b| b.value().clone())
            .unwrap_or_else(|| StateBinding::defaults(state_type))
    }
}
