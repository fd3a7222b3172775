use super::MessageKind;

/// 默认主题命名空间
pub const DEFAULT_NAMESPACE: &str = "horizon";

/// 主题命名：`{namespace}/{kind}/{state_type}`，响应主题可追加 `-{sender_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicResolver {
    namespace: String,
}

impl Default for TopicResolver {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl TopicResolver {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn topic(&self, kind: MessageKind, state_type: &str, sender_id: Option<&str>) -> String {
        match sender_id {
            Some(sender) if !sender.is_empty() => {
                format!("{}/{}/{}-{}", self.namespace, kind, state_type, sender)
            }
            _ => format!("{}/{}/{}", self.namespace, kind, state_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names() {
        let r = TopicResolver::default();
        assert_eq!(
            r.topic(MessageKind::Command, "account", None),
            "horizon/command/account"
        );
        assert_eq!(
            r.topic(MessageKind::Response, "account", Some("web-1")),
            "horizon/response/account-web-1"
        );
        assert_eq!(
            r.topic(MessageKind::Response, "account", Some("")),
            "horizon/response/account"
        );

        let custom = TopicResolver::new("bank");
        assert_eq!(
            custom.topic(MessageKind::Event, "account", None),
            "bank/event/account"
        );
    }
}
