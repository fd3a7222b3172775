use super::{Emitter, Reducer, apply_events};
use crate::error::{DomainError, DomainResult};
use crate::message::{
    InboundMessage, MessageKind, Output, RESPONSE_TYPE, Rejection, ResponseBody, ResponseStatus,
    TopicMessage, TopicResolver,
};
use crate::state::{Snapshot, State, Stateful};
use std::marker::PhantomData;
use tracing::debug;

/// 快照聚合器：命令与请求驱动
pub struct SnapshotAggregator<S> {
    topics: TopicResolver,
    _state: PhantomData<fn() -> S>,
}

impl<S: State> SnapshotAggregator<S> {
    pub fn new(topics: TopicResolver) -> Self {
        Self {
            topics,
            _state: PhantomData,
        }
    }

    fn event_topic(&self) -> String {
        self.topics.topic(MessageKind::Event, S::TYPE, None)
    }

    fn response_topic(&self, source: &TopicMessage) -> String {
        self.topics
            .topic(MessageKind::Response, S::TYPE, source.sender_id())
    }

    fn settle(
        &self,
        row: &mut Snapshot<S>,
        source: &TopicMessage,
        result: Result<(Option<serde_json::Value>, Vec<S::Event>), Rejection>,
        outputs: &mut Vec<Output>,
    ) -> DomainResult<()> {
        let mut emitter = Emitter::new(source, outputs);

        match result {
            Ok((response, events)) => {
                apply_events(row, &events, source.occurred_at());
                let topic = self.event_topic();
                for event in &events {
                    emitter.emit(&topic, MessageKind::Event, event)?;
                }
                if let Some(payload) = response {
                    let body = ResponseBody {
                        request_id: source.id().to_string(),
                        request_type: source.type_name().to_string(),
                        status: ResponseStatus::Ok { payload },
                    };
                    emitter.emit_raw(
                        &self.response_topic(source),
                        MessageKind::Response,
                        RESPONSE_TYPE,
                        serde_json::to_value(&body)?,
                    );
                }
            }
            Err(rejection) => {
                debug!(
                    key = %source.stream_id(),
                    type_name = %source.type_name(),
                    reason = %rejection,
                    "message rejected"
                );
                let body = ResponseBody {
                    request_id: source.id().to_string(),
                    request_type: source.type_name().to_string(),
                    status: ResponseStatus::Rejected {
                        reason: rejection.reason().to_string(),
                    },
                };
                emitter.emit_raw(
                    &self.response_topic(source),
                    MessageKind::Response,
                    RESPONSE_TYPE,
                    serde_json::to_value(&body)?,
                );
            }
        }
        Ok(())
    }
}

impl<S: State> Reducer for SnapshotAggregator<S> {
    type Row = Snapshot<S>;

    fn classify(&self, message: TopicMessage) -> DomainResult<InboundMessage> {
        match message.kind() {
            MessageKind::Command => Ok(InboundMessage::Command(message)),
            MessageKind::Request => Ok(InboundMessage::Request(message)),
            other => Err(DomainError::aggregator(format!(
                "snapshot of {} does not accept {} messages",
                S::TYPE,
                other
            ))),
        }
    }

    fn reduce(&self, row: &mut Snapshot<S>, inbound: &[InboundMessage]) -> DomainResult<Vec<Output>> {
        let mut outputs = Vec::new();

        for message in inbound {
            match message {
                InboundMessage::Command(source) => {
                    let command: S::Command = source.decode()?;
                    let result = row.payload().handle(&command).map(|events| (None, events));
                    self.settle(row, source, result, &mut outputs)?;
                }
                InboundMessage::Request(source) => {
                    let request: S::Request = source.decode()?;
                    let result = match row.payload().respond(&request) {
                        Ok((response, events)) => {
                            Ok((Some(serde_json::to_value(&response)?), events))
                        }
                        Err(rejection) => Err(rejection),
                    };
                    self.settle(row, source, result, &mut outputs)?;
                }
                other => {
                    return Err(DomainError::aggregator(format!(
                        "snapshot of {} does not accept {} input",
                        S::TYPE,
                        other.label()
                    )));
                }
            }
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::testing::*;
    use crate::persist::CrudEntity;
    use crate::message::{Action, ResponseBody};
    use chrono::Utc;

    fn command(key: &str, cmd: &AccountCommand) -> InboundMessage {
        InboundMessage::Command(TopicMessage::encode(MessageKind::Command, key, cmd).unwrap())
    }

    fn aggregator() -> SnapshotAggregator<Account> {
        SnapshotAggregator::new(TopicResolver::default())
    }

    #[test]
    fn applies_commands_and_emits_events() {
        let agg = aggregator();
        let mut row = Snapshot::<Account>::create("acct-1", Utc::now());
        let inbound = vec![
            command("acct-1", &AccountCommand::Open { owner: "ann".into() }),
            command("acct-1", &AccountCommand::Deposit { amount: 100 }),
            command("acct-1", &AccountCommand::Deposit { amount: 50 }),
        ];

        let outputs = agg.reduce(&mut row, &inbound).unwrap();

        assert_eq!(row.payload().balance, 150);
        assert_eq!(row.version().value(), 3);
        let types: Vec<&str> = outputs.iter().map(|o| o.message.type_name()).collect();
        assert_eq!(
            types,
            vec!["AccountEvent.Opened", "AccountEvent.Deposited", "AccountEvent.Deposited"]
        );
        assert!(outputs.iter().all(|o| o.topic == "horizon/event/account"));
    }

    // 中间一条校验失败：事件、拒绝、事件，状态只反映第 1 与第 3 条
    #[test]
    fn rejection_leaves_state_untouched() {
        let agg = aggregator();
        let mut row = Snapshot::<Account>::create("acct-1", Utc::now());
        let inbound = vec![
            command("acct-1", &AccountCommand::Deposit { amount: 10 }),
            command("acct-1", &AccountCommand::Withdraw { amount: 500 }),
            command("acct-1", &AccountCommand::Deposit { amount: 5 }),
        ];

        let outputs = agg.reduce(&mut row, &inbound).unwrap();

        assert_eq!(row.payload().balance, 15);
        assert_eq!(row.version().value(), 2);
        let kinds: Vec<MessageKind> = outputs.iter().map(|o| o.kind()).collect();
        assert_eq!(
            kinds,
            vec![MessageKind::Event, MessageKind::Response, MessageKind::Event]
        );
        let body: ResponseBody = serde_json::from_value(outputs[1].message.payload().clone()).unwrap();
        assert!(!body.is_ok());
        assert_eq!(body.request_id, inbound[1].message().id());
        assert_eq!(outputs[1].topic, "horizon/response/account");
    }

    #[test]
    fn request_emits_response_to_sender_topic() {
        let agg = aggregator();
        let mut row = Snapshot::<Account>::create("acct-1", Utc::now());
        agg.reduce(
            &mut row,
            &[command("acct-1", &AccountCommand::Deposit { amount: 40 })],
        )
        .unwrap();

        let request = TopicMessage::encode(MessageKind::Request, "acct-1", &AccountRequest::WithdrawAll)
            .unwrap()
            .with_sender("teller-7");
        let outputs = agg
            .reduce(&mut row, &[InboundMessage::Request(request)])
            .unwrap();

        assert_eq!(row.payload().balance, 0);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].message.type_name(), AccountEvent::TYPES[2]);
        assert_eq!(outputs[1].topic, "horizon/response/account-teller-7");
        let body: ResponseBody = serde_json::from_value(outputs[1].message.payload().clone()).unwrap();
        assert_eq!(body.status, ResponseStatus::Ok { payload: serde_json::json!(40) });
        assert_eq!(outputs[1].message.sender_id(), Some("teller-7"));
    }

    #[test]
    fn replay_is_deterministic() {
        let agg = aggregator();
        let at = Utc::now();
        let inbound = vec![
            command("acct-1", &AccountCommand::Open { owner: "ann".into() }),
            command("acct-1", &AccountCommand::Deposit { amount: 0 }),
        ];

        let mut a = Snapshot::<Account>::create("acct-1", at);
        let mut b = Snapshot::<Account>::create("acct-1", at);
        let out_a = agg.reduce(&mut a, &inbound).unwrap();
        let out_b = agg.reduce(&mut b, &inbound).unwrap();

        assert_eq!(a, b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn events_are_fatal_for_snapshots() {
        let agg = aggregator();
        let event = TopicMessage::encode(
            MessageKind::Event,
            "acct-1",
            &AccountEvent::Deposited { amount: 1 },
        )
        .unwrap();
        let err = agg.classify(event).unwrap_err();
        assert_eq!(err.failure_kind(), crate::error::FailureKind::Fatal);
    }

    #[test]
    fn undecodable_payload_is_fatal() {
        let agg = aggregator();
        let mut row = Snapshot::<Account>::create("acct-1", Utc::now());
        let bad = TopicMessage::builder()
            .kind(MessageKind::Command)
            .stream_id("acct-1".to_string())
            .type_name("AccountCommand.Deposit".to_string())
            .payload(serde_json::json!({"Deposit": {"amount": "lots"}}))
            .build();
        let err = agg
            .reduce(&mut row, &[InboundMessage::Command(bad)])
            .unwrap_err();
        assert_eq!(err.failure_kind(), crate::error::FailureKind::Fatal);
    }
}
