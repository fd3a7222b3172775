use super::{Reducer, apply_events};
use crate::error::{DomainError, DomainResult};
use crate::message::{InboundMessage, MessageKind, Output, TopicMessage};
use crate::state::{State, View};
use std::marker::PhantomData;

/// 视图聚合器：仅事件驱动，无输出
pub struct ViewAggregator<S> {
    _state: PhantomData<fn() -> S>,
}

impl<S: State> Default for ViewAggregator<S> {
    fn default() -> Self {
        Self {
            _state: PhantomData,
        }
    }
}

impl<S: State> ViewAggregator<S> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: State> Reducer for ViewAggregator<S> {
    type Row = View<S>;

    fn classify(&self, message: TopicMessage) -> DomainResult<InboundMessage> {
        match message.kind() {
            MessageKind::Event => Ok(InboundMessage::Event(message)),
            other => Err(DomainError::aggregator(format!(
                "view of {} does not accept {} messages",
                S::TYPE,
                other
            ))),
        }
    }

    fn reduce(&self, row: &mut View<S>, inbound: &[InboundMessage]) -> DomainResult<Vec<Output>> {
        for message in inbound {
            let InboundMessage::Event(source) = message else {
                return Err(DomainError::aggregator(format!(
                    "view of {} does not accept {} input",
                    S::TYPE,
                    message.label()
                )));
            };
            let event: S::Event = source.decode()?;
            apply_events(row, std::slice::from_ref(&event), source.occurred_at());
        }
        Ok(Vec::new())
    }
}
