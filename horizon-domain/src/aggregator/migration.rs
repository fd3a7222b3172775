use super::Reducer;
use crate::error::{DomainError, DomainResult};
use crate::message::{InboundMessage, MessageKind, Output, TopicMessage};
use crate::state::{Migrate, Snapshot, State, Stateful};
use std::marker::PhantomData;

/// 迁移聚合器：源状态的事件映射为迁移输入，驱动目标快照
pub struct MigrationAggregator<Source, Target> {
    _states: PhantomData<fn() -> (Source, Target)>,
}

impl<Source, Target> Default for MigrationAggregator<Source, Target>
where
    Source: State,
    Target: Migrate<Source>,
{
    fn default() -> Self {
        Self {
            _states: PhantomData,
        }
    }
}

impl<Source, Target> MigrationAggregator<Source, Target>
where
    Source: State,
    Target: Migrate<Source>,
{
    pub fn new() -> Self {
        Self::default()
    }
}

impl<Source, Target> Reducer for MigrationAggregator<Source, Target>
where
    Source: State,
    Target: Migrate<Source>,
{
    type Row = Snapshot<Target>;

    fn classify(&self, message: TopicMessage) -> DomainResult<InboundMessage> {
        match message.kind() {
            MessageKind::Event => Ok(InboundMessage::Migration(message)),
            other => Err(DomainError::aggregator(format!(
                "migration {} -> {} does not accept {} messages",
                Source::TYPE,
                Target::TYPE,
                other
            ))),
        }
    }

    fn reduce(
        &self,
        row: &mut Snapshot<Target>,
        inbound: &[InboundMessage],
    ) -> DomainResult<Vec<Output>> {
        for message in inbound {
            let InboundMessage::Migration(source) = message else {
                return Err(DomainError::aggregator(format!(
                    "migration {} -> {} does not accept {} input",
                    Source::TYPE,
                    Target::TYPE,
                    message.label()
                )));
            };
            let event: Source::Event = source.decode()?;
            row.payload_mut().migrate(&event);
            row.touch(source.occurred_at());
        }
        Ok(Vec::new())
    }
}
