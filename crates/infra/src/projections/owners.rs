use serde_json::Value as JsonValue;

use lendloop_core::UserId;
use lendloop_events::EventEnvelope;
use lendloop_lending::{ItemEvent, ItemId, ITEM_AGGREGATE_TYPE};

use crate::read_model::Store;

use super::{decode_item_event, sort_for_replay, ItemProjectionError, StreamCursors};

/// Per-user list of currently listed items.
#[derive(Debug)]
pub struct OwnerItemsProjection<S>
where
    S: Store<UserId, Vec<ItemId>>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> OwnerItemsProjection<S>
where
    S: Store<UserId, Vec<ItemId>>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Items the user has listed, in listing order.
    pub fn items_owned_by(&self, user: UserId) -> Vec<ItemId> {
        self.store.get(&user).unwrap_or_default()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ItemProjectionError> {
        if envelope.aggregate_type() != ITEM_AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        match decode_item_event(envelope)? {
            ItemEvent::ItemCreated(e) => {
                let mut owned = self.store.get(&e.owner).unwrap_or_default();
                if !owned.contains(&e.item_id) {
                    owned.push(e.item_id);
                }
                self.store.upsert(e.owner, owned);
            }
            ItemEvent::ItemDeleted(e) => {
                let mut owned = self.store.get(&e.owner).unwrap_or_default();
                owned.retain(|id| *id != e.item_id);
                self.store.upsert(e.owner, owned);
            }
            _ => {}
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ItemProjectionError> {
        self.store.clear();
        self.cursors.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        sort_for_replay(&mut envs);

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
