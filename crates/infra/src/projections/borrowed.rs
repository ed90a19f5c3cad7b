use serde_json::Value as JsonValue;

use lendloop_core::UserId;
use lendloop_events::EventEnvelope;
use lendloop_lending::{ItemEvent, ItemId, ITEM_AGGREGATE_TYPE};

use crate::read_model::Store;

use super::{decode_item_event, sort_for_replay, ItemProjectionError, StreamCursors};

/// Per-user set of currently borrowed items, derived from lend/return events.
///
/// Membership follows possession: `LendConfirmed` adds, `ReturnConfirmed`
/// removes. A reservation alone does not put an item in the borrower's set.
#[derive(Debug)]
pub struct BorrowedItemsProjection<S>
where
    S: Store<UserId, Vec<ItemId>>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> BorrowedItemsProjection<S>
where
    S: Store<UserId, Vec<ItemId>>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Items the user currently holds, in the order they were received.
    pub fn items_borrowed_by(&self, user: UserId) -> Vec<ItemId> {
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
            ItemEvent::LendConfirmed(e) => {
                let mut held = self.store.get(&e.borrower).unwrap_or_default();
                if !held.contains(&e.item_id) {
                    held.push(e.item_id);
                }
                self.store.upsert(e.borrower, held);
            }
            ItemEvent::ReturnConfirmed(e) => {
                let mut held = self.store.get(&e.borrower).unwrap_or_default();
                held.retain(|id| *id != e.item_id);
                self.store.upsert(e.borrower, held);
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
