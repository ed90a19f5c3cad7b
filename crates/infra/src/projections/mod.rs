//! Read-model projections over item event streams.
//!
//! All three projections consume the same published envelopes and are
//! idempotent: per-stream cursors skip redelivered envelopes and reject
//! sequence gaps, so at-least-once delivery from the bus is safe.

mod borrowed;
mod items;
mod owners;

pub use borrowed::BorrowedItemsProjection;
pub use items::{CatalogFilter, CommentReadModel, ItemCatalogProjection, ItemReadModel};
pub use owners::OwnerItemsProjection;

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use lendloop_core::AggregateId;
use lendloop_events::EventEnvelope;
use lendloop_lending::ItemEvent;

#[derive(Debug, Error)]
pub enum ItemProjectionError {
    #[error("failed to deserialize item event: {0}")]
    Deserialize(String),
    #[error("stream integrity violation: {0}")]
    StreamIntegrity(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-stream cursor table shared by the item projections.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether an envelope at `seq` should be applied. Duplicates (at or
    /// below the cursor) are skipped; gaps are an error.
    pub(crate) fn should_apply(
        &self,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<bool, ItemProjectionError> {
        let last = match self.inner.read() {
            Ok(cursors) => cursors.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        };

        if seq == 0 {
            return Err(ItemProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ItemProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub(crate) fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}

/// Decode an item event payload, checking that it belongs to the envelope's
/// stream.
pub(crate) fn decode_item_event(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<ItemEvent, ItemProjectionError> {
    let ev: ItemEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ItemProjectionError::Deserialize(e.to_string()))?;

    let item_id = match &ev {
        ItemEvent::ItemCreated(e) => e.item_id,
        ItemEvent::ItemUpdated(e) => e.item_id,
        ItemEvent::ItemDeleted(e) => e.item_id,
        ItemEvent::LikeToggled(e) => e.item_id,
        ItemEvent::CommentAdded(e) => e.item_id,
        ItemEvent::BorrowRequested(e) => e.item_id,
        ItemEvent::LendConfirmed(e) => e.item_id,
        ItemEvent::ReturnRequested(e) => e.item_id,
        ItemEvent::ReturnConfirmed(e) => e.item_id,
    };

    if item_id.0 != envelope.aggregate_id() {
        return Err(ItemProjectionError::StreamIntegrity(
            "event item_id does not match envelope aggregate_id".to_string(),
        ));
    }

    Ok(ev)
}

/// Stable replay order for rebuilds: group by stream, then by sequence.
pub(crate) fn sort_for_replay(envelopes: &mut [EventEnvelope<JsonValue>]) {
    envelopes.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));
}
