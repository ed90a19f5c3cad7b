use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::debug;
use uuid::Uuid;

use lendloop_events::EventEnvelope;
use lendloop_lending::{ItemEvent, ITEM_AGGREGATE_TYPE};

use crate::message::{Message, MessageKind};
use crate::store::MessageStore;

/// Turns lending protocol events into notification messages.
///
/// Subscribes to item streams and appends one message per protocol step, so
/// the request/approval/return handshake is visible in both parties'
/// conversation history. Delivery is at-least-once; processed event ids are
/// remembered so redelivered envelopes emit nothing.
pub struct NotificationEmitter {
    store: Arc<dyn MessageStore>,
    processed: Mutex<HashSet<Uuid>>,
}

impl NotificationEmitter {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            processed: Mutex::new(HashSet::new()),
        }
    }

    /// Handle one published envelope. Envelopes from other aggregate types
    /// and non-protocol item events are ignored.
    pub fn handle_envelope(&self, envelope: &EventEnvelope<serde_json::Value>) -> anyhow::Result<()> {
        if envelope.aggregate_type() != ITEM_AGGREGATE_TYPE {
            return Ok(());
        }

        {
            let mut processed = self
                .processed
                .lock()
                .map_err(|_| anyhow::anyhow!("emitter dedup lock poisoned"))?;
            if !processed.insert(envelope.event_id()) {
                return Ok(());
            }
        }

        let event: ItemEvent = serde_json::from_value(envelope.payload().clone())
            .context("deserializing item event payload")?;

        let Some(message) = Self::message_for_event(&event) else {
            return Ok(());
        };

        debug!(
            event_type = %lendloop_events::Event::event_type(&event),
            receiver = %message.receiver,
            "emitting protocol notification"
        );
        self.store
            .append(message)
            .context("appending protocol notification")?;
        Ok(())
    }

    /// The notification a protocol event produces, if any. Pure: everything
    /// needed (parties, title) travels in the event itself.
    fn message_for_event(event: &ItemEvent) -> Option<Message> {
        match event {
            ItemEvent::BorrowRequested(e) => Some(Message::notification(
                e.requester,
                e.owner,
                format!("I would like to borrow your \"{}\"", e.title),
                e.item_id,
                MessageKind::BorrowRequest,
                e.occurred_at,
            )),
            ItemEvent::LendConfirmed(e) => Some(Message::notification(
                e.owner,
                e.borrower,
                format!("Your request to borrow \"{}\" has been approved", e.title),
                e.item_id,
                MessageKind::LendConfirmed,
                e.occurred_at,
            )),
            ItemEvent::ReturnRequested(e) => Some(Message::notification(
                e.borrower,
                e.owner,
                format!("I would like to return your \"{}\"", e.title),
                e.item_id,
                MessageKind::ReturnRequest,
                e.occurred_at,
            )),
            ItemEvent::ReturnConfirmed(e) => Some(Message::notification(
                e.owner,
                e.borrower,
                format!("The return of \"{}\" has been confirmed", e.title),
                e.item_id,
                MessageKind::ReturnConfirmed,
                e.occurred_at,
            )),
            _ => None,
        }
    }
}
