//! Command execution pipeline.
//!
//! Orchestrates the event-sourcing lifecycle for a single command: load the
//! stream, rehydrate the aggregate, let it decide, append the decided events
//! with an optimistic concurrency check, then publish the committed events on
//! the bus. Events are persisted before publication, so a failed publish
//! leaves the store authoritative and a retry can only duplicate delivery
//! (consumers are idempotent).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use lendloop_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use lendloop_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    Concurrency(String),
    /// Loaded stream failed an integrity check (wrong aggregate, bad order).
    StreamIntegrity(String),
    /// Domain validation failure.
    Validation(String),
    /// Operation not legal in the aggregate's current lifecycle state.
    InvalidState(String),
    /// Operation relates a user to themselves.
    SelfReference(String),
    /// Caller is authenticated but not permitted.
    Forbidden(String),
    /// No resolved principal.
    Unauthenticated,
    /// Domain-level not found.
    NotFound,
    /// Failed to deserialize historical payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (retry may duplicate).
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvalidState(msg) => DispatchError::InvalidState(msg),
            DomainError::SelfReference(msg) => DispatchError::SelfReference(msg),
            DomainError::Forbidden(msg) => DispatchError::Forbidden(msg),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthenticated => DispatchError::Unauthenticated,
            DomainError::NotFound => DispatchError::NotFound,
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Sits between the service facade and the storage traits. Store and bus are
/// generic so tests run against the in-memory implementations and real
/// backends can be slotted in without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline and return the committed
    /// events with their assigned sequence numbers.
    ///
    /// The `make_aggregate` factory produces a fresh, empty instance for
    /// rehydration (e.g. `Item::empty(id)`), which keeps the dispatcher
    /// generic over aggregate types. A command the aggregate accepts without
    /// deciding any events (a checked no-op) short-circuits before the store
    /// is touched and returns an empty vec.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: lendloop_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(aggregate_id, aggregate_type.clone(), Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        debug!(
            aggregate_type = %aggregate_type,
            aggregate_id = %aggregate_id,
            appended = committed.len(),
            "committed events"
        );

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Guard against a buggy backend: the stream must belong to the requested
    // aggregate and carry strictly increasing sequence numbers.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::StreamIntegrity(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::StreamIntegrity(
                "stored event has sequence_number=0".to_string(),
            ));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::StreamIntegrity(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
