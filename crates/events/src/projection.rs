use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Projections are the CQRS read side: they transform committed events into
/// queryable state. Read models are **disposable** — they can be deleted and
/// rebuilt from events at any time, because events are the source of truth.
///
/// Projections must be **idempotent**: applying the same event twice must
/// produce the same result (delivery is at-least-once). The
/// [`ProjectionRunner`](crate::runner::ProjectionRunner) helps by tracking
/// per-stream sequence numbers and skipping duplicates, but projections should
/// still favor naturally idempotent operations (upserts, set membership).
///
/// Persistence is not defined here; implementations may store read models in
/// memory, SQL tables, caches, or anything else.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
