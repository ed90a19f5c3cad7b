//! Projection runner utilities (read model builders).
//!
//! Read models are **disposable**; events are the source of truth.
//! This module provides deterministic replay and per-stream cursor tracking
//! without making storage assumptions.

use std::collections::HashMap;

use lendloop_core::AggregateId;

use crate::{EventEnvelope, Projection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    NonMonotonicSequence {
        aggregate_id: AggregateId,
        last: u64,
        found: u64,
    },
}

/// Runs envelopes through a projection and tracks per-stream progress.
///
/// Envelopes from many aggregate streams can flow through a single runner;
/// each stream's sequence numbers must be strictly increasing. Duplicates
/// (sequence number at or below the cursor) are skipped, which makes replay
/// and at-least-once delivery safe.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursors: HashMap<AggregateId, u64>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursors: HashMap::new(),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut P {
        &mut self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Last applied sequence number for a stream, if any envelope was applied.
    pub fn cursor(&self, aggregate_id: AggregateId) -> Option<u64> {
        self.cursors.get(&aggregate_id).copied()
    }

    /// Apply a single envelope, enforcing monotonic per-stream sequencing.
    ///
    /// Duplicates are skipped silently; gaps are rejected.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let found = envelope.sequence_number();
        let last = self.cursors.get(&aggregate_id).copied().unwrap_or(0);

        if found <= last {
            // Already applied (at-least-once delivery); nothing to do.
            return Ok(());
        }
        if found != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                aggregate_id,
                last,
                found,
            });
        }

        self.projection.apply(envelope);
        self.cursors.insert(aggregate_id, found);
        Ok(())
    }

    /// Apply many envelopes in order.
    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }

    /// Rebuild a projection from scratch by replaying the full event history.
    ///
    /// The factory is used to create a fresh projection instance.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<P, ProjectionError>
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.run(envelopes)?;
        Ok(runner.projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct Ticked {
        occurred_at: DateTime<Utc>,
    }

    impl crate::Event for Ticked {
        fn event_type(&self) -> &'static str {
            "test.ticked"
        }
        fn version(&self) -> u32 {
            1
        }
        fn occurred_at(&self) -> DateTime<Utc> {
            self.occurred_at
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        applied: u32,
    }

    impl Projection for Counter {
        type Ev = Ticked;

        fn apply(&mut self, _envelope: &EventEnvelope<Self::Ev>) {
            self.applied += 1;
        }
    }

    fn envelope(aggregate_id: lendloop_core::AggregateId, seq: u64) -> EventEnvelope<Ticked> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            "test.ticked",
            seq,
            Ticked {
                occurred_at: Utc::now(),
            },
        )
    }

    #[test]
    fn duplicates_are_skipped() {
        let id = lendloop_core::AggregateId::new();
        let mut runner = ProjectionRunner::new(Counter::default());

        runner.apply(&envelope(id, 1)).unwrap();
        runner.apply(&envelope(id, 1)).unwrap();
        runner.apply(&envelope(id, 2)).unwrap();

        assert_eq!(runner.projection().applied, 2);
        assert_eq!(runner.cursor(id), Some(2));
    }

    #[test]
    fn gaps_are_rejected() {
        let id = lendloop_core::AggregateId::new();
        let mut runner = ProjectionRunner::new(Counter::default());

        runner.apply(&envelope(id, 1)).unwrap();
        let err = runner.apply(&envelope(id, 3)).unwrap_err();
        assert!(matches!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 3, .. }));
    }

    #[test]
    fn independent_streams_have_independent_cursors() {
        let a = lendloop_core::AggregateId::new();
        let b = lendloop_core::AggregateId::new();
        let mut runner = ProjectionRunner::new(Counter::default());

        runner.apply(&envelope(a, 1)).unwrap();
        runner.apply(&envelope(b, 1)).unwrap();
        runner.apply(&envelope(a, 2)).unwrap();

        assert_eq!(runner.cursor(a), Some(2));
        assert_eq!(runner.cursor(b), Some(1));
    }
}
