use lendloop_core::AggregateId;

/// A command targets a specific aggregate.
///
/// Commands represent **intent** — a request to perform an action. They are
/// transient (not persisted) and are transformed into events, which are.
/// A command is rejected if invalid; events represent accepted changes.
///
/// Commands must own their data (`'static`) and be safe to move across
/// threads, since handlers and tests may process them concurrently.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
