/// Execute an aggregate command deterministically (no IO, no async).
///
/// Combines decision and state evolution in one step:
///
/// 1. **Decide**: calls `aggregate.handle(command)` to get events (pure).
/// 2. **Evolve**: applies each event via `aggregate.apply(event)`.
///
/// Useful in unit tests and inline processing where the full dispatch
/// pipeline (persistence + publication) is not needed.
pub fn execute<A>(
    aggregate: &mut A,
    command: &A::Command,
) -> Result<Vec<A::Event>, A::Error>
where
    A: lendloop_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
