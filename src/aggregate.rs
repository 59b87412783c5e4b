use crate::event::Event;

/// An event-sourced model.
///
/// The state of an aggregate is never persisted: it is rebuilt by folding its history, ordered by
/// version, through [`Aggregate::on`]. Two aggregates built from the same history must end up in
/// the same state.
pub trait Aggregate: Send + Sync + 'static {
    /// Error raised when an event cannot be applied, or a command cannot be handled.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Applies a single event onto the aggregate.
    ///
    /// This must only depend on the current state and the given event. Events the aggregate does
    /// not know how to interpret should be rejected with a descriptive error instead of being
    /// silently skipped.
    fn on(&mut self, event: &dyn Event) -> Result<(), Self::Error>;
}

/// An intent to change the state of a specific aggregate.
pub trait Command: Send + Sync {
    /// The id of the aggregate the command targets. Must not be blank.
    fn aggregate_id(&self) -> &str;
}

/// Capability of an [`Aggregate`] to decide which events a command produces.
pub trait CommandHandler: Aggregate {
    type Command: Command;

    /// Handles a command against the current state, returning the events to be persisted.
    ///
    /// This must not mutate the aggregate: the returned events are persisted and replayed by the
    /// [`crate::Repository`].
    fn apply(&self, command: &Self::Command) -> Result<Vec<Box<dyn Event>>, Self::Error>;
}
