use std::ops::Deref;

use async_trait::async_trait;

use crate::event::Event;
use crate::types::BoxError;
use crate::Aggregate;

/// This trait is used to implement an `Observer`. An observer is notified after a command has been
/// successfully handled and its events committed, and is intended to perform side effects.
///
/// Observers only ever see the last event produced by a command, together with the aggregate
/// freshly reloaded from the store. Their failures never revert the committed events.
#[async_trait]
pub trait Observer<A>: Send + Sync
where
    A: Aggregate,
{
    /// Whether this observer is interested in the given event.
    fn will_observe(&self, _aggregate: &A, _event: &dyn Event) -> bool {
        true
    }

    /// React to the committed event.
    async fn observe(&self, aggregate: &A, event: &dyn Event) -> Result<(), BoxError>;

    /// Called with the error returned by [`Observer::observe`]. All the errors should be handled
    /// from within the `Observer` and shouldn't panic.
    async fn on_observe_failed(&self, error: BoxError);

    /// The name of the observer. By default, this is the type name of the observer,
    /// but it can be overridden to provide a custom name. This name is used as
    /// part of tracing spans, to identify the observer being run.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<A, Q, T> Observer<A> for T
where
    A: Aggregate,
    Q: Observer<A> + ?Sized,
    T: Deref<Target = Q> + Send + Sync,
{
    /// Deref call to [`Observer::will_observe`].
    fn will_observe(&self, aggregate: &A, event: &dyn Event) -> bool {
        self.deref().will_observe(aggregate, event)
    }

    /// Deref call to [`Observer::observe`].
    async fn observe(&self, aggregate: &A, event: &dyn Event) -> Result<(), BoxError> {
        self.deref().observe(aggregate, event).await
    }

    /// Deref call to [`Observer::on_observe_failed`].
    async fn on_observe_failed(&self, error: BoxError) {
        self.deref().on_observe_failed(error).await
    }

    /// Deref call to [`Observer::name`].
    fn name(&self) -> &'static str {
        self.deref().name()
    }
}
