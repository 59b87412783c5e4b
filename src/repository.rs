use tracing::Instrument;

use crate::aggregate::{Command, CommandHandler};
use crate::event::Event;
use crate::observer::Observer;
use crate::serializer::{Serializer, SerializerError};
use crate::store::{EventStore, Record, StoreError};
use crate::types::Version;
use crate::Aggregate;

type Factory<A> = Box<dyn Fn() -> A + Send + Sync>;

/// The Repository is responsible for coupling an [`Aggregate`] with an [`EventStore`], so that
/// the events emitted when handling commands are persisted, and the aggregate can be reconstructed
/// by applying its events sequentially.
///
/// The basic APIs are:
/// 1. apply
/// 2. load
/// 3. save
pub struct Repository<A, S, Z>
where
    A: Aggregate,
{
    factory: Factory<A>,
    store: S,
    serializer: Z,
    observers: Vec<Box<dyn Observer<A>>>,
}

impl<A, S, Z> Repository<A, S, Z>
where
    A: Aggregate,
    S: EventStore,
    Z: Serializer,
{
    /// Loads an aggregate instance from the event store, by applying previously persisted events
    /// onto a fresh aggregate by order of their version.
    #[tracing::instrument(skip(self), err)]
    pub async fn load(&self, aggregate_id: &str) -> Result<A, RepositoryError<A::Error>> {
        let history = self.store.load(aggregate_id, 0, 0).await?;

        if history.is_empty() {
            return Err(RepositoryError::NotFound(aggregate_id.to_string()));
        }

        let mut aggregate = (self.factory)();

        for record in &history {
            let event = self.serializer.unmarshal_event(record)?;

            aggregate
                .on(event.as_ref())
                .map_err(|source| RepositoryError::ApplicationFailed {
                    event_type: event.event_type(),
                    version: record.version,
                    source,
                })?;
        }

        Ok(aggregate)
    }

    /// Serializes the events and persists them with a single [`EventStore::save`], keyed by the
    /// aggregate id of the first event. All the events are expected to belong to that aggregate.
    pub async fn save(&self, events: &[Box<dyn Event>]) -> Result<(), RepositoryError<A::Error>> {
        let Some(first) = events.first() else {
            return Ok(());
        };

        let records = events
            .iter()
            .map(|event| self.serializer.marshal_event(event.as_ref()))
            .collect::<Result<Vec<Record>, SerializerError>>()?;

        self.store.save(first.aggregate_id(), records).await?;

        Ok(())
    }

    /// Returns the internal event store
    pub fn event_store(&self) -> &S {
        &self.store
    }

    /// Returns the internal serializer
    pub fn serializer(&self) -> &Z {
        &self.serializer
    }

    async fn notify(&self, aggregate: &A, event: &dyn Event) {
        for observer in &self.observers {
            if !observer.will_observe(aggregate, event) {
                continue;
            }

            let span = tracing::debug_span!(
                "eslite.observer",
                aggregate_id = %event.aggregate_id(),
                version = event.version(),
                observer = observer.name()
            );

            if let Err(error) = observer.observe(aggregate, event).instrument(span.clone()).await {
                tracing::warn!({
                    aggregate_id = %event.aggregate_id(),
                    version = event.version(),
                    observer = observer.name(),
                    error = %error,
                }, "observer failed to observe event");

                observer.on_observe_failed(error).instrument(span).await;
            }
        }
    }
}

impl<A, S, Z> Repository<A, S, Z>
where
    A: CommandHandler,
    S: EventStore,
    Z: Serializer,
{
    /// Handles the command onto the targeted aggregate, or onto a fresh one if it cannot be loaded,
    /// and persists the resulting events.
    ///
    /// The returned aggregate is reloaded from the store, reflecting exactly what has been committed.
    /// Observers are then notified of the last event, in registration order.
    #[tracing::instrument(skip_all, fields(aggregate_id = %command.aggregate_id()), err)]
    pub async fn apply(&self, command: &<A as CommandHandler>::Command) -> Result<A, RepositoryError<A::Error>> {
        let aggregate_id = command.aggregate_id();
        if aggregate_id.trim().is_empty() {
            return Err(RepositoryError::InvalidCommand("command may not contain a blank aggregate id"));
        }

        let aggregate = match self.load(aggregate_id).await {
            Ok(aggregate) => aggregate,
            Err(error) => {
                tracing::debug!(error = %error, "handling command on a fresh aggregate");
                (self.factory)()
            }
        };

        let events = aggregate.apply(command).map_err(RepositoryError::UnsupportedCommand)?;

        self.save(&events).await?;

        let reloaded = self.load(aggregate_id).await?;

        if let Some(last_event) = events.last() {
            self.notify(&reloaded, last_event.as_ref()).await;
        }

        Ok(reloaded)
    }
}

impl<A, S, Z> std::fmt::Debug for Repository<A, S, Z>
where
    A: Aggregate,
    S: std::fmt::Debug,
    Z: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("store", &self.store)
            .field("serializer", &self.serializer)
            .field(
                "observers",
                &self.observers.iter().map(|observer| observer.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Struct used to build a brand new [`Repository`].
pub struct RepositoryBuilder<A, S, Z>
where
    A: Aggregate,
{
    factory: Factory<A>,
    store: S,
    serializer: Z,
    observers: Vec<Box<dyn Observer<A>>>,
}

impl<A, S, Z> RepositoryBuilder<A, S, Z>
where
    A: Aggregate + Default,
    S: EventStore,
    Z: Serializer,
{
    /// Creates a new instance of a [`RepositoryBuilder`], building fresh aggregates with
    /// [`Default::default`].
    pub fn new(store: S, serializer: Z) -> Self {
        Self::with_factory(store, serializer, A::default)
    }
}

impl<A, S, Z> RepositoryBuilder<A, S, Z>
where
    A: Aggregate,
    S: EventStore,
    Z: Serializer,
{
    /// Creates a new instance of a [`RepositoryBuilder`], building fresh aggregates with the
    /// given factory.
    pub fn with_factory(store: S, serializer: Z, factory: impl Fn() -> A + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            store,
            serializer,
            observers: vec![],
        }
    }

    /// Set observers list
    pub fn with_observers(mut self, observers: Vec<Box<dyn Observer<A>>>) -> Self {
        self.observers = observers;
        self
    }

    /// Add a single observer. Observers are notified in the order they are added.
    pub fn add_observer(mut self, observer: impl Observer<A> + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn build(self) -> Repository<A, S, Z> {
        Repository {
            factory: self.factory,
            store: self.store,
            serializer: self.serializer,
            observers: self.observers,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RepositoryError<E>
where
    E: std::error::Error + 'static,
{
    /// The command cannot be handled as is.
    #[error("invalid command: {0}")]
    InvalidCommand(&'static str),
    /// No history has been persisted for the aggregate.
    #[error("unable to find aggregate for id {0}")]
    NotFound(String),
    #[error(transparent)]
    Serializer(#[from] SerializerError),
    #[error(transparent)]
    Store(StoreError),
    /// The aggregate rejected an event of its history.
    #[error("aggregate was unable to handle event {event_type} at version {version}: {source}")]
    ApplicationFailed {
        event_type: &'static str,
        version: Version,
        #[source]
        source: E,
    },
    /// The aggregate rejected the command.
    #[error("unsupported command: {0}")]
    UnsupportedCommand(#[source] E),
}

impl<E> RepositoryError<E>
where
    E: std::error::Error + 'static,
{
    /// Whether the error is an optimistic concurrency conflict: loading the aggregate again and
    /// retrying the command might succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_conflict())
    }
}

impl<E> From<StoreError> for RepositoryError<E>
where
    E: std::error::Error + 'static,
{
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(aggregate_id) => Self::NotFound(aggregate_id),
            error => Self::Store(error),
        }
    }
}
