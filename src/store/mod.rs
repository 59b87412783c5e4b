use std::ops::Deref;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{BoxError, Version};

pub mod memory;
pub mod transactional;

/// An EventStore is responsible for persisting the serialized events of an aggregate, and loading
/// them back ordered by version.
///
/// Records become visible to [`EventStore::load`] only once [`EventStore::save`] has returned
/// successfully, all of them at once.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persists the given records for the aggregate. Saving no records is a no-op.
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> Result<(), StoreError>;

    /// Loads the history of the aggregate between `from_version` and `to_version`, both inclusive.
    ///
    /// A `from_version` of 0 loads from the first event, a `to_version` of 0 loads up to the last.
    async fn load(&self, aggregate_id: &str, from_version: Version, to_version: Version)
        -> Result<History, StoreError>;
}

/// Blanket implementation making an [`EventStore`] every (smart) pointer to an [`EventStore`],
/// e.g. `&Store`, `Box<Store>`, `Arc<Store>`.
#[async_trait]
impl<S, T> EventStore for T
where
    S: EventStore + ?Sized,
    T: Deref<Target = S> + Send + Sync,
{
    /// Deref call to [`EventStore::save`].
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> Result<(), StoreError> {
        self.deref().save(aggregate_id, records).await
    }

    /// Deref call to [`EventStore::load`].
    async fn load(
        &self,
        aggregate_id: &str,
        from_version: Version,
        to_version: Version,
    ) -> Result<History, StoreError> {
        self.deref().load(aggregate_id, from_version, to_version).await
    }
}

/// The serialized form of a single event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub version: Version,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(version: Version, data: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            data: data.into(),
        }
    }
}

/// The records of a single aggregate, ordered by ascending version.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct History(Vec<Record>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the most recent record, if any.
    pub fn last_version(&self) -> Option<Version> {
        self.0.last().map(|record| record.version)
    }

    pub(crate) fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        self.0.extend(records);
        // Stable, so records sharing a version keep their insertion order.
        self.0.sort_by_key(|record| record.version);
    }

    pub fn into_inner(self) -> Vec<Record> {
        self.0
    }
}

impl Deref for History {
    type Target = [Record];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Record>> for History {
    fn from(mut records: Vec<Record>) -> Self {
        records.sort_by_key(|record| record.version);
        Self(records)
    }
}

impl FromIterator<Record> for History {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<Record>>().into()
    }
}

impl IntoIterator for History {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The store holds no history for the aggregate.
    #[error("no aggregate found with id {0}")]
    NotFound(String),
    /// The batch holds more records than the backend can commit atomically.
    #[error("cannot save {size} events at a time, the limit is {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    /// Two records of the same batch share a version.
    #[error("duplicate version {0} detected in batch")]
    DuplicateVersion(Version),
    /// Another writer already committed different records at the same versions.
    #[error("conditional check failed saving events of aggregate {0}")]
    ConditionalCheckFailed(String),
    /// An item read from the backend does not have the expected layout.
    #[error("malformed item: {0}")]
    MalformedItem(String),
    /// Error raised by the backend, propagated unchanged.
    #[error(transparent)]
    Backend(BoxError),
}

impl StoreError {
    /// Whether the error is an optimistic concurrency conflict, worth retrying with a fresh state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed(_))
    }
}
