pub use client::*;
pub use config::TableConfig;
#[cfg(feature = "postgres")]
pub use postgres::PgTransactionalClient;

use async_trait::async_trait;

use crate::store::{EventStore, History, Record, StoreError};
use crate::types::Version;

mod client;
mod config;
#[cfg(feature = "postgres")]
mod postgres;

/// Maximum number of records committed by a single transaction.
pub const MAX_TRANSACTION_ITEMS: usize = 25;

/// [`EventStore`] on top of a remote [`TransactionalClient`], with optimistic concurrency control.
///
/// Every record is written with the precondition that no record exists yet at the same
/// (aggregate id, version) key, and a batch is committed as a single all-or-nothing transaction.
/// When a save is rejected because some of those preconditions failed, the stored history is read
/// back: if it already holds exactly the records being saved, the save is considered a retry of an
/// already committed one and succeeds. Otherwise another writer won, and the save fails with
/// [`StoreError::ConditionalCheckFailed`].
///
/// The store holds no mutable state: all coordination happens through the backend.
pub struct TransactionalStore<C> {
    config: TableConfig,
    client: C,
}

impl<C> TransactionalStore<C>
where
    C: TransactionalClient,
{
    pub fn new(config: TableConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the table layout of this store.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn conditional_write(&self, aggregate_id: &str, record: &Record) -> ConditionalWrite {
        ConditionalWrite {
            table_name: self.config.table_name.clone(),
            key: Item::from([
                (
                    self.config.partition_key.clone(),
                    AttributeValue::S(aggregate_id.to_string()),
                ),
                (self.config.sort_key.clone(), AttributeValue::N(record.version)),
            ]),
            attributes: Item::from([(
                self.config.payload_column.clone(),
                AttributeValue::B(record.data.clone()),
            )]),
            condition: Condition::AttributeNotExists(self.config.sort_key.clone()),
        }
    }

    fn query(&self, aggregate_id: &str, from_version: Version, to_version: Version) -> Query {
        let sort_key = if to_version > 0 {
            Some(SortKeyCondition::Between {
                name: self.config.sort_key.clone(),
                from: from_version,
                to: to_version,
            })
        } else if from_version > 0 {
            Some(SortKeyCondition::AtLeast {
                name: self.config.sort_key.clone(),
                from: from_version,
            })
        } else {
            None
        };

        Query {
            table_name: self.config.table_name.clone(),
            partition_key: self.config.partition_key.clone(),
            partition_value: aggregate_id.to_string(),
            sort_key,
            consistent_read: true,
        }
    }

    fn decode_item(&self, mut item: Item) -> Result<Record, StoreError> {
        let version = match item.remove(&self.config.sort_key) {
            Some(AttributeValue::N(version)) => version,
            _ => return Err(StoreError::MalformedItem(format!("missing numeric {}", self.config.sort_key))),
        };

        let data = match item.remove(&self.config.payload_column) {
            Some(AttributeValue::B(data)) => data,
            _ => {
                return Err(StoreError::MalformedItem(format!(
                    "missing binary {} at version {}",
                    self.config.payload_column, version
                )))
            }
        };

        Ok(Record { version, data })
    }

    /// Checks whether the rejected batch is already stored as is, in which case the save is a
    /// retry of a committed one.
    ///
    /// The batch must be the tail of the stored history: if the aggregate moved past the batch
    /// in the meantime the save is reported as a conflict.
    async fn ensure_idempotent(&self, aggregate_id: &str, records: &[Record]) -> Result<(), StoreError> {
        let conflict = || StoreError::ConditionalCheckFailed(aggregate_id.to_string());

        // Records are sorted by version.
        let Some(last) = records.last() else {
            return Ok(());
        };

        let history = self.load(aggregate_id, 0, 0).await?;
        if history.last_version() != Some(last.version) {
            tracing::debug!(
                stored = ?history.last_version(),
                attempted = last.version,
                "stored history does not end with the attempted batch"
            );
            return Err(conflict());
        }

        if history.len() < records.len() {
            tracing::debug!(
                stored = history.len(),
                attempted = records.len(),
                "fewer records stored than attempted"
            );
            return Err(conflict());
        }

        let recent = &history[history.len() - records.len()..];
        if recent != records {
            tracing::debug!("stored records differ from the attempted ones");
            return Err(conflict());
        }

        tracing::debug!("records already stored, treating save as a retry");
        Ok(())
    }
}

#[async_trait]
impl<C> EventStore for TransactionalStore<C>
where
    C: TransactionalClient,
{
    #[tracing::instrument(skip_all, fields(aggregate_id = %aggregate_id, records = records.len()), err)]
    async fn save(&self, aggregate_id: &str, mut records: Vec<Record>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        if records.len() > MAX_TRANSACTION_ITEMS {
            return Err(StoreError::BatchTooLarge {
                size: records.len(),
                limit: MAX_TRANSACTION_ITEMS,
            });
        }

        records.sort_by_key(|record| record.version);
        if let Some(pair) = records.windows(2).find(|pair| pair[0].version == pair[1].version) {
            return Err(StoreError::DuplicateVersion(pair[0].version));
        }

        let writes: Vec<ConditionalWrite> = records
            .iter()
            .map(|record| self.conditional_write(aggregate_id, record))
            .collect();

        match self.client.transact_write(writes).await {
            Ok(()) => Ok(()),
            Err(error) if error.is_conditional_check_failure() => {
                tracing::debug!(error = %error, "conditional check failed, checking for a retried save");
                self.ensure_idempotent(aggregate_id, &records).await
            }
            Err(error) => Err(StoreError::Backend(Box::new(error))),
        }
    }

    #[tracing::instrument(skip(self), err)]
    async fn load(
        &self,
        aggregate_id: &str,
        from_version: Version,
        to_version: Version,
    ) -> Result<History, StoreError> {
        let items = self
            .client
            .query(self.query(aggregate_id, from_version, to_version))
            .await
            .map_err(StoreError::Backend)?;

        items
            .into_iter()
            .map(|item| self.decode_item(item))
            .collect::<Result<History, StoreError>>()
    }
}

impl<C> std::fmt::Debug for TransactionalStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalStore")
            .field("config", &self.config)
            .finish()
    }
}
