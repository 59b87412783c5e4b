use std::collections::HashMap;
use std::ops::Deref;

use async_trait::async_trait;

use crate::types::{BoxError, Version};

/// A single attribute of an item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number
    N(i64),
    /// Binary
    B(Vec<u8>),
}

/// An item of the table, by column name.
pub type Item = HashMap<String, AttributeValue>;

/// Precondition checked on the current item before writing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// The item must not have the given attribute yet, i.e. must not exist when the attribute is
    /// part of its key.
    AttributeNotExists(String),
}

/// One write of a transaction: creates the item at `key` with the given attributes, provided that
/// `condition` holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionalWrite {
    pub table_name: String,
    pub key: Item,
    pub attributes: Item,
    pub condition: Condition,
}

/// Restriction on the sort key of a [`Query`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortKeyCondition {
    /// `from <= sort key <= to`
    Between { name: String, from: Version, to: Version },
    /// `from <= sort key`
    AtLeast { name: String, from: Version },
}

/// Reads all the items of a partition, ordered by sort key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub table_name: String,
    pub partition_key: String,
    pub partition_value: String,
    pub sort_key: Option<SortKeyCondition>,
    /// Whether the read must reflect every write committed before it.
    pub consistent_read: bool,
}

/// Why a write of a canceled transaction failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// The write did not cause the cancellation.
    None,
    /// The condition of the write did not hold.
    ConditionalCheckFailed,
    /// Any other backend specific code.
    Other(String),
}

#[derive(thiserror::Error, Debug)]
pub enum TransactionError {
    /// The transaction has been rejected as a whole, nothing has been written.
    #[error("transaction canceled, reasons: {0:?}")]
    Canceled(Vec<CancellationReason>),
    #[error(transparent)]
    Backend(BoxError),
}

impl TransactionError {
    /// Whether at least one write has been rejected because its condition did not hold.
    pub fn is_conditional_check_failure(&self) -> bool {
        match self {
            Self::Canceled(reasons) => reasons
                .iter()
                .any(|reason| *reason == CancellationReason::ConditionalCheckFailed),
            Self::Backend(_) => false,
        }
    }
}

/// Handle to the remote transactional key-value service backing a [`super::TransactionalStore`].
///
/// The handle is built and owned by the caller; the store never looks it up from the environment.
#[async_trait]
pub trait TransactionalClient: Send + Sync {
    /// Applies all the writes atomically: either every write is performed, or none is.
    async fn transact_write(&self, writes: Vec<ConditionalWrite>) -> Result<(), TransactionError>;

    /// Runs the query, returning the matching items ordered by ascending sort key.
    async fn query(&self, query: Query) -> Result<Vec<Item>, BoxError>;
}

#[async_trait]
impl<C, T> TransactionalClient for T
where
    C: TransactionalClient + ?Sized,
    T: Deref<Target = C> + Send + Sync,
{
    /// Deref call to [`TransactionalClient::transact_write`].
    async fn transact_write(&self, writes: Vec<ConditionalWrite>) -> Result<(), TransactionError> {
        self.deref().transact_write(writes).await
    }

    /// Deref call to [`TransactionalClient::query`].
    async fn query(&self, query: Query) -> Result<Vec<Item>, BoxError> {
        self.deref().query(query).await
    }
}
