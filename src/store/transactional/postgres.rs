use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query as SqlxQuery;
use sqlx::{Column, Pool, Postgres, Row, Transaction, TypeInfo};

use crate::store::transactional::client::{
    AttributeValue, CancellationReason, ConditionalWrite, Item, Query, SortKeyCondition,
    TransactionError, TransactionalClient,
};
use crate::store::transactional::TableConfig;
use crate::types::BoxError;

/// [`TransactionalClient`] persisting on Postgres.
///
/// Every table holds one row per (partition key, sort key) pair, the pair being its primary key.
/// A conditional write is an insert skipped on key conflict: a skipped insert fails the condition
/// and rolls back the whole transaction.
#[derive(Clone, Debug)]
pub struct PgTransactionalClient {
    pool: Pool<Postgres>,
}

impl PgTransactionalClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Creates the table described by the given config, if it does not exist yet. It should be
    /// run once at application startup.
    ///
    /// # Errors
    ///
    /// Will return an `Err` if there's an error creating the table.
    pub async fn create_table(&self, config: &TableConfig) -> Result<(), sqlx::Error> {
        let statement = format!(
            "CREATE TABLE IF NOT EXISTS {table} ({pk} TEXT NOT NULL, {sk} BIGINT NOT NULL, {payload} BYTEA NOT NULL, PRIMARY KEY ({pk}, {sk}))",
            table = quote(&config.table_name),
            pk = quote(&config.partition_key),
            sk = quote(&config.sort_key),
            payload = quote(&config.payload_column),
        );

        let _ = sqlx::query(statement.as_str()).execute(&self.pool).await?;
        Ok(())
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    async fn write(
        transaction: &mut Transaction<'_, Postgres>,
        write: ConditionalWrite,
    ) -> Result<CancellationReason, sqlx::Error> {
        // `Condition::AttributeNotExists` only holds on key columns: the conflict target is the
        // primary key.
        let (columns, values): (Vec<String>, Vec<AttributeValue>) = write
            .key
            .into_iter()
            .chain(write.attributes)
            .map(|(column, value)| (quote(&column), value))
            .unzip();

        let placeholders: Vec<String> = (1..=values.len()).map(|idx| format!("${}", idx)).collect();
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
            quote(&write.table_name),
            columns.join(", "),
            placeholders.join(", ")
        );

        let result = values
            .into_iter()
            .fold(sqlx::query(statement.as_str()), bind)
            .execute(&mut **transaction)
            .await?;

        Ok(if result.rows_affected() == 0 {
            CancellationReason::ConditionalCheckFailed
        } else {
            CancellationReason::None
        })
    }
}

#[async_trait]
impl TransactionalClient for PgTransactionalClient {
    #[tracing::instrument(skip_all, fields(writes = writes.len()))]
    async fn transact_write(&self, writes: Vec<ConditionalWrite>) -> Result<(), TransactionError> {
        let backend = |error: sqlx::Error| TransactionError::Backend(Box::new(error));

        let mut transaction: Transaction<Postgres> = self.pool.begin().await.map_err(backend)?;
        let mut reasons: Vec<CancellationReason> = Vec::with_capacity(writes.len());

        for write in writes {
            reasons.push(Self::write(&mut transaction, write).await.map_err(backend)?);
        }

        if reasons.iter().any(|reason| *reason != CancellationReason::None) {
            transaction.rollback().await.map_err(backend)?;
            return Err(TransactionError::Canceled(reasons));
        }

        transaction.commit().await.map_err(backend)
    }

    #[tracing::instrument(skip_all, fields(table = %query.table_name, partition = %query.partition_value))]
    async fn query(&self, query: Query) -> Result<Vec<Item>, BoxError> {
        // Postgres reads always observe committed transactions, `consistent_read` holds regardless.
        let mut statement = format!(
            "SELECT * FROM {} WHERE {} = $1",
            quote(&query.table_name),
            quote(&query.partition_key)
        );

        let (sort_key, bounds) = match &query.sort_key {
            Some(SortKeyCondition::Between { name, from, to }) => {
                statement.push_str(&format!(" AND {} BETWEEN $2 AND $3", quote(name)));
                (Some(name), vec![*from, *to])
            }
            Some(SortKeyCondition::AtLeast { name, from }) => {
                statement.push_str(&format!(" AND {} >= $2", quote(name)));
                (Some(name), vec![*from])
            }
            None => (None, vec![]),
        };

        if let Some(name) = sort_key {
            statement.push_str(&format!(" ORDER BY {} ASC", quote(name)));
        }

        let sql_query = bounds.into_iter().fold(
            sqlx::query(statement.as_str()).bind(query.partition_value.as_str()),
            |sql_query, bound| sql_query.bind(bound),
        );

        Ok(sql_query
            .fetch(&self.pool)
            .map_err(|error| Box::new(error) as BoxError)
            .and_then(|row| std::future::ready(row_to_item(&row).map_err(|error| Box::new(error) as BoxError)))
            .try_collect::<Vec<Item>>()
            .await?)
    }
}

fn bind(query: SqlxQuery<'_, Postgres, PgArguments>, value: AttributeValue) -> SqlxQuery<'_, Postgres, PgArguments> {
    match value {
        AttributeValue::S(string) => query.bind(string),
        AttributeValue::N(number) => query.bind(number),
        AttributeValue::B(bytes) => query.bind(bytes),
    }
}

fn row_to_item(row: &PgRow) -> Result<Item, sqlx::Error> {
    let mut item = Item::new();

    for column in row.columns() {
        let value = match column.type_info().name() {
            "INT2" => AttributeValue::N(row.try_get::<i16, _>(column.ordinal())?.into()),
            "INT4" => AttributeValue::N(row.try_get::<i32, _>(column.ordinal())?.into()),
            "INT8" => AttributeValue::N(row.try_get::<i64, _>(column.ordinal())?),
            "BYTEA" => AttributeValue::B(row.try_get::<Vec<u8>, _>(column.ordinal())?),
            _ => AttributeValue::S(row.try_get::<String, _>(column.ordinal())?),
        };

        let _ = item.insert(column.name().to_string(), value);
    }

    Ok(item)
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
