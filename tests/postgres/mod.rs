use sqlx::{Pool, Postgres};
use uuid::Uuid;

use eslite::store::transactional::{
    AttributeValue, CancellationReason, Condition, ConditionalWrite, Item, PgTransactionalClient, TransactionError,
    TransactionalClient, TransactionalStore,
};
use eslite::store::{EventStore, Record, StoreError};
use eslite::RepositoryBuilder;

use crate::aggregate::{todo_serializer, Todo, TodoCommand};
use crate::fake::table_config;

async fn pg_store(pool: &Pool<Postgres>) -> TransactionalStore<PgTransactionalClient> {
    let client = PgTransactionalClient::new(pool.clone());
    client.create_table(&table_config()).await.unwrap();
    TransactionalStore::new(table_config(), client)
}

fn write(aggregate_id: &str, version: i64, data: &[u8]) -> ConditionalWrite {
    let config = table_config();
    ConditionalWrite {
        table_name: config.table_name,
        key: Item::from([
            (config.partition_key, AttributeValue::S(aggregate_id.to_string())),
            (config.sort_key.clone(), AttributeValue::N(version)),
        ]),
        attributes: Item::from([(config.payload_column, AttributeValue::B(data.to_vec()))]),
        condition: Condition::AttributeNotExists(config.sort_key),
    }
}

#[sqlx::test]
async fn create_table_is_idempotent(pool: Pool<Postgres>) {
    let client = PgTransactionalClient::new(pool.clone());

    client.create_table(&table_config()).await.unwrap();
    client.create_table(&table_config()).await.unwrap();

    let rows = sqlx::query("SELECT column_name FROM information_schema.columns WHERE table_name = $1")
        .bind(table_config().table_name)
        .fetch_all(&pool)
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
}

#[sqlx::test]
async fn save_then_load(pool: Pool<Postgres>) {
    let store = pg_store(&pool).await;
    let aggregate_id = Uuid::new_v4().to_string();

    assert!(store.load(&aggregate_id, 0, 0).await.unwrap().is_empty());

    let records = vec![Record::new(2, b"second".to_vec()), Record::new(1, b"first".to_vec())];
    store.save(&aggregate_id, records).await.unwrap();

    let history = store.load(&aggregate_id, 0, 0).await.unwrap();
    assert_eq!(history.last_version(), Some(2));
    assert_eq!(history[0], Record::new(1, b"first".to_vec()));
    assert_eq!(history[1], Record::new(2, b"second".to_vec()));

    let history = store.load(&aggregate_id, 2, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, 2);
}

#[sqlx::test]
async fn retried_save_succeeds(pool: Pool<Postgres>) {
    let store = pg_store(&pool).await;
    let aggregate_id = Uuid::new_v4().to_string();
    let records = vec![Record::new(1, b"created".to_vec())];

    store.save(&aggregate_id, records.clone()).await.unwrap();
    store.save(&aggregate_id, records).await.unwrap();

    assert_eq!(store.load(&aggregate_id, 0, 0).await.unwrap().len(), 1);
}

#[sqlx::test]
async fn competing_save_conflicts(pool: Pool<Postgres>) {
    let store = pg_store(&pool).await;
    let aggregate_id = Uuid::new_v4().to_string();

    store
        .save(&aggregate_id, vec![Record::new(1, b"mine".to_vec())])
        .await
        .unwrap();

    let result = store
        .save(
            &aggregate_id,
            vec![Record::new(1, b"theirs".to_vec()), Record::new(2, b"theirs".to_vec())],
        )
        .await;

    assert!(matches!(result, Err(StoreError::ConditionalCheckFailed(ref id)) if *id == aggregate_id));

    let history = store.load(&aggregate_id, 0, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].data, b"mine".to_vec());
}

#[sqlx::test]
async fn canceled_transaction_is_rolled_back(pool: Pool<Postgres>) {
    let client = PgTransactionalClient::new(pool.clone());
    client.create_table(&table_config()).await.unwrap();
    let aggregate_id = Uuid::new_v4().to_string();

    client.transact_write(vec![write(&aggregate_id, 2, b"taken")]).await.unwrap();

    let result = client
        .transact_write(vec![
            write(&aggregate_id, 1, b"free"),
            write(&aggregate_id, 2, b"conflicting"),
        ])
        .await;

    match result {
        Err(TransactionError::Canceled(reasons)) => assert_eq!(
            reasons,
            vec![CancellationReason::None, CancellationReason::ConditionalCheckFailed]
        ),
        other => panic!("expected a canceled transaction, got {:?}", other),
    }

    let store = TransactionalStore::new(table_config(), client);
    let history = store.load(&aggregate_id, 0, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, 2);
}

#[sqlx::test]
async fn repository_on_postgres(pool: Pool<Postgres>) {
    let repository = RepositoryBuilder::<Todo, _, _>::new(pg_store(&pool).await, todo_serializer()).build();
    let id = Uuid::new_v4().to_string();

    repository.apply(&TodoCommand::create(&id, "persist me")).await.unwrap();
    let todo = repository.apply(&TodoCommand::done(&id)).await.unwrap();

    assert_eq!(todo.version, 2);
    assert!(todo.done);
    assert_eq!(repository.load(&id).await.unwrap(), todo);
}
