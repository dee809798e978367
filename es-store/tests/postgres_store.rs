//! 需要 `DATABASE_URL` 指向可写的 Postgres。
//!
//! 运行：`cargo test -p es-store --features postgres -- --ignored`
use es_domain::record::Record;
use es_domain::store::{Store, StreamReader, contract};
use es_store::{PostgresStore, PostgresStoreConfig};
use sqlx::PgPool;
use std::sync::Arc;

async fn store(table: &str) -> anyhow::Result<PostgresStore> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let url = std::env::var("DATABASE_URL")?;
    let pool = PgPool::connect(&url).await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(&pool)
        .await?;
    let store = PostgresStore::new(pool, &PostgresStoreConfig::builder().table_name(table).build())?;
    store.migrate().await?;
    Ok(store)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn satisfies_the_store_contract() -> anyhow::Result<()> {
    contract::run_all(&store("events_contract").await?).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_writers_have_a_single_winner() -> anyhow::Result<()> {
    contract::concurrent_writers(Arc::new(store("events_race").await?), 8).await;
    Ok(())
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn read_returns_rows_in_insert_order() -> anyhow::Result<()> {
    let store = store("events_stream").await?;
    store.save("a", vec![Record::new(1, b"a1".to_vec())]).await?;
    store.save("b", vec![Record::new(1, b"b1".to_vec())]).await?;
    store.save("a", vec![Record::new(2, b"a2".to_vec())]).await?;

    let all = store.read(0, 0).await?;
    let seen: Vec<(&str, u64)> = all
        .iter()
        .map(|r| (r.aggregate_id.as_str(), r.record.version))
        .collect();
    assert_eq!(seen, vec![("a", 1), ("b", 1), ("a", 2)]);

    let rest = store.read(all[1].offset, 1).await?;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].aggregate_id, "b");
    Ok(())
}
