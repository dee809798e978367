//! Postgres 事件存储（sqlx）
//!
//! 表结构见 [`PostgresStore::migrate`]：`(aggregate_id, version)` 唯一约束承担乐观并发检查，
//! 自增主键 `id` 作为全局读取位点。
//!
use crate::config::PostgresStoreConfig;
use async_trait::async_trait;
use es_domain::error::{DomainError, DomainResult};
use es_domain::record::{History, Record, StreamRecord};
use es_domain::store::{Store, StreamReader, ensure_idempotent, prepare_records};
use sqlx::{PgPool, Row};

pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    pub fn new(pool: PgPool, config: &PostgresStoreConfig) -> DomainResult<Self> {
        if !is_valid_table_name(&config.table_name) {
            return Err(DomainError::Store {
                reason: format!("invalid table name: {}", config.table_name),
                source: None,
            });
        }

        Ok(Self {
            pool,
            table: config.table_name.clone(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 建表（幂等）
    pub async fn migrate(&self) -> DomainResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                aggregate_id TEXT NOT NULL,
                version BIGINT NOT NULL,
                data BYTEA NOT NULL,
                UNIQUE (aggregate_id, version)
            )",
            table = self.table
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|err| DomainError::store("unable to create events table", err))?;

        tracing::info!(table = %self.table, "events table ready");
        Ok(())
    }

    async fn exists(&self, aggregate_id: &str) -> DomainResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE aggregate_id = $1)",
            self.table
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(aggregate_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| DomainError::store("postgres exists query failed", err))
    }
}

fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn to_i64(value: u64) -> DomainResult<i64> {
    i64::try_from(value).map_err(|err| DomainError::store("value exceeds BIGINT range", err))
}

fn to_u64(value: i64) -> DomainResult<u64> {
    u64::try_from(value).map_err(|err| DomainError::store("negative value in events table", err))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Store for PostgresStore {
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> DomainResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let records = prepare_records(aggregate_id, records)?;
        let (first, last) = match (records.first(), records.last()) {
            (Some(f), Some(l)) => (f.version, l.version),
            _ => return Ok(()),
        };

        let sql = format!(
            "INSERT INTO {} (aggregate_id, version, data) VALUES ($1, $2, $3)",
            self.table
        );
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| DomainError::store("unable to begin transaction", err))?;

        let mut violated = false;
        for record in &records {
            let result = sqlx::query(&sql)
                .bind(aggregate_id)
                .bind(to_i64(record.version)?)
                .bind(record.data.as_slice())
                .execute(&mut *tx)
                .await;
            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    violated = true;
                    break;
                }
                Err(err) => return Err(DomainError::store("postgres insert failed", err)),
            }
        }

        if violated {
            tx.rollback()
                .await
                .map_err(|err| DomainError::store("unable to roll back transaction", err))?;
            let stored = match self.load(aggregate_id, first, last).await {
                Ok(history) => history,
                Err(err) if err.is_not_found() => History::new(),
                Err(err) => return Err(err),
            };
            return ensure_idempotent(aggregate_id, &records, &stored);
        }

        tx.commit()
            .await
            .map_err(|err| DomainError::store("unable to commit transaction", err))?;
        tracing::debug!(aggregate_id, first, last, "inserted records");
        Ok(())
    }

    async fn load(
        &self,
        aggregate_id: &str,
        from_version: u64,
        to_version: u64,
    ) -> DomainResult<History> {
        let sql = format!(
            "SELECT version, data FROM {} \
             WHERE aggregate_id = $1 AND version >= $2 AND ($3 = 0 OR version <= $3) \
             ORDER BY version",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(aggregate_id)
            .bind(to_i64(from_version)?)
            .bind(to_i64(to_version)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| DomainError::store("postgres load failed", err))?;

        if rows.is_empty() && !self.exists(aggregate_id).await? {
            return Err(DomainError::AggregateNotFound {
                aggregate_id: aggregate_id.to_string(),
            });
        }

        let mut history = History::new();
        for row in rows {
            let version: i64 = row.get("version");
            let data: Vec<u8> = row.get("data");
            history.push(Record::new(to_u64(version)?, data));
        }
        Ok(history)
    }
}

#[async_trait]
impl StreamReader for PostgresStore {
    async fn read(&self, offset: u64, count: usize) -> DomainResult<Vec<StreamRecord>> {
        let sql = format!(
            "SELECT id, aggregate_id, version, data FROM {} WHERE id >= $1 ORDER BY id LIMIT $2",
            self.table
        );
        let limit = if count == 0 {
            None
        } else {
            Some(i64::try_from(count).unwrap_or(i64::MAX))
        };

        let rows = sqlx::query(&sql)
            .bind(to_i64(offset)?)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| DomainError::store("postgres read failed", err))?;

        rows.into_iter()
            .map(|row| -> DomainResult<StreamRecord> {
                let offset: i64 = row.get("id");
                let version: i64 = row.get("version");
                let data: Vec<u8> = row.get("data");
                Ok(StreamRecord {
                    offset: to_u64(offset)?,
                    aggregate_id: row.get("aggregate_id"),
                    record: Record::new(to_u64(version)?, data),
                })
            })
            .collect()
    }
}
