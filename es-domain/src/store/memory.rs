use super::{Store, StreamReader, ensure_idempotent, in_range, prepare_records};
use crate::error::{DomainError, DomainResult};
use crate::record::{History, Record, StreamRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

/// 内存事件存储
///
/// 所有访问由一把互斥锁串行化，适用于测试，不提供持久性保证。
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    aggregates: HashMap<String, BTreeMap<u64, Vec<u8>>>,
    /// 全局写入顺序，下标 + 1 即位点
    log: Vec<(String, u64)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> DomainResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let records = prepare_records(aggregate_id, records)?;

        let mut state = self.state.lock().await;
        let existing = state.aggregates.entry(aggregate_id.to_string()).or_default();

        if records.iter().any(|r| existing.contains_key(&r.version)) {
            let stored: History = existing
                .iter()
                .map(|(version, data)| Record::new(*version, data.clone()))
                .collect();
            return ensure_idempotent(aggregate_id, &records, &stored);
        }

        for record in &records {
            existing.insert(record.version, record.data.clone());
        }
        state.log.extend(
            records
                .iter()
                .map(|r| (aggregate_id.to_string(), r.version)),
        );

        tracing::debug!(aggregate_id, count = records.len(), "saved records in memory");
        Ok(())
    }

    async fn load(
        &self,
        aggregate_id: &str,
        from_version: u64,
        to_version: u64,
    ) -> DomainResult<History> {
        let state = self.state.lock().await;
        let records = state
            .aggregates
            .get(aggregate_id)
            .filter(|records| !records.is_empty())
            .ok_or_else(|| DomainError::AggregateNotFound {
                aggregate_id: aggregate_id.to_string(),
            })?;

        Ok(records
            .iter()
            .filter(|(version, _)| in_range(**version, from_version, to_version))
            .map(|(version, data)| Record::new(*version, data.clone()))
            .collect())
    }
}

#[async_trait]
impl StreamReader for MemoryStore {
    async fn read(&self, offset: u64, count: usize) -> DomainResult<Vec<StreamRecord>> {
        let state = self.state.lock().await;
        let start = offset.saturating_sub(1) as usize;
        let limit = if count == 0 { usize::MAX } else { count };

        Ok(state
            .log
            .iter()
            .enumerate()
            .skip(start)
            .take(limit)
            .filter_map(|(idx, (aggregate_id, version))| {
                let data = state.aggregates.get(aggregate_id)?.get(version)?;
                Some(StreamRecord {
                    offset: idx as u64 + 1,
                    aggregate_id: aggregate_id.clone(),
                    record: Record::new(*version, data.clone()),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;
    use std::sync::Arc;

    #[tokio::test]
    async fn memory_store_satisfies_the_contract() {
        contract::run_all(&MemoryStore::new()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_have_a_single_winner() {
        contract::concurrent_writers(Arc::new(MemoryStore::new()), 16).await;
    }

    #[tokio::test]
    async fn read_follows_global_write_order() {
        let store = MemoryStore::new();
        store
            .save("a", vec![Record::new(1, b"a1".to_vec())])
            .await
            .unwrap();
        store
            .save(
                "b",
                vec![Record::new(1, b"b1".to_vec()), Record::new(2, b"b2".to_vec())],
            )
            .await
            .unwrap();
        store
            .save("a", vec![Record::new(2, b"a2".to_vec())])
            .await
            .unwrap();

        let all = store.read(0, 0).await.unwrap();
        let seen: Vec<(u64, &str, u64)> = all
            .iter()
            .map(|r| (r.offset, r.aggregate_id.as_str(), r.record.version))
            .collect();
        assert_eq!(
            seen,
            vec![(1, "a", 1), (2, "b", 1), (3, "b", 2), (4, "a", 2)]
        );

        let page = store.read(2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].offset, 2);
        assert_eq!(page[1].record.data, b"b2".to_vec());
    }
}
