//! 条件写分区存储（partitioned）
//!
//! 连续版本按 `partition = version / events_per_item` 聚合到同一数据项中，
//! 每个事件是数据项上的一个独立属性（`_<version>`）。一次保存对所有目标属性附加
//! 「尚不存在」的前置条件并递增 revision，借助表的条件写实现原子追加；
//! 跨分区的批次由表以事务方式一并提交。
//!
//! 只保证版本唯一，允许版本之间存在空洞。
//!
mod keys;
mod memory;
mod table;

pub use keys::{
    changes, event_attribute, is_event_attribute, table_name_from_stream_arn,
    version_from_attribute,
};
pub use memory::MemoryItemTable;
pub use table::{Item, ItemTable, Page, PartitionWrite, TableError};

use crate::config::PartitionedStoreConfig;
use async_trait::async_trait;
use es_domain::error::{DomainError, DomainResult};
use es_domain::record::{History, Record};
use es_domain::store::{Store, ensure_idempotent, in_range, prepare_records};

pub struct PartitionedStore<T> {
    table: T,
    events_per_item: u64,
}

impl<T: ItemTable> PartitionedStore<T> {
    pub fn new(table: T, config: PartitionedStoreConfig) -> Self {
        Self {
            table,
            events_per_item: config.events_per_item.max(1),
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn partition_of(&self, version: u64) -> u64 {
        version / self.events_per_item
    }

    /// 将已排序的记录按分区分组
    fn group(&self, records: Vec<Record>) -> Vec<PartitionWrite> {
        let mut writes: Vec<PartitionWrite> = Vec::new();
        for record in records {
            let partition = self.partition_of(record.version);
            match writes.last_mut() {
                Some(w) if w.partition == partition => w.records.push(record),
                _ => writes.push(PartitionWrite {
                    partition,
                    records: vec![record],
                }),
            }
        }
        writes
    }
}

#[async_trait]
impl<T: ItemTable> Store for PartitionedStore<T> {
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> DomainResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let records = prepare_records(aggregate_id, records)?;
        let (first, last) = match (records.first(), records.last()) {
            (Some(f), Some(l)) => (f.version, l.version),
            _ => return Ok(()),
        };

        let writes = self.group(records.clone());
        match self.table.append(aggregate_id, writes).await {
            Ok(()) => {
                tracing::debug!(aggregate_id, first, last, "appended records to item table");
                Ok(())
            }
            Err(TableError::ConditionFailed) => {
                let stored = match self.load(aggregate_id, first, last).await {
                    Ok(history) => history,
                    Err(err) if err.is_not_found() => History::new(),
                    Err(err) => return Err(err),
                };
                ensure_idempotent(aggregate_id, &records, &stored)
            }
            Err(err) => Err(DomainError::store(
                format!("unable to save records for aggregate {aggregate_id}"),
                err,
            )),
        }
    }

    async fn load(
        &self,
        aggregate_id: &str,
        from_version: u64,
        to_version: u64,
    ) -> DomainResult<History> {
        let from_partition = self.partition_of(from_version);
        let to_partition = (to_version != 0).then(|| self.partition_of(to_version));

        let mut records = Vec::new();
        let mut seen_items = false;
        let mut after = None;
        loop {
            let page = self
                .table
                .query(aggregate_id, from_partition, to_partition, after)
                .await
                .map_err(|err| {
                    DomainError::store(
                        format!("unable to query items for aggregate {aggregate_id}"),
                        err,
                    )
                })?;

            seen_items |= !page.items.is_empty();
            records.extend(
                page.items
                    .iter()
                    .flat_map(Item::records)
                    .filter(|r| in_range(r.version, from_version, to_version)),
            );

            match page.last_partition {
                Some(last) => after = Some(last),
                None => break,
            }
        }

        if !seen_items && !self.table.contains(aggregate_id).await? {
            return Err(DomainError::AggregateNotFound {
                aggregate_id: aggregate_id.to_string(),
            });
        }

        Ok(History::sorted(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_domain::store::contract;
    use std::sync::Arc;

    fn store(events_per_item: u64, page_size: usize) -> PartitionedStore<MemoryItemTable> {
        PartitionedStore::new(
            MemoryItemTable::with_page_size(page_size),
            PartitionedStoreConfig::builder()
                .events_per_item(events_per_item)
                .build(),
        )
    }

    #[tokio::test]
    async fn satisfies_the_contract_with_default_partitioning() {
        contract::run_all(&store(100, usize::MAX)).await;
    }

    #[tokio::test]
    async fn satisfies_the_contract_with_tiny_items_and_pages() {
        contract::run_all(&store(2, 1)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_have_a_single_winner() {
        contract::concurrent_writers(Arc::new(store(100, usize::MAX)), 16).await;
        contract::concurrent_writers(Arc::new(store(1, 1)), 16).await;
    }

    #[tokio::test]
    async fn records_are_grouped_by_partition() {
        let s = store(2, usize::MAX);
        let records = (1..=5).map(|v| Record::new(v, vec![v as u8])).collect();
        s.save("agg", records).await.unwrap();

        let p0 = s.table().item("agg", 0).await.unwrap();
        let p1 = s.table().item("agg", 1).await.unwrap();
        let p2 = s.table().item("agg", 2).await.unwrap();
        assert_eq!(p0.events.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(p1.events.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(p2.events.keys().copied().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(p1.revision, 1);

        s.save("agg", vec![Record::new(6, vec![6])]).await.unwrap();
        let p3 = s.table().item("agg", 3).await.unwrap();
        assert_eq!(p3.revision, 1);
        assert_eq!(s.table().item("agg", 2).await.unwrap().revision, 1);
    }

    #[tokio::test]
    async fn gaps_are_permitted() {
        let s = store(100, usize::MAX);
        s.save("gappy", vec![Record::new(1, b"a".to_vec())])
            .await
            .unwrap();
        s.save("gappy", vec![Record::new(5, b"e".to_vec())])
            .await
            .unwrap();

        let loaded = s.load("gappy", 0, 0).await.unwrap();
        let versions: Vec<u64> = loaded.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 5]);
    }

    #[tokio::test]
    async fn conflict_across_partitions_writes_nothing() {
        let s = store(2, usize::MAX);
        s.save("x", vec![Record::new(3, b"c".to_vec())]).await.unwrap();

        let err = s
            .save(
                "x",
                vec![Record::new(1, b"a".to_vec()), Record::new(3, b"z".to_vec())],
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(s.table().item("x", 0).await.is_none());
    }

    #[tokio::test]
    async fn load_spans_pages() {
        let s = store(1, 2);
        let records = (1..=7).map(|v| Record::new(v, vec![v as u8])).collect();
        s.save("paged", records).await.unwrap();

        let loaded = s.load("paged", 2, 6).await.unwrap();
        let versions: Vec<u64> = loaded.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![2, 3, 4, 5, 6]);
    }
}
