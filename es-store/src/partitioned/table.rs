use async_trait::async_trait;
use es_domain::error::{BoxError, DomainError};
use es_domain::record::Record;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// 表操作错误
#[derive(Debug, Error)]
pub enum TableError {
    /// 条件写的前置条件未满足，整批写入均未生效
    #[error("conditional check failed")]
    ConditionFailed,
    #[error("invalid attribute key: {key}")]
    InvalidKey { key: String },
    #[error("invalid item: {reason}")]
    InvalidItem { reason: String },
    #[error("{reason}: {source}")]
    Backend {
        reason: String,
        #[source]
        source: BoxError,
    },
}

impl TableError {
    pub fn backend(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        TableError::Backend {
            reason: reason.into(),
            source: source.into(),
        }
    }
}

impl From<TableError> for DomainError {
    fn from(err: TableError) -> Self {
        DomainError::store("item table operation failed", err)
    }
}

/// 一个物理数据项：同一聚合、同一分区内的连续版本
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub aggregate_id: String,
    pub partition: u64,
    /// 每次条件写成功后递增
    pub revision: u64,
    pub events: BTreeMap<u64, Vec<u8>>,
}

impl Item {
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.events
            .iter()
            .map(|(version, data)| Record::new(*version, data.clone()))
    }
}

/// 写入某一分区的一组记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionWrite {
    pub partition: u64,
    pub records: Vec<Record>,
}

/// 查询结果的一页
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,
    /// 存在后续页时为本页最后一个分区，作为下一次查询的起点（不含）
    pub last_partition: Option<u64>,
}

/// 条件写文档表
///
/// 以 `(aggregate_id, partition)` 寻址数据项，事件以独立属性存放于数据项中。
#[async_trait]
pub trait ItemTable: Send + Sync {
    /// 原子地写入所有分区：每个事件属性都必须尚不存在，成功后各数据项 revision 加一；
    /// 任一条件失败时整体不生效，返回 `TableError::ConditionFailed`
    async fn append(&self, aggregate_id: &str, writes: Vec<PartitionWrite>)
    -> Result<(), TableError>;

    /// 查询分区落在 `[from_partition, to_partition]` 内的数据项，`to_partition = None` 表示无上界；
    /// `after` 为上一页返回的 `last_partition`
    async fn query(
        &self,
        aggregate_id: &str,
        from_partition: u64,
        to_partition: Option<u64>,
        after: Option<u64>,
    ) -> Result<Page, TableError>;

    /// 聚合是否存在任何数据项
    async fn contains(&self, aggregate_id: &str) -> Result<bool, TableError>;
}

#[async_trait]
impl<T: ItemTable + ?Sized> ItemTable for Arc<T> {
    async fn append(
        &self,
        aggregate_id: &str,
        writes: Vec<PartitionWrite>,
    ) -> Result<(), TableError> {
        (**self).append(aggregate_id, writes).await
    }

    async fn query(
        &self,
        aggregate_id: &str,
        from_partition: u64,
        to_partition: Option<u64>,
        after: Option<u64>,
    ) -> Result<Page, TableError> {
        (**self)
            .query(aggregate_id, from_partition, to_partition, after)
            .await
    }

    async fn contains(&self, aggregate_id: &str) -> Result<bool, TableError> {
        (**self).contains(aggregate_id).await
    }
}
