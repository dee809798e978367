//! 事件存储（store）
//!
//! 所有存储后端遵循同一契约：
//! - `save`：先按版本排序，同批次重复版本返回 `DuplicateVersion`；以原子的条件写追加，
//!   目标版本均须未被占用。冲突时重新读取重叠区间逐字节比较：完全一致视为幂等重放返回成功，
//!   否则返回 `Conflict`。空输入直接成功；
//! - `load`：`to_version = 0` 表示无上界，仅返回 `[from, to]` 内的记录并按版本升序；
//!   从未写入过的聚合返回 `AggregateNotFound`，已存在但区间为空时返回空 `History`；
//! - `StreamReader::read`：可选的全局有序读取，位点由后端分配且单调递增。
//!
//! 通用契约只要求版本唯一，不要求连续；连续性是个别后端的额外约束。
//!
mod memory;

#[cfg(any(test, feature = "test-utils"))]
pub mod contract;

pub use memory::MemoryStore;

use crate::error::{DomainError, DomainResult};
use crate::record::{History, Record, StreamRecord};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Store: Send + Sync {
    /// 原子追加一批记录
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> DomainResult<()>;

    /// 读取 `[from_version, to_version]` 区间的记录
    async fn load(
        &self,
        aggregate_id: &str,
        from_version: u64,
        to_version: u64,
    ) -> DomainResult<History>;
}

#[async_trait]
impl<T: Store + ?Sized> Store for Arc<T> {
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> DomainResult<()> {
        (**self).save(aggregate_id, records).await
    }

    async fn load(
        &self,
        aggregate_id: &str,
        from_version: u64,
        to_version: u64,
    ) -> DomainResult<History> {
        (**self).load(aggregate_id, from_version, to_version).await
    }
}

/// 全局事件流读取
#[async_trait]
pub trait StreamReader: Send + Sync {
    /// 从 `offset`（含）开始读取至多 `count` 条记录，`count = 0` 表示不限
    async fn read(&self, offset: u64, count: usize) -> DomainResult<Vec<StreamRecord>>;
}

#[async_trait]
impl<T: StreamReader + ?Sized> StreamReader for Arc<T> {
    async fn read(&self, offset: u64, count: usize) -> DomainResult<Vec<StreamRecord>> {
        (**self).read(offset, count).await
    }
}

/// 排序并校验同批次内版本唯一
pub fn prepare_records(aggregate_id: &str, mut records: Vec<Record>) -> DomainResult<Vec<Record>> {
    records.sort_by_key(|r| r.version);
    if let Some(pair) = records.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(DomainError::DuplicateVersion {
            aggregate_id: aggregate_id.to_string(),
            version: pair[0].version,
        });
    }
    Ok(records)
}

/// 条件写冲突后的幂等判定：每条提交的记录都必须已按相同内容写入
pub fn ensure_idempotent(
    aggregate_id: &str,
    submitted: &[Record],
    stored: &History,
) -> DomainResult<()> {
    for record in submitted {
        match stored.get(record.version) {
            Some(existing) if existing.data == record.data => continue,
            _ => {
                tracing::debug!(
                    aggregate_id,
                    version = record.version,
                    "conflicting write detected"
                );
                return Err(DomainError::Conflict {
                    aggregate_id: aggregate_id.to_string(),
                    version: record.version,
                });
            }
        }
    }
    tracing::debug!(aggregate_id, count = submitted.len(), "idempotent replay");
    Ok(())
}

/// 版本是否落在 `[from, to]`，`to = 0` 表示无上界
pub fn in_range(version: u64, from_version: u64, to_version: u64) -> bool {
    version >= from_version && (to_version == 0 || version <= to_version)
}
