use crate::table::{ReservationRow, ReservationTable};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use es_domain::error::{DomainError, DomainResult};

/// 基于 DashMap 的内存预留表，条件判断与写入在同一分片锁内完成
#[derive(Default)]
pub struct MemoryReservationTable {
    rows: DashMap<String, ReservationRow>,
}

impl MemoryReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl ReservationTable for MemoryReservationTable {
    async fn put(&self, row: ReservationRow) -> DomainResult<()> {
        match self.rows.entry(row.key.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().owner != row.owner {
                    return Err(DomainError::AlreadyReserved { key: row.key });
                }
                existing.insert(row);
            }
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> DomainResult<Option<ReservationRow>> {
        Ok(self.rows.get(key).map(|row| row.value().clone()))
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        self.rows.remove(key);
        Ok(())
    }
}
