use super::table::{Item, ItemTable, Page, PartitionWrite, TableError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// 内存条件写表
///
/// 条件检查与写入在同一把锁内完成；`page_size` 用于模拟分页查询。
pub struct MemoryItemTable {
    items: Mutex<BTreeMap<(String, u64), Item>>,
    page_size: usize,
}

impl Default for MemoryItemTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryItemTable {
    pub fn new() -> Self {
        Self::with_page_size(usize::MAX)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// 读取单个数据项的当前镜像
    pub async fn item(&self, aggregate_id: &str, partition: u64) -> Option<Item> {
        self.items
            .lock()
            .await
            .get(&(aggregate_id.to_string(), partition))
            .cloned()
    }
}

#[async_trait]
impl ItemTable for MemoryItemTable {
    async fn append(
        &self,
        aggregate_id: &str,
        writes: Vec<PartitionWrite>,
    ) -> Result<(), TableError> {
        let mut items = self.items.lock().await;

        let occupied = writes.iter().any(|w| {
            items
                .get(&(aggregate_id.to_string(), w.partition))
                .is_some_and(|item| {
                    w.records
                        .iter()
                        .any(|r| item.events.contains_key(&r.version))
                })
        });
        if occupied {
            return Err(TableError::ConditionFailed);
        }

        for write in writes {
            let item = items
                .entry((aggregate_id.to_string(), write.partition))
                .or_insert_with(|| Item {
                    aggregate_id: aggregate_id.to_string(),
                    partition: write.partition,
                    ..Default::default()
                });
            item.revision += 1;
            item.events
                .extend(write.records.into_iter().map(|r| (r.version, r.data)));
        }
        Ok(())
    }

    async fn query(
        &self,
        aggregate_id: &str,
        from_partition: u64,
        to_partition: Option<u64>,
        after: Option<u64>,
    ) -> Result<Page, TableError> {
        let start = match after {
            Some(last) => last.saturating_add(1).max(from_partition),
            None => from_partition,
        };
        let end = to_partition.unwrap_or(u64::MAX);
        if start > end {
            return Ok(Page::default());
        }

        let items = self.items.lock().await;
        let mut matched = items
            .range((aggregate_id.to_string(), start)..=(aggregate_id.to_string(), end))
            .map(|(_, item)| item.clone());

        let page: Vec<Item> = matched.by_ref().take(self.page_size).collect();
        let last_partition = match matched.next() {
            Some(_) => page.last().map(|item| item.partition),
            None => None,
        };

        Ok(Page {
            items: page,
            last_partition,
        })
    }

    async fn contains(&self, aggregate_id: &str) -> Result<bool, TableError> {
        let items = self.items.lock().await;
        Ok(items
            .range((aggregate_id.to_string(), 0)..=(aggregate_id.to_string(), u64::MAX))
            .next()
            .is_some())
    }
}
