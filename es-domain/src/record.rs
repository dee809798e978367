//! 持久化记录（Record / History / StreamRecord）
//!
//! `Record` 是一条已序列化事件在存储层的形态，一经写入不可变；
//! `History` 为单个聚合按版本升序排列的记录序列。
//!
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// 单条已序列化事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 聚合内版本号（正整数）
    pub version: u64,
    /// 序列化后的事件内容，对存储层不透明
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(version: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            data: data.into(),
        }
    }
}

/// 单个聚合的记录序列，按版本升序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History(Vec<Record>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由任意顺序的记录构建，并按版本排序
    pub fn sorted(mut records: Vec<Record>) -> Self {
        records.sort_by_key(|r| r.version);
        Self(records)
    }

    pub fn last_version(&self) -> Option<u64> {
        self.0.last().map(|r| r.version)
    }

    /// 按版本查找（要求已排序）
    pub fn get(&self, version: u64) -> Option<&Record> {
        self.0
            .binary_search_by_key(&version, |r| r.version)
            .ok()
            .map(|idx| &self.0[idx])
    }

    pub fn push(&mut self, record: Record) {
        self.0.push(record);
    }

    pub fn into_records(self) -> Vec<Record> {
        self.0
    }
}

impl Deref for History {
    type Target = [Record];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Record>> for History {
    fn from(records: Vec<Record>) -> Self {
        Self(records)
    }
}

impl FromIterator<Record> for History {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for History {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// 全局事件流中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// 存储层分配的全局位点，单调递增
    pub offset: u64,
    pub aggregate_id: String,
    pub record: Record,
}
