//! 存储后端配置
//!
use bon::Builder;
use serde::Deserialize;

/// 分区存储配置
#[derive(Debug, Clone, Builder, Deserialize)]
#[serde(default)]
pub struct PartitionedStoreConfig {
    /// 每个数据项容纳的事件数，决定 `partition = version / events_per_item`
    #[builder(default = 100)]
    pub events_per_item: u64,
}

impl Default for PartitionedStoreConfig {
    fn default() -> Self {
        Self {
            events_per_item: 100,
        }
    }
}

/// DynamoDB 连接配置
#[cfg(feature = "dynamo")]
#[derive(Debug, Clone, Builder, Deserialize)]
pub struct DynamoConfig {
    #[builder(into)]
    pub table_name: String,
    #[builder(into, default = "us-east-1".to_string())]
    #[serde(default = "default_region")]
    pub region: String,
    /// 本地调试时指向 DynamoDB Local 等端点
    #[builder(into)]
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[cfg(feature = "dynamo")]
fn default_region() -> String {
    "us-east-1".to_string()
}

/// RocksDB 存储配置
#[cfg(feature = "rocksdb")]
#[derive(Debug, Clone, Builder, Deserialize)]
pub struct OrderedStoreConfig {
    #[builder(into)]
    pub path: std::path::PathBuf,
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

#[cfg(feature = "rocksdb")]
fn default_true() -> bool {
    true
}

/// Postgres 存储配置
#[cfg(feature = "postgres")]
#[derive(Debug, Clone, Builder, Deserialize)]
pub struct PostgresStoreConfig {
    #[builder(into, default = "events".to_string())]
    #[serde(default = "default_table")]
    pub table_name: String,
}

#[cfg(feature = "postgres")]
fn default_table() -> String {
    "events".to_string()
}
