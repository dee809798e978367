//! 事件存储后端（es-store）
//!
//! 为 `es_domain::store::Store` 契约提供物理实现：
//! - `partitioned`：条件写分区存储，连续版本按 `version / events_per_item` 聚合到同一数据项，
//!   表操作抽象为 `ItemTable`，内置内存表，`dynamo` 特性提供 DynamoDB 表；
//! - `ordered`（`rocksdb` 特性）：有序键值存储，额外要求版本严格连续，并提供全局顺序读取；
//! - `postgres`（`postgres` 特性）：基于 sqlx 的关系库存储，同样提供全局顺序读取。
//!
pub mod config;
pub mod partitioned;

#[cfg(feature = "dynamo")]
pub mod dynamo;
#[cfg(feature = "rocksdb")]
pub mod ordered;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use config::PartitionedStoreConfig;
pub use partitioned::{ItemTable, MemoryItemTable, PartitionedStore, TableError};

#[cfg(feature = "dynamo")]
pub use config::DynamoConfig;
#[cfg(feature = "dynamo")]
pub use dynamo::DynamoItemTable;
#[cfg(feature = "rocksdb")]
pub use config::OrderedStoreConfig;
#[cfg(feature = "rocksdb")]
pub use ordered::OrderedStore;
#[cfg(feature = "postgres")]
pub use config::PostgresStoreConfig;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
