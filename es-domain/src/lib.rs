//! 事件溯源领域层基础库（es-domain）
//!
//! 以不可变、带版本的事件作为唯一事实来源，提供：
//! - 持久化记录（`record`）与统一错误（`error`）
//! - 事件、命令与聚合抽象（`event`、`command`、`aggregate`）
//! - 基于类型注册表的事件序列化（`serializer`），支持 JSON 与 protobuf 信封
//! - 存储契约与内存实现（`store`）
//! - 聚合仓储与命令分发（`repository`、`dispatcher`）
//! - 聚合行为场景测试工具（`scenario`）
//!
//! 具体存储后端（RocksDB、DynamoDB、Postgres）位于 `es-store`，
//! 资源预留（唯一性约束）位于 `es-reservation`。
//!
//! 典型用法：
//! 1. 使用 `#[event]` 定义事件与事件枚举，实现聚合的 `on/apply`；
//! 2. 构造序列化器并 `bind` 全部事件类型；
//! 3. 选择存储后端，组装 `Repository` 并执行命令。
//!
pub mod aggregate;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod record;
pub mod repository;
pub mod scenario;
pub mod serializer;
pub mod store;

// 供过程宏生成代码引用
pub use chrono;
pub use prost;

// 允许在本 crate 内部通过 ::es_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::es_domain 路径。
extern crate self as es_domain;
