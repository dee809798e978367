//! 资源预留（es-reservation）
//!
//! 在聚合版本之外为命名资源提供唯一性保证，例如跨聚合的邮箱唯一：
//! - [`Registry`]：reserve / is_available / release；
//! - [`ReservationTable`]：条件写预留表，内置 [`MemoryReservationTable`]，
//!   `dynamo` 特性提供 DynamoDB 实现；
//! - [`ReservingDispatcher`] / [`ReservingApplier`]：在命令执行前按 [`Reservable`] 声明先行预留。
//!
pub mod config;
pub mod decorator;
pub mod memory;
pub mod registry;
pub mod resource;
pub mod table;

#[cfg(feature = "dynamo")]
pub mod dynamo;

pub use config::RegistryConfig;
pub use decorator::{ReservingApplier, ReservingDispatcher};
pub use memory::MemoryReservationTable;
pub use registry::Registry;
pub use resource::{Reservable, Resource};
pub use table::{ReservationRow, ReservationTable};

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoReservationTable;
