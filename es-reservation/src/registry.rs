//! 资源预留注册表
//!
//! 与聚合版本无关的分布式互斥：同一资源键在任一时刻至多属于一个持有者。
//! 过期的预留不会被视为空闲，须由持有者重新预留或显式释放。
//!
use crate::decorator::{ReservingApplier, ReservingDispatcher};
use crate::resource::{Reservable, Resource};
use crate::table::{ReservationRow, ReservationTable};
use chrono::Utc;
use es_domain::error::{DomainError, DomainResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct Registry {
    table: Arc<dyn ReservationTable>,
}

impl Registry {
    pub fn new(table: impl ReservationTable + 'static) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn from_arc(table: Arc<dyn ReservationTable>) -> Self {
        Self { table }
    }

    /// 使用 DynamoDB 预留表
    #[cfg(feature = "dynamo")]
    pub async fn connect(config: &crate::config::RegistryConfig) -> Self {
        Self::new(crate::dynamo::DynamoReservationTable::connect(config).await)
    }

    /// 为持有者预留资源，时长为零表示永久
    ///
    /// 资源已被其他持有者占用时返回 `AlreadyReserved`。
    pub async fn reserve(&self, resource: &Resource, duration: Duration) -> DomainResult<()> {
        let row = ReservationRow::new(
            resource.key(),
            resource.owner.as_str(),
            ReservationRow::expires_at(Utc::now(), duration),
        );
        let expires_at = row.expires_at;
        self.table.put(row).await?;

        debug!(key = %resource.key(), owner = %resource.owner, expires_at, "reserved resource");
        Ok(())
    }

    /// 资源对该持有者是否可用
    ///
    /// - 无预留：可用；
    /// - 其他持有者：`AlreadyReserved`；
    /// - 本人持有但已过期：`ReservationExpired`。
    pub async fn is_available(&self, resource: &Resource) -> DomainResult<()> {
        let key = resource.key();
        let Some(row) = self.table.get(&key).await? else {
            return Ok(());
        };

        if row.owner != resource.owner {
            return Err(DomainError::AlreadyReserved { key });
        }
        if row.is_expired(Utc::now()) {
            return Err(DomainError::ReservationExpired { key });
        }
        Ok(())
    }

    /// 释放资源，幂等
    pub async fn release(&self, resource: &Resource) -> DomainResult<()> {
        self.table.delete(&resource.key()).await?;
        debug!(key = %resource.key(), "released resource");
        Ok(())
    }

    /// 命令声明了预留时先行预留
    pub(crate) async fn reserve_for<C: Reservable>(&self, command: &C) -> DomainResult<()> {
        match command.reservation() {
            Some((resource, duration)) => self.reserve(&resource, duration).await,
            None => Ok(()),
        }
    }

    /// 以预留检查装饰 `Dispatcher`
    pub fn wrap<D>(&self, dispatcher: D) -> ReservingDispatcher<D> {
        ReservingDispatcher::new(self.clone(), dispatcher)
    }

    /// 以预留检查装饰返回版本号的 `Applier`（例如 `Repository`）
    pub fn wrap_repository<A>(&self, applier: A) -> ReservingApplier<A> {
        ReservingApplier::new(self.clone(), applier)
    }
}
