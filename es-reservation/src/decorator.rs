use crate::registry::Registry;
use crate::resource::Reservable;
use async_trait::async_trait;
use es_domain::dispatcher::{Applier, Dispatcher};
use es_domain::error::DomainResult;

/// 先预留、再分发的 `Dispatcher` 装饰器
///
/// 预留冲突时直接返回 `AlreadyReserved`，下游不会被调用。
pub struct ReservingDispatcher<D> {
    registry: Registry,
    inner: D,
}

impl<D> ReservingDispatcher<D> {
    pub fn new(registry: Registry, inner: D) -> Self {
        Self { registry, inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<C, D> Dispatcher<C> for ReservingDispatcher<D>
where
    C: Reservable,
    D: Dispatcher<C>,
{
    async fn dispatch(&self, command: &C) -> DomainResult<()> {
        self.registry.reserve_for(command).await?;
        self.inner.dispatch(command).await
    }
}

/// 先预留、再执行的 `Applier` 装饰器
pub struct ReservingApplier<A> {
    registry: Registry,
    inner: A,
}

impl<A> ReservingApplier<A> {
    pub fn new(registry: Registry, inner: A) -> Self {
        Self { registry, inner }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<C, A> Applier<C> for ReservingApplier<A>
where
    C: Reservable,
    A: Applier<C>,
{
    async fn apply(&self, command: &C) -> DomainResult<u64> {
        self.registry.reserve_for(command).await?;
        self.inner.apply(command).await
    }
}
