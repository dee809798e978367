//! 命令分发（dispatcher）
//!
//! `Dispatcher` 是仓储命令执行的精简门面，只关心成功与否；
//! `Applier` 返回执行后的聚合版本。两者均可由闭包适配，便于装饰器组合。
//!
use crate::aggregate::CommandHandler;
use crate::command::Command;
use crate::error::DomainResult;
use crate::repository::Repository;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type DispatchFuture<'a, T> = Pin<Box<dyn Future<Output = DomainResult<T>> + Send + 'a>>;

#[async_trait]
pub trait Dispatcher<C: Command>: Send + Sync {
    async fn dispatch(&self, command: &C) -> DomainResult<()>;
}

#[async_trait]
pub trait Applier<C: Command>: Send + Sync {
    async fn apply(&self, command: &C) -> DomainResult<u64>;
}

#[async_trait]
impl<C, T> Dispatcher<C> for Arc<T>
where
    C: Command,
    T: Dispatcher<C> + ?Sized,
{
    async fn dispatch(&self, command: &C) -> DomainResult<()> {
        (**self).dispatch(command).await
    }
}

#[async_trait]
impl<C, T> Applier<C> for Arc<T>
where
    C: Command,
    T: Applier<C> + ?Sized,
{
    async fn apply(&self, command: &C) -> DomainResult<u64> {
        (**self).apply(command).await
    }
}

#[async_trait]
impl<A: CommandHandler> Dispatcher<A::Command> for Repository<A> {
    async fn dispatch(&self, command: &A::Command) -> DomainResult<()> {
        Repository::dispatch(self, command).await
    }
}

#[async_trait]
impl<A: CommandHandler> Applier<A::Command> for Repository<A> {
    async fn apply(&self, command: &A::Command) -> DomainResult<u64> {
        Repository::apply(self, command).await
    }
}

/// 闭包形式的 `Dispatcher`
pub struct DispatcherFn<F>(F);

impl<F> DispatcherFn<F> {
    pub fn new<C>(f: F) -> Self
    where
        C: Command,
        F: for<'a> Fn(&'a C) -> DispatchFuture<'a, ()> + Send + Sync,
    {
        Self(f)
    }
}

#[async_trait]
impl<C, F> Dispatcher<C> for DispatcherFn<F>
where
    C: Command,
    F: for<'a> Fn(&'a C) -> DispatchFuture<'a, ()> + Send + Sync,
{
    async fn dispatch(&self, command: &C) -> DomainResult<()> {
        (self.0)(command).await
    }
}

/// 闭包形式的 `Applier`
pub struct ApplierFn<F>(F);

impl<F> ApplierFn<F> {
    pub fn new<C>(f: F) -> Self
    where
        C: Command,
        F: for<'a> Fn(&'a C) -> DispatchFuture<'a, u64> + Send + Sync,
    {
        Self(f)
    }
}

#[async_trait]
impl<C, F> Applier<C> for ApplierFn<F>
where
    C: Command,
    F: for<'a> Fn(&'a C) -> DispatchFuture<'a, u64> + Send + Sync,
{
    async fn apply(&self, command: &C) -> DomainResult<u64> {
        (self.0)(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping {
        id: String,
    }

    impl Command for Ping {
        fn aggregate_id(&self) -> &str {
            &self.id
        }
    }

    #[tokio::test]
    async fn closure_adapters_forward_commands() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let dispatcher = DispatcherFn::new(move |cmd: &Ping| {
            let counter = counter.clone();
            Box::pin(async move {
                if cmd.id.is_empty() {
                    return Err(DomainError::InvalidCommand {
                        reason: "empty".into(),
                    });
                }
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        dispatcher.dispatch(&Ping { id: "p".into() }).await.unwrap();
        assert!(dispatcher.dispatch(&Ping { id: "".into() }).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let applier = ApplierFn::new(|cmd: &Ping| {
            Box::pin(async move { Ok(cmd.id.len() as u64) })
        });
        let shared: Arc<dyn Applier<Ping>> = Arc::new(applier);
        assert_eq!(shared.apply(&Ping { id: "abc".into() }).await.unwrap(), 3);
    }
}
