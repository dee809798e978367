//! 聚合仓储（Repository）
//!
//! 通过 `Serializer` + `Store` 将事件历史折叠为聚合状态，并编排命令执行：
//! 加载聚合 -> 执行命令得到事件 -> 序列化并原子保存 -> 同步通知观察者 -> 返回新版本。
//!
//! 仓储自身不持有任何协调锁，并发正确性完全交由存储层的条件写保证；
//! 冲突不会自动重试，由调用方重新加载后再执行。
//!
use crate::aggregate::{Aggregate, CommandHandler};
use crate::command::Command;
use crate::error::{DomainError, DomainResult};
use crate::event::Event;
use crate::serializer::Serializer;
use crate::store::Store;
use bon::Builder;
use std::marker::PhantomData;
use std::sync::Arc;

/// 事件观察者：保存成功后对每个事件同步调用一次
pub type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

#[derive(Builder)]
pub struct Repository<A: Aggregate> {
    store: Arc<dyn Store>,
    serializer: Arc<dyn Serializer<A::Event>>,
    #[builder(default)]
    observers: Vec<Observer<A::Event>>,
    #[builder(skip)]
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: Aggregate> Repository<A> {
    pub fn new(store: Arc<dyn Store>, serializer: Arc<dyn Serializer<A::Event>>) -> Self {
        Self {
            store,
            serializer,
            observers: Vec::new(),
            _aggregate: PhantomData,
        }
    }

    /// 追加观察者，按注册顺序调用
    pub fn observe(mut self, observer: impl Fn(&A::Event) + Send + Sync + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer<A::Event>> {
        &self.serializer
    }

    /// 构造一个空聚合
    pub fn new_aggregate(&self) -> A {
        A::default()
    }

    /// 序列化并保存事件；所有事件须属于同一聚合
    pub async fn save(&self, events: &[A::Event]) -> DomainResult<()> {
        let Some(first) = events.first() else {
            return Ok(());
        };

        let history = self.serializer.marshal_all(events)?;
        self.store
            .save(first.aggregate_id(), history.into_records())
            .await
    }

    /// 加载聚合，返回聚合与最后一个已应用事件的版本
    pub async fn load(&self, aggregate_id: &str) -> DomainResult<(A, u64)> {
        let history = self.store.load(aggregate_id, 0, 0).await?;
        if history.is_empty() {
            return Err(DomainError::AggregateNotFound {
                aggregate_id: aggregate_id.to_string(),
            });
        }

        let mut aggregate = self.new_aggregate();
        let mut version = 0;
        for record in &history {
            let event = self.serializer.unmarshal_event(record)?;
            aggregate
                .on(&event)
                .map_err(|err| DomainError::UnhandledEvent {
                    aggregate_id: aggregate_id.to_string(),
                    event_type: event.event_type().to_string(),
                    source: Box::new(err),
                })?;
            version = event.version();
        }

        tracing::debug!(aggregate_id, version, events = history.len(), "aggregate loaded");
        Ok((aggregate, version))
    }

    fn notify(&self, events: &[A::Event]) {
        for event in events {
            for observer in &self.observers {
                observer(event);
            }
        }
    }
}

impl<A: CommandHandler> Repository<A> {
    /// 执行命令并返回聚合最新版本
    pub async fn apply(&self, command: &A::Command) -> DomainResult<u64> {
        let aggregate_id = command.aggregate_id();
        if aggregate_id.is_empty() {
            return Err(DomainError::InvalidCommand {
                reason: "command provided with empty aggregate id".to_string(),
            });
        }

        let (aggregate, loaded_version) = match self.load(aggregate_id).await {
            Ok(loaded) => loaded,
            Err(err) if err.is_not_found() => (self.new_aggregate(), 0),
            Err(err) => return Err(err),
        };

        let events = aggregate
            .apply(command)
            .map_err(|err| DomainError::Rejected {
                source: Box::new(err),
            })?;

        let Some(last) = events.last() else {
            return Ok(loaded_version);
        };
        let version = last.version();

        self.save(&events).await?;
        self.notify(&events);

        tracing::debug!(aggregate_id, version, events = events.len(), "command applied");
        Ok(version)
    }

    /// 忽略版本的 `apply`
    pub async fn dispatch(&self, command: &A::Command) -> DomainResult<()> {
        self.apply(command).await.map(|_| ())
    }
}
