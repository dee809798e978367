use es_domain::aggregate::{Aggregate, CommandHandler};
use es_domain::chrono::Utc;
use es_domain::command::Command;
use es_domain::dispatcher::{Applier, Dispatcher};
use es_domain::error::{DomainError, ErrorCode, has_code};
use es_domain::event::Event;
use es_domain::repository::{Observer, Repository};
use es_domain::scenario::Scenario;
use es_domain::serializer::JsonSerializer;
use es_domain::store::{MemoryStore, StreamReader};
use es_macros::{command, event};
use std::sync::{Arc, Mutex};

#[event]
struct OrderPlaced {
    customer: String,
}

#[event]
struct ItemAdded {
    sku: String,
    qty: u32,
}

#[event(name = "order.shipped")]
struct OrderShipped {}

#[event]
struct OrderAudited {
    auditor: String,
}

#[event]
enum OrderEvent {
    OrderPlaced(OrderPlaced),
    ItemAdded(ItemAdded),
    OrderShipped(OrderShipped),
    OrderAudited(OrderAudited),
}

#[command]
struct PlaceOrder {
    customer: String,
}

#[command]
struct AddItem {
    sku: String,
    qty: u32,
}

#[command]
struct ShipOrder {}

#[command]
struct Touch {}

#[derive(Debug)]
enum OrderCommand {
    Place(PlaceOrder),
    Add(AddItem),
    Ship(ShipOrder),
    Touch(Touch),
}

impl Command for OrderCommand {
    fn aggregate_id(&self) -> &str {
        match self {
            OrderCommand::Place(c) => c.aggregate_id(),
            OrderCommand::Add(c) => c.aggregate_id(),
            OrderCommand::Ship(c) => c.aggregate_id(),
            OrderCommand::Touch(c) => c.aggregate_id(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum OrderError {
    #[error("order does not handle {0}")]
    Unhandled(&'static str),
    #[error("order already placed")]
    AlreadyPlaced,
    #[error("order not placed")]
    NotPlaced,
    #[error("order already shipped")]
    AlreadyShipped,
}

#[derive(Debug, Default)]
struct Order {
    placed: bool,
    shipped: bool,
    items: u32,
    version: u64,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn on(&mut self, event: &OrderEvent) -> Result<(), OrderError> {
        match event {
            OrderEvent::OrderPlaced(_) => self.placed = true,
            OrderEvent::ItemAdded(e) => self.items += e.qty,
            OrderEvent::OrderShipped(_) => self.shipped = true,
            OrderEvent::OrderAudited(_) => return Err(OrderError::Unhandled("OrderAudited")),
        }
        self.version = event.version();
        Ok(())
    }
}

impl CommandHandler for Order {
    type Command = OrderCommand;

    fn apply(&self, command: &OrderCommand) -> Result<Vec<OrderEvent>, OrderError> {
        let version = self.version + 1;
        let at = Utc::now();
        match command {
            OrderCommand::Place(c) => {
                if self.placed {
                    return Err(OrderError::AlreadyPlaced);
                }
                Ok(vec![
                    OrderPlaced {
                        id: c.id.clone(),
                        version,
                        at,
                        customer: c.customer.clone(),
                    }
                    .into(),
                ])
            }
            OrderCommand::Add(c) => {
                if !self.placed {
                    return Err(OrderError::NotPlaced);
                }
                Ok(vec![
                    ItemAdded {
                        id: c.id.clone(),
                        version,
                        at,
                        sku: c.sku.clone(),
                        qty: c.qty,
                    }
                    .into(),
                ])
            }
            OrderCommand::Ship(c) => {
                if !self.placed {
                    return Err(OrderError::NotPlaced);
                }
                if self.shipped {
                    return Err(OrderError::AlreadyShipped);
                }
                Ok(vec![OrderShipped { id: c.id.clone(), version, at }.into()])
            }
            OrderCommand::Touch(_) => Ok(vec![]),
        }
    }
}

fn repository(store: Arc<MemoryStore>) -> Repository<Order> {
    let serializer = JsonSerializer::<OrderEvent>::new();
    serializer
        .bind::<OrderPlaced>()
        .bind::<ItemAdded>()
        .bind::<OrderShipped>()
        .bind::<OrderAudited>();
    Repository::new(store, Arc::new(serializer))
}

fn order_id() -> String {
    format!("order-{}", ulid::Ulid::new())
}

fn place(id: &str) -> OrderCommand {
    OrderCommand::Place(PlaceOrder {
        id: id.into(),
        customer: "alice".into(),
    })
}

fn add(id: &str, qty: u32) -> OrderCommand {
    OrderCommand::Add(AddItem {
        id: id.into(),
        sku: "apple".into(),
        qty,
    })
}

#[tokio::test]
async fn apply_persists_events_and_load_rebuilds_state() -> anyhow::Result<()> {
    let repo = repository(Arc::new(MemoryStore::new()));
    let id = order_id();

    assert_eq!(repo.apply(&place(&id)).await?, 1);
    assert_eq!(repo.apply(&add(&id, 2)).await?, 2);
    assert_eq!(repo.apply(&add(&id, 3)).await?, 3);

    let (order, version) = repo.load(&id).await?;
    assert_eq!(version, 3);
    assert!(order.placed);
    assert_eq!(order.items, 5);
    Ok(())
}

#[tokio::test]
async fn load_of_unknown_aggregate_is_not_found() {
    let repo = repository(Arc::new(MemoryStore::new()));
    let err = repo.load("nobody").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AggregateNotFound);
    assert!(es_domain::error::is_not_found(&err));
}

#[tokio::test]
async fn command_without_events_reports_current_version() -> anyhow::Result<()> {
    let repo = repository(Arc::new(MemoryStore::new()));
    let id = order_id();

    let touch = |id: &str| OrderCommand::Touch(Touch { id: id.into() });
    assert_eq!(repo.apply(&touch(&id)).await?, 0);
    assert!(repo.load(&id).await.unwrap_err().is_not_found());

    repo.apply(&place(&id)).await?;
    repo.apply(&add(&id, 1)).await?;
    assert_eq!(repo.apply(&touch(&id)).await?, 2);
    Ok(())
}

#[tokio::test]
async fn builder_wires_observers() -> anyhow::Result<()> {
    let serializer = JsonSerializer::<OrderEvent>::new();
    serializer.bind::<OrderPlaced>().bind::<ItemAdded>();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer: Observer<OrderEvent> =
        Arc::new(move |e: &OrderEvent| sink.lock().unwrap().push(e.event_type().to_string()));

    let repo = Repository::<Order>::builder()
        .store(Arc::new(MemoryStore::new()))
        .serializer(Arc::new(serializer))
        .observers(vec![observer])
        .build();

    let id = order_id();
    repo.apply(&place(&id)).await?;
    assert_eq!(repo.apply(&add(&id, 3)).await?, 2);
    assert_eq!(*seen.lock().unwrap(), vec!["OrderPlaced", "ItemAdded"]);

    let (order, _) = repo.load(&id).await?;
    assert_eq!(order.items, 3);
    Ok(())
}

#[tokio::test]
async fn observers_run_in_registration_order_per_event() -> anyhow::Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let first = seen.clone();
    let second = seen.clone();
    let repo = repository(Arc::new(MemoryStore::new()))
        .observe(move |e: &OrderEvent| first.lock().unwrap().push(format!("a{}", e.version())))
        .observe(move |e: &OrderEvent| second.lock().unwrap().push(format!("b{}", e.version())));

    let id = order_id();
    repo.apply(&place(&id)).await?;
    repo.apply(&add(&id, 1)).await?;

    assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1", "a2", "b2"]);

    // 被拒绝的命令不会通知观察者
    assert!(repo.apply(&place(&id)).await.is_err());
    assert_eq!(seen.lock().unwrap().len(), 4);
    Ok(())
}

#[tokio::test]
async fn empty_aggregate_id_is_invalid() -> anyhow::Result<()> {
    let repo = repository(Arc::new(MemoryStore::new()));
    let err = repo.apply(&place("")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidCommand);

    // 仅要求非空，空白字符也是合法 ID
    assert_eq!(repo.apply(&place("  ")).await?, 1);
    Ok(())
}

#[tokio::test]
async fn business_rule_violation_is_rejected_with_cause() -> anyhow::Result<()> {
    let repo = repository(Arc::new(MemoryStore::new()));
    let id = order_id();

    let err = repo.apply(&add(&id, 1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Rejected);
    let DomainError::Rejected { source } = &err else {
        panic!("expected rejection, got {err:?}");
    };
    assert!(matches!(
        source.downcast_ref::<OrderError>(),
        Some(OrderError::NotPlaced)
    ));
    Ok(())
}

#[tokio::test]
async fn unhandled_event_names_its_type() -> anyhow::Result<()> {
    let repo = repository(Arc::new(MemoryStore::new()));
    let id = order_id();
    repo.apply(&place(&id)).await?;

    let audited: OrderEvent = OrderAudited {
        id: id.clone(),
        version: 2,
        at: Utc::now(),
        auditor: "bob".into(),
    }
    .into();
    repo.save(&[audited]).await?;

    let err = repo.load(&id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnhandledEvent);
    assert!(err.to_string().contains("OrderAudited"), "{err}");
    Ok(())
}

#[tokio::test]
async fn stale_writer_gets_a_conflict() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(store.clone());
    let id = order_id();
    repo.apply(&place(&id)).await?;

    let (stale, _) = repo.load(&id).await?;
    repo.apply(&add(&id, 1)).await?;

    // 基于旧状态产生的事件与已提交的版本 2 内容不同
    let events = stale.apply(&add(&id, 7))?;
    let err = repo.save(&events).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::OptimisticConcurrencyConflict);
    assert!(has_code(&err, ErrorCode::OptimisticConcurrencyConflict));

    let (order, version) = repo.load(&id).await?;
    assert_eq!((order.items, version), (1, 2));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_commands_never_lose_an_update() -> anyhow::Result<()> {
    let repo = Arc::new(repository(Arc::new(MemoryStore::new())));
    let id = order_id();
    repo.apply(&place(&id)).await?;

    let tasks: Vec<_> = (1..=8u32)
        .map(|qty| {
            let repo = repo.clone();
            let command = add(&id, qty);
            tokio::spawn(async move { (qty, repo.apply(&command).await) })
        })
        .collect();

    let mut committed = Vec::new();
    for task in tasks {
        let (qty, result) = task.await?;
        match result {
            Ok(_) => committed.push(qty),
            Err(err) if err.is_conflict() => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert!(!committed.is_empty());

    let (order, version) = repo.load(&id).await?;
    assert_eq!(order.items, committed.iter().sum::<u32>());
    assert_eq!(version, 1 + committed.len() as u64);
    Ok(())
}

#[tokio::test]
async fn repository_serves_as_dispatcher_and_applier() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let repo = Arc::new(repository(store.clone()));
    let id = order_id();

    let dispatcher: Arc<dyn Dispatcher<OrderCommand>> = repo.clone();
    dispatcher.dispatch(&place(&id)).await?;

    let applier: Arc<dyn Applier<OrderCommand>> = repo.clone();
    assert_eq!(applier.apply(&add(&id, 4)).await?, 2);

    let stream = store.read(1, 0).await?;
    let versions: Vec<u64> = stream
        .iter()
        .filter(|r| r.aggregate_id == id)
        .map(|r| r.record.version)
        .collect();
    assert_eq!(versions, vec![1, 2]);
    Ok(())
}

#[test]
fn scenario_checks_handler_outcomes() {
    let placed: OrderEvent = OrderPlaced {
        id: "o-1".into(),
        version: 1,
        customer: "alice".into(),
        ..Default::default()
    }
    .into();
    let shipped: OrderEvent = OrderShipped {
        id: "o-1".into(),
        version: 2,
        ..Default::default()
    }
    .into();

    Scenario::<Order>::new()
        .given([placed.clone()])
        .when(OrderCommand::Touch(Touch { id: "o-1".into() }))
        .then([]);

    // 发生时间由处理函数生成，比较时不参与
    Scenario::<Order>::new()
        .given([placed.clone()])
        .when(OrderCommand::Ship(ShipOrder { id: "o-1".into() }))
        .then([shipped.clone()]);

    let added: OrderEvent = ItemAdded {
        id: "o-1".into(),
        version: 2,
        ..Default::default()
    }
    .into();
    Scenario::<Order>::new()
        .given([placed.clone()])
        .when(add("o-1", 2))
        .then([added]);

    Scenario::<Order>::new()
        .given([placed.clone(), shipped])
        .when(OrderCommand::Ship(ShipOrder { id: "o-1".into() }))
        .then_error(ErrorCode::Rejected);

    let events = Scenario::<Order>::new()
        .given([placed])
        .when(add("o-1", 2))
        .run()
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].version(), 2);
    assert!(matches!(&events[0], OrderEvent::ItemAdded(e) if e.qty == 2));
}
