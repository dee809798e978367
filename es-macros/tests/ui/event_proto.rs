use es_domain::chrono::{DateTime, Utc};
use es_domain::event::Event;
use es_domain::serializer::ProtoEvent;
use es_macros::event;

#[derive(Clone, PartialEq, prost::Message)]
struct Deposited {
    #[prost(string, tag = "1")]
    account: String,
    #[prost(uint64, tag = "2")]
    version: u64,
}

impl Event for Deposited {
    fn aggregate_id(&self) -> &str {
        &self.account
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }
}

#[event(proto)]
enum LedgerEvent {
    Deposited(Deposited),
}

fn main() {
    let e: LedgerEvent = Deposited::default().into();
    assert!(e.encode_message().is_some());
}
