use es_macros::event;

#[event]
struct Opened {}

#[event]
struct Closed {
    reason: String,
}

#[event]
enum AccountEvent {
    Opened(Opened),
    Closed(Closed),
}

fn main() {
    let e: AccountEvent = Closed::default().into();
    let _ = serde_json::to_string(&e).unwrap();
}
