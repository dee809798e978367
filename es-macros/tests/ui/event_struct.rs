use es_domain::event::Event;
use es_macros::event;

#[event]
struct AccountOpened {
    owner: String,
}

#[event(name = "account.renamed")]
#[derive(Eq)]
struct AccountRenamed {
    id: String,
    version: u64,
    to: String,
}

fn main() {
    let opened = AccountOpened {
        id: "acc-1".into(),
        version: 1,
        owner: "alice".into(),
        ..Default::default()
    };
    assert_eq!(opened.event_type(), "AccountOpened");

    let renamed = AccountRenamed::default();
    assert_eq!(renamed.event_type(), "account.renamed");
}
