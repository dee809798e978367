use es_domain::command::Command;
use es_macros::command;

#[command]
struct OpenAccount {
    owner: String,
}

#[command(id = account)]
struct Deposit {
    account: String,
    amount: i64,
}

fn main() {
    let open = OpenAccount {
        id: "acc-1".into(),
        owner: "alice".into(),
    };
    assert_eq!(open.aggregate_id(), "acc-1");

    let deposit = Deposit {
        account: "acc-2".into(),
        amount: 10,
    };
    assert_eq!(deposit.aggregate_id(), "acc-2");
}
