use horizon_domain::message::Action;
use horizon_macros::action;

#[action]
enum AccountCommand {
    Open { owner: String },
    #[action(action_type = "account.deposit")]
    Deposit { amount: i64 },
    Freeze(String),
    Close,
}

#[action(prefix = "bank")]
enum AccountEvent {
    Opened { owner: String },
    Closed,
}

fn main() {
    assert_eq!(
        AccountCommand::TYPES,
        &[
            "AccountCommand.Open",
            "account.deposit",
            "AccountCommand.Freeze",
            "AccountCommand.Close"
        ]
    );
    assert_eq!(
        AccountCommand::Deposit { amount: 1 }.action_type(),
        "account.deposit"
    );
    assert_eq!(AccountEvent::Closed.action_type(), "bank.AccountEvent.Closed");

    // 派生 Clone/PartialEq/Serialize/Deserialize
    let open = AccountCommand::Open {
        owner: "ada".to_string(),
    };
    let json = serde_json::to_value(&open).unwrap();
    let back: AccountCommand = serde_json::from_value(json).unwrap();
    assert_eq!(back, open.clone());
    let _ = format!("{:?}", AccountCommand::Freeze("x".to_string()));
}
