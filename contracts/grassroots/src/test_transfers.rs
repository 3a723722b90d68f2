use crate::test::*;
use crate::{
    transfers, Caller, Config, Deposit, DepositOutcome, Entity, Error, Event, UnmatchedDeposits,
};

fn incoming(from: &str, to: &str, amount: &str, memo: &str) -> Deposit {
    Deposit {
        from: name(from),
        to: name(to),
        quantity: tlos(amount),
        memo: memo.to_string(),
    }
}

#[test]
fn test_deposit_credits_existing_account() {
    let (mut engine, _) = setup();
    fund(&mut engine, "alice", "10.0000");

    let (outcome, receipt) = engine
        .on_transfer(&incoming("alice", "grassroots", "5.0000", "top up"))
        .unwrap();

    assert_eq!(outcome, DepositOutcome::Credited);
    assert_eq!(balance(&engine, "alice"), tlos("14.9000"));
    assert!(matches!(
        receipt.events.as_slice(),
        [Event::Deposited { quantity, .. }] if *quantity == tlos("5.0000")
    ));
}

#[test]
fn test_registration_memo_is_trimmed() {
    let (mut engine, _) = setup();
    let (outcome, receipt) = engine
        .on_transfer(&incoming("alice", "grassroots", "1.0000", "  register account "))
        .unwrap();
    assert_eq!(outcome, DepositOutcome::Registered);
    assert_eq!(balance(&engine, "alice"), tlos("0.9000"));
    assert!(matches!(
        receipt.events.as_slice(),
        [Event::AccountRegistered { opening_balance, .. }] if *opening_balance == tlos("0.9000")
    ));
}

#[test]
fn test_unrelated_notifications_are_ignored() {
    let (mut engine, _) = setup();
    fund(&mut engine, "alice", "10.0000");

    let (outcome, receipt) = engine
        .on_transfer(&incoming("grassroots", "alice", "3.0000", "payout"))
        .unwrap();
    assert_eq!(outcome, DepositOutcome::Ignored);
    assert!(receipt.events.is_empty());

    let (outcome, _) = engine
        .on_transfer(&incoming("alice", "bob", "3.0000", ""))
        .unwrap();
    assert_eq!(outcome, DepositOutcome::Ignored);
    assert_eq!(balance(&engine, "alice"), tlos("9.9000"));
}

#[test]
fn test_only_platform_reports_deposits() {
    let (mut engine, _) = setup();
    let deposit = incoming("mallory", "grassroots", "1000.0000", "register account");
    let err = engine
        .execute(Caller::User(name("mallory")), "transfer", |ctx| {
            transfers::on_transfer(ctx, &deposit)
        })
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }));
    assert!(engine.account(&name("mallory")).is_none());
}

#[test]
fn test_foreign_currency_deposit_fails() {
    let (mut engine, _) = setup();
    let deposit = Deposit {
        from: name("alice"),
        to: platform(),
        quantity: "1.0000 EOS".parse().unwrap(),
        memo: "register account".into(),
    };
    assert!(matches!(
        engine.on_transfer(&deposit),
        Err(Error::Validation(_))
    ));
}

#[test]
fn test_unknown_depositor_is_escrowed_until_registration() {
    let (mut engine, _) = setup();

    let (outcome, _) = engine
        .on_transfer(&incoming("alice", "grassroots", "4.0000", "hi"))
        .unwrap();
    assert_eq!(outcome, DepositOutcome::Escrowed);
    engine
        .on_transfer(&incoming("alice", "grassroots", "1.5000", ""))
        .unwrap();
    assert_eq!(engine.escrowed(&name("alice")), Some(&tlos("5.5000")));
    assert!(engine.account(&name("alice")).is_none());

    let alice = name("alice");
    let receipt = engine.register_account(&alice, &alice).unwrap();
    assert_eq!(balance(&engine, "alice"), tlos("5.5000"));
    assert!(engine.escrowed(&alice).is_none());
    assert!(matches!(
        receipt.events.as_slice(),
        [Event::AccountRegistered { opening_balance, .. }] if *opening_balance == tlos("5.5000")
    ));
}

#[test]
fn test_registration_deposit_claims_escrow() {
    let (mut engine, _) = setup();
    engine
        .on_transfer(&incoming("alice", "grassroots", "4.0000", "oops"))
        .unwrap();
    fund(&mut engine, "alice", "1.0000");

    assert_eq!(balance(&engine, "alice"), tlos("4.9000"));
    assert!(engine.escrowed(&name("alice")).is_none());
}

#[test]
fn test_reject_policy_bounces_unknown_depositors() {
    let config = Config {
        unmatched_deposits: UnmatchedDeposits::Reject,
        ..Config::default()
    };
    let (mut engine, _) = setup_with(config);

    assert!(matches!(
        engine.on_transfer(&incoming("alice", "grassroots", "4.0000", "hi")),
        Err(Error::NotFound { kind: Entity::Account, .. })
    ));
    assert!(engine.escrowed(&name("alice")).is_none());

    fund(&mut engine, "alice", "1.0000");
    assert_eq!(balance(&engine, "alice"), tlos("0.9000"));
}
