use proptest::prelude::*;

use crate::test::*;
use crate::{accounts, Caller, Currency, Entity, Error, Event, Grassroots, Money, ProjectStatus};

fn total_held(engine: &Grassroots) -> i128 {
    engine
        .storage()
        .accounts()
        .map(|a| a.balance.units() + a.rewards.units())
        .sum()
}

#[test]
fn test_walkthrough_funds_and_pays_creator() {
    let (mut engine, _) = setup();
    let (alice, bob, kiln) = (name("alice"), name("bob"), name("kiln"));

    fund(&mut engine, "alice", "100.0000");
    assert_eq!(balance(&engine, "alice"), tlos("99.9000"));

    create_project(&mut engine, "kiln", "alice", "150.0000");
    engine.open_funding(&alice, &kiln, &alice, 30).unwrap();
    assert_eq!(balance(&engine, "alice"), tlos("74.9000"));

    fund(&mut engine, "bob", "300.0000");
    let receipt = engine.donate(&bob, &kiln, &bob, tlos("200.0000"), "good luck").unwrap();

    let project = engine.project(&kiln).unwrap();
    assert_eq!(project.status, ProjectStatus::Funded);
    assert_eq!(project.received, tlos("200.0000"));
    assert_eq!(balance(&engine, "alice"), tlos("274.9000"));
    assert_eq!(balance(&engine, "bob"), tlos("99.9000"));
    assert_eq!(rewards(&engine, "bob"), tlos("0.0000"));
    let topics: Vec<_> = receipt.events.iter().map(|e| e.topic()).collect();
    assert_eq!(topics, vec!["donated", "project_funded"]);

    assert!(matches!(
        engine.cancel_project(&alice, &kiln, &alice),
        Err(Error::State { .. })
    ));
    assert!(matches!(
        engine.undonate(&bob, &kiln, &bob),
        Err(Error::State { .. })
    ));
    assert!(matches!(
        engine.donate(&bob, &kiln, &bob, tlos("1.0000"), ""),
        Err(Error::State { .. })
    ));
    check(&engine);
}

#[test]
fn test_repeat_donations_accumulate_in_one_row() {
    let (mut engine, clock) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "100.0000");
    let (bob, kiln) = (name("bob"), name("kiln"));

    engine.donate(&bob, &kiln, &bob, tlos("10.0000"), "first").unwrap();
    let first = engine.contribution(&kiln, &bob).unwrap().clone();
    clock.advance(120);
    let receipt = engine.donate(&bob, &kiln, &bob, tlos("15.5000"), "second").unwrap();

    let row = engine.contribution(&kiln, &bob).unwrap();
    assert_eq!(row.id, first.id);
    assert_eq!(row.total, tlos("25.5000"));
    assert_eq!(row.memo, "second");
    assert_eq!(row.created_at, START);
    assert_eq!(row.updated_at, START + 120);
    match receipt.events.as_slice() {
        [Event::Donated { amount, total, .. }] => {
            assert_eq!(*amount, tlos("15.5000"));
            assert_eq!(*total, tlos("25.5000"));
        }
        other => panic!("unexpected events {other:?}"),
    }

    let project = engine.project(&kiln).unwrap();
    assert_eq!(project.donor_count, 1);
    assert_eq!(project.received, tlos("25.5000"));
    assert_eq!(balance(&engine, "bob"), tlos("74.4000"));
    assert_eq!(rewards(&engine, "bob"), tlos("25.5000"));
    check(&engine);
}

#[test]
fn test_donate_outside_window_fails() {
    let (mut engine, clock) = setup();
    create_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "100.0000");
    let (alice, bob, kiln) = (name("alice"), name("bob"), name("kiln"));

    assert!(matches!(
        engine.donate(&bob, &kiln, &bob, tlos("1.0000"), ""),
        Err(Error::State { .. })
    ));

    fund(&mut engine, "alice", "100.0000");
    engine.open_funding(&alice, &kiln, &alice, 1).unwrap();
    clock.advance(DAY);
    assert!(matches!(
        engine.donate(&bob, &kiln, &bob, tlos("1.0000"), ""),
        Err(Error::State { .. })
    ));
    assert_eq!(balance(&engine, "bob"), tlos("99.9000"));
}

#[test]
fn test_donate_rejects_bad_amounts() {
    let (mut engine, _) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "10.0000");
    let (bob, kiln) = (name("bob"), name("kiln"));

    assert!(matches!(
        engine.donate(&bob, &kiln, &bob, tlos("0.0000"), ""),
        Err(Error::Validation(_))
    ));
    let eos: Money = "1.0000 EOS".parse().unwrap();
    assert!(matches!(
        engine.donate(&bob, &kiln, &bob, eos, ""),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        engine.donate(&bob, &kiln, &bob, tlos("10.0000"), ""),
        Err(Error::InsufficientFunds { .. })
    ));

    assert!(engine.contribution(&kiln, &bob).is_none());
    assert_eq!(balance(&engine, "bob"), tlos("9.9000"));
    assert_eq!(engine.project(&kiln).unwrap().received, tlos("0.0000"));
}

#[test]
fn test_donate_needs_project_account_and_auth() {
    let (mut engine, _) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "10.0000");
    let (bob, carol, kiln) = (name("bob"), name("carol"), name("kiln"));

    assert!(matches!(
        engine.donate(&bob, &name("nope"), &bob, tlos("1.0000"), ""),
        Err(Error::NotFound { kind: Entity::Project, .. })
    ));
    assert!(matches!(
        engine.donate(&carol, &kiln, &carol, tlos("1.0000"), ""),
        Err(Error::NotFound { kind: Entity::Account, .. })
    ));
    assert!(matches!(
        engine.donate(&carol, &kiln, &bob, tlos("1.0000"), ""),
        Err(Error::Unauthorized { .. })
    ));
}

#[test]
fn test_undonate_returns_everything() {
    let (mut engine, _) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "100.0000");
    fund(&mut engine, "carol", "100.0000");
    let (bob, carol, kiln) = (name("bob"), name("carol"), name("kiln"));
    engine.donate(&bob, &kiln, &bob, tlos("10.0000"), "").unwrap();
    engine.donate(&bob, &kiln, &bob, tlos("5.0000"), "").unwrap();
    engine.donate(&carol, &kiln, &carol, tlos("7.0000"), "").unwrap();

    let receipt = engine.undonate(&bob, &kiln, &bob).unwrap();

    assert_eq!(balance(&engine, "bob"), tlos("99.9000"));
    assert_eq!(rewards(&engine, "bob"), tlos("0.0000"));
    assert!(engine.contribution(&kiln, &bob).is_none());
    let project = engine.project(&kiln).unwrap();
    assert_eq!(project.received, tlos("7.0000"));
    assert_eq!(project.donor_count, 1);
    assert!(matches!(
        receipt.events.as_slice(),
        [Event::Undonated { amount, .. }] if *amount == tlos("15.0000")
    ));

    assert!(matches!(
        engine.undonate(&bob, &kiln, &bob),
        Err(Error::NotFound { kind: Entity::Contribution, .. })
    ));
    check(&engine);
}

#[test]
fn test_undonate_allowed_until_closed() {
    let (mut engine, clock) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "100.0000");
    let (bob, kiln) = (name("bob"), name("kiln"));
    engine.donate(&bob, &kiln, &bob, tlos("10.0000"), "").unwrap();

    clock.advance(31 * DAY);
    engine.undonate(&bob, &kiln, &bob).unwrap();
    assert_eq!(balance(&engine, "bob"), tlos("99.9000"));
}

#[test]
fn test_undonate_by_someone_else_is_unauthorized() {
    let (mut engine, _) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "100.0000");
    let (bob, kiln) = (name("bob"), name("kiln"));
    engine.donate(&bob, &kiln, &bob, tlos("10.0000"), "").unwrap();

    assert!(matches!(
        engine.undonate(&name("alice"), &kiln, &bob),
        Err(Error::Unauthorized { .. })
    ));
    assert_eq!(engine.contribution(&kiln, &bob).unwrap().total, tlos("10.0000"));
}

#[test]
fn test_rewards_track_open_contributions_across_projects() {
    let (mut engine, _) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    live_project(&mut engine, "oven", "carol", "20.0000");
    fund(&mut engine, "bob", "100.0000");
    let (bob, kiln, oven) = (name("bob"), name("kiln"), name("oven"));

    engine.donate(&bob, &kiln, &bob, tlos("30.0000"), "").unwrap();
    engine.donate(&bob, &oven, &bob, tlos("10.0000"), "").unwrap();
    assert_eq!(rewards(&engine, "bob"), tlos("40.0000"));
    assert_eq!(engine.contributions_by_contributor(&bob).len(), 2);

    engine.donate(&bob, &oven, &bob, tlos("10.0000"), "").unwrap();
    assert_eq!(
        engine.project(&oven).unwrap().status,
        ProjectStatus::Funded
    );
    assert_eq!(rewards(&engine, "bob"), tlos("30.0000"));
    assert_eq!(balance(&engine, "bob"), tlos("49.9000"));
    check(&engine);
}

#[test]
fn test_failed_operation_changes_nothing() {
    let (mut engine, _) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "100.0000");
    let (bob, kiln) = (name("bob"), name("kiln"));
    engine.donate(&bob, &kiln, &bob, tlos("10.0000"), "").unwrap();

    let before = engine.storage().clone();
    let _ = engine.donate(&bob, &kiln, &bob, tlos("1000.0000"), "");
    let _ = engine.undonate(&name("carol"), &kiln, &name("carol"));
    let after = engine.storage();

    assert_eq!(
        before.accounts().collect::<Vec<_>>(),
        after.accounts().collect::<Vec<_>>()
    );
    assert_eq!(
        before.projects().collect::<Vec<_>>(),
        after.projects().collect::<Vec<_>>()
    );
    assert_eq!(
        before.contributions_for_project(&kiln),
        after.contributions_for_project(&kiln)
    );
}

#[derive(Clone, Debug)]
enum Op {
    Donate(usize, i128),
    Undonate(usize),
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..3usize, 1..60_000i128).prop_map(|(who, units)| Op::Donate(who, units)),
        2 => (0..3usize).prop_map(Op::Undonate),
        1 => (0..10 * DAY).prop_map(Op::Advance),
    ]
}

proptest! {
    #[test]
    fn prop_ledger_invariants_hold(ops in prop::collection::vec(op(), 1..40)) {
        let (mut engine, clock) = setup();
        live_project(&mut engine, "kiln", "alice", "50.0000");
        let donors = ["bob", "carol", "dave"];
        for donor in donors {
            fund(&mut engine, donor, "20.0000");
        }
        let kiln = name("kiln");
        let held = total_held(&engine);

        for op in ops {
            match op {
                Op::Donate(i, units) => {
                    let who = name(donors[i]);
                    let amount = Money::new(units, Currency::TLOS);
                    let _ = engine.donate(&who, &kiln, &who, amount, "");
                }
                Op::Undonate(i) => {
                    let who = name(donors[i]);
                    let _ = engine.undonate(&who, &kiln, &who);
                }
                Op::Advance(seconds) => clock.advance(seconds),
            }

            check(&engine);
            prop_assert_eq!(total_held(&engine), held);

            let project = engine.project(&kiln).unwrap();
            if project.status == ProjectStatus::Funded {
                prop_assert!(project.received.covers(&project.requested).unwrap());
            }
            for donor in donors {
                let row = engine.contribution(&kiln, &name(donor));
                let open = project.status == ProjectStatus::Funding;
                let committed = row.filter(|_| open).map(|c| c.total.units()).unwrap_or(0);
                prop_assert_eq!(rewards(&engine, donor).units(), committed);
            }
        }
    }

    #[test]
    fn prop_credit_then_debit_restores_balance(units in 1i128..1_000_000_000_000) {
        let (mut engine, _) = setup();
        fund(&mut engine, "alice", "100.0000");
        let alice = name("alice");
        let before = balance(&engine, "alice");
        let amount = Money::new(units, Currency::TLOS);

        let (after, _) = engine
            .execute(Caller::Platform, "custom", |ctx| {
                accounts::credit(&mut ctx.txn, &alice, &amount)?;
                accounts::debit(&mut ctx.txn, &alice, &amount)
            })
            .unwrap();

        prop_assert_eq!(after.balance, before);
        prop_assert_eq!(balance(&engine, "alice"), before);
    }

    #[test]
    fn prop_debit_rejects_non_positive_and_overdrawn_amounts(
        non_positive in -1_000_000i128..=0,
        excess in 1i128..1_000_000_000,
    ) {
        let (mut engine, _) = setup();
        fund(&mut engine, "alice", "100.0000");
        let alice = name("alice");
        let before = balance(&engine, "alice");

        let err = engine
            .execute(Caller::Platform, "custom", |ctx| {
                accounts::debit(&mut ctx.txn, &alice, &Money::new(non_positive, Currency::TLOS))
            })
            .unwrap_err();
        prop_assert!(matches!(err, Error::Validation(_)));

        let overdraw = Money::new(before.units() + excess, Currency::TLOS);
        let err = engine
            .execute(Caller::Platform, "custom", |ctx| {
                accounts::debit(&mut ctx.txn, &alice, &overdraw)
            })
            .unwrap_err();
        prop_assert!(
            matches!(err, Error::InsufficientFunds { available, .. } if available == before),
            "unexpected error {:?}",
            err
        );
        prop_assert_eq!(balance(&engine, "alice"), before);
    }
}
