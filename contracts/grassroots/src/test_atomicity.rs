use std::sync::Arc;

use crate::test::*;
use crate::{accounts, Caller, Config, Error, Event, Grassroots};

#[test]
fn test_aborted_operation_discards_every_write() {
    let (mut engine, _) = setup();
    fund(&mut engine, "alice", "10.0000");
    let alice = name("alice");

    let err = engine
        .execute(Caller::User(alice.clone()), "custom", |ctx| {
            accounts::withdraw(ctx, &alice, &tlos("5.0000"))?;
            ctx.txn.emit(Event::AccountRemoved {
                account: alice.clone(),
            });
            accounts::withdraw(ctx, &alice, &tlos("5.0000"))
        })
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientFunds { .. }));
    assert_eq!(balance(&engine, "alice"), tlos("9.9000"));
    assert!(engine.pending_transfers().is_empty());
}

#[test]
fn test_aborted_operation_does_not_consume_ids() {
    let (mut engine, _) = setup();
    live_project(&mut engine, "kiln", "alice", "500.0000");
    fund(&mut engine, "bob", "100.0000");
    fund(&mut engine, "carol", "100.0000");
    let (bob, carol, kiln) = (name("bob"), name("carol"), name("kiln"));

    let _ = engine.execute(Caller::User(bob.clone()), "custom", |ctx| {
        crate::contributions::donate(ctx, &kiln, &bob, &tlos("1.0000"), "")?;
        Err::<(), _>(Error::Validation("abort".into()))
    });
    assert!(engine.contribution(&kiln, &bob).is_none());

    engine.donate(&carol, &kiln, &carol, tlos("1.0000"), "").unwrap();
    assert_eq!(engine.contribution(&kiln, &carol).unwrap().id, 0);
}

#[test]
fn test_clock_is_read_once_per_operation() {
    let (mut engine, clock) = setup();
    let ((first, second), _) = engine
        .execute(Caller::Platform, "custom", |ctx| {
            let first = ctx.env.now();
            clock.advance(DAY);
            Ok((first, ctx.env.now()))
        })
        .unwrap();
    assert_eq!(first, START);
    assert_eq!(second, START);
}

#[test]
fn test_receipt_carries_only_committed_effects() {
    let (mut engine, _) = setup();
    fund(&mut engine, "alice", "10.0000");
    let alice = name("alice");

    let receipt = engine.withdraw(&alice, &alice, tlos("1.0000")).unwrap();
    assert_eq!(receipt.events.len(), 1);
    assert_eq!(receipt.transfers.len(), 1);
    assert_eq!(receipt.transfers[0].created_at, START);

    let second = engine.withdraw(&alice, &alice, tlos("1.0000")).unwrap();
    assert_eq!(second.transfers[0].id, receipt.transfers[0].id + 1);
    assert_eq!(engine.pending_transfers().len(), 2);
}

#[test]
fn test_rollback_undoes_a_committed_operation() {
    let (mut engine, _) = setup();
    fund(&mut engine, "alice", "10.0000");
    let alice = name("alice");

    let checkpoint = engine.checkpoint();
    let undone = engine.withdraw(&alice, &alice, tlos("4.0000")).unwrap();
    assert_eq!(engine.pending_transfers().len(), 1);

    engine.rollback(checkpoint);
    assert_eq!(balance(&engine, "alice"), tlos("9.9000"));
    assert!(engine.pending_transfers().is_empty());

    let receipt = engine.withdraw(&alice, &alice, tlos("4.0000")).unwrap();
    assert_eq!(receipt.transfers[0].id, undone.transfers[0].id);
}

#[test]
fn test_engine_resumes_from_snapshot() {
    let (mut engine, clock) = setup();
    live_project(&mut engine, "kiln", "alice", "50.0000");
    fund(&mut engine, "bob", "100.0000");
    let (alice, bob, kiln) = (name("alice"), name("bob"), name("kiln"));
    engine.donate(&bob, &kiln, &bob, tlos("10.0000"), "go").unwrap();
    engine.withdraw(&bob, &bob, tlos("5.0000")).unwrap();

    let resumed =
        Grassroots::from_snapshot(Config::default(), Arc::new(clock), engine.snapshot()).unwrap();

    assert_eq!(resumed.snapshot(), engine.snapshot());
    assert_eq!(resumed.account(&bob), engine.account(&bob));
    assert_eq!(resumed.project(&kiln), engine.project(&kiln));
    assert_eq!(resumed.projects_by_creator(&alice).len(), 1);
    assert_eq!(resumed.contributions_by_contributor(&bob).len(), 1);
    assert_eq!(resumed.pending_transfers().len(), 1);
    assert!(resumed.is_valid_category(&name("apps")));
    check(&resumed);
}
