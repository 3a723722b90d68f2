//! AccountLedger: custody balances per principal.
//!
//! `credit` and `debit` are the only primitives that change a balance; the
//! contribution helpers at the bottom move value between `balance` and
//! `rewards` for the ContributionLedger.

use tracing::debug;

use crate::events::Event;
use crate::money::Money;
use crate::storage::Txn;
use crate::types::{Account, Principal};
use crate::{Context, Entity, Error, Result};

/// Memo attached to every withdrawal instruction.
const WITHDRAW_MEMO: &str = "grassroots withdrawal";

/// Self-registration. Claims anything the TransferGateway escrowed for
/// `principal` before the account existed.
pub fn register(ctx: &mut Context<'_>, principal: &Principal) -> Result<Account> {
    ctx.env.require_auth(principal)?;
    if ctx.txn.account(principal).is_some() {
        return Err(Error::already_exists(Entity::Account, principal));
    }

    let mut account = Account::new(principal.clone(), ctx.config.currency);
    if let Some(escrowed) = ctx.txn.escrowed(principal) {
        debug!(%principal, %escrowed, "claiming escrowed deposits");
        account.balance = escrowed;
        ctx.txn.clear_escrow(principal);
    }

    ctx.txn.save_account(account.clone());
    ctx.txn.emit(Event::AccountRegistered {
        account: principal.clone(),
        opening_balance: account.balance,
    });
    Ok(account)
}

pub fn credit(txn: &mut Txn<'_>, principal: &Principal, amount: &Money) -> Result<Account> {
    let mut account = txn.require_account(principal)?;
    if amount.units() < 0 {
        return Err(Error::Validation(format!(
            "cannot credit a negative amount {amount}"
        )));
    }
    account.balance = account.balance.checked_add(amount)?;
    txn.save_account(account.clone());
    Ok(account)
}

pub fn debit(txn: &mut Txn<'_>, principal: &Principal, amount: &Money) -> Result<Account> {
    let mut account = txn.require_account(principal)?;
    if !amount.is_positive() {
        return Err(Error::Validation(format!(
            "debit amount must be positive, got {amount}"
        )));
    }
    if !account.balance.covers(amount)? {
        return Err(Error::InsufficientFunds {
            account: principal.clone(),
            available: account.balance,
            required: *amount,
        });
    }
    account.balance = account.balance.checked_sub(amount)?;
    txn.save_account(account.clone());
    Ok(account)
}

/// Debit `amount` and queue a payout of it to the owner.
pub fn withdraw(ctx: &mut Context<'_>, principal: &Principal, amount: &Money) -> Result<u64> {
    ctx.env.require_auth(principal)?;
    amount.ensure_currency(ctx.config.currency)?;
    debit(&mut ctx.txn, principal, amount)?;

    let transfer_id = ctx.txn.queue_transfer(
        principal.clone(),
        *amount,
        WITHDRAW_MEMO.to_string(),
        ctx.env.now(),
    );
    ctx.txn.emit(Event::Withdrawn {
        account: principal.clone(),
        quantity: *amount,
        transfer_id,
    });
    Ok(transfer_id)
}

/// Delete an emptied account.
pub fn remove(ctx: &mut Context<'_>, principal: &Principal) -> Result<()> {
    ctx.env.require_auth(principal)?;
    let account = ctx.txn.require_account(principal)?;

    if !account.balance.is_zero() || !account.rewards.is_zero() {
        return Err(Error::State {
            id: principal.to_string(),
            expected: "zero balance and rewards".into(),
            actual: format!("balance {}, rewards {}", account.balance, account.rewards),
        });
    }
    if let Some(live) = ctx
        .txn
        .projects_by_creator(principal)
        .into_iter()
        .find(|p| !p.status.is_terminal())
    {
        return Err(Error::State {
            id: principal.to_string(),
            expected: "no open projects".into(),
            actual: format!("creator of `{}` ({})", live.id, live.status),
        });
    }

    ctx.txn.delete_account(principal);
    ctx.txn.emit(Event::AccountRemoved {
        account: principal.clone(),
    });
    Ok(())
}

// ── Contribution bookkeeping ─────────────────────────────────────────

/// Move `amount` from the spendable balance into open commitments.
pub(crate) fn commit_to_contribution(
    txn: &mut Txn<'_>,
    principal: &Principal,
    amount: &Money,
) -> Result<()> {
    let mut account = debit(txn, principal, amount)?;
    account.rewards = account.rewards.checked_add(amount)?;
    txn.save_account(account);
    Ok(())
}

/// Return a reclaimed or refunded contribution to the spendable balance.
pub(crate) fn release_contribution(
    txn: &mut Txn<'_>,
    principal: &Principal,
    amount: &Money,
) -> Result<()> {
    let mut account = credit(txn, principal, amount)?;
    account.rewards = account.rewards.checked_sub(amount)?;
    txn.save_account(account);
    Ok(())
}

/// Close out a commitment whose project was funded.
pub(crate) fn settle_contribution(
    txn: &mut Txn<'_>,
    principal: &Principal,
    amount: &Money,
) -> Result<()> {
    let mut account = txn.require_account(principal)?;
    account.rewards = account.rewards.checked_sub(amount)?;
    txn.save_account(account);
    Ok(())
}
