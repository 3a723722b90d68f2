//! TransferGateway: reacts to deposits the custodial currency system reports.
//!
//! | Depositor                   | Memo                 | Outcome                                 |
//! |-----------------------------|----------------------|-----------------------------------------|
//! | has an account              | any                  | balance credited                        |
//! | unknown                     | registration memo    | account opened, ram fee withheld        |
//! | unknown                     | anything else        | escrowed or rejected, per configuration |
//!
//! Notifications that are not addressed to the platform, or that the platform
//! sent itself, are acknowledged without touching the ledger.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::accounts;
use crate::config::UnmatchedDeposits;
use crate::events::Event;
use crate::types::{Account, Deposit};
use crate::{Context, Entity, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositOutcome {
    Credited,
    Registered,
    Escrowed,
    Ignored,
}

pub fn on_transfer(ctx: &mut Context<'_>, deposit: &Deposit) -> Result<DepositOutcome> {
    ctx.env.require_platform()?;
    let platform = &ctx.config.platform;
    if &deposit.from == platform || &deposit.to != platform {
        return Ok(DepositOutcome::Ignored);
    }

    let quantity = deposit.quantity;
    quantity.ensure_currency(ctx.config.currency)?;
    if !quantity.is_positive() {
        return Err(Error::Validation(format!(
            "deposit must be positive, got {quantity}"
        )));
    }

    let from = &deposit.from;
    if ctx.txn.account(from).is_some() {
        accounts::credit(&mut ctx.txn, from, &quantity)?;
        ctx.txn.emit(Event::Deposited {
            account: from.clone(),
            quantity,
        });
        return Ok(DepositOutcome::Credited);
    }

    if deposit.memo.trim() == ctx.config.register_memo {
        let ram_fee = ctx.config.ram_fee;
        let mut opening = quantity
            .checked_sub(&ram_fee)
            .map_err(|_| Error::InsufficientFunds {
                account: from.clone(),
                available: quantity,
                required: ram_fee,
            })?;
        if let Some(escrowed) = ctx.txn.escrowed(from) {
            opening = opening.checked_add(&escrowed)?;
            ctx.txn.clear_escrow(from);
        }

        let mut account = Account::new(from.clone(), ctx.config.currency);
        account.balance = opening;
        ctx.txn.save_account(account);
        ctx.txn.emit(Event::AccountRegistered {
            account: from.clone(),
            opening_balance: opening,
        });
        return Ok(DepositOutcome::Registered);
    }

    match ctx.config.unmatched_deposits {
        UnmatchedDeposits::Reject => {
            warn!(%from, %quantity, memo = %deposit.memo, "rejecting deposit from unknown account");
            Err(Error::not_found(Entity::Account, from))
        }
        UnmatchedDeposits::Escrow => {
            let held = match ctx.txn.escrowed(from) {
                Some(held) => held.checked_add(&quantity)?,
                None => quantity,
            };
            warn!(%from, %quantity, %held, "escrowing deposit from unknown account");
            ctx.txn.save_escrow(from.clone(), held);
            ctx.txn.emit(Event::DepositEscrowed {
                depositor: from.clone(),
                quantity,
            });
            Ok(DepositOutcome::Escrowed)
        }
    }
}
