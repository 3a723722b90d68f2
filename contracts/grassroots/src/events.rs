//! # Events
//!
//! Typed records of every committed mutation. An operation collects its
//! events in its transaction; they reach the caller only through the
//! [`Receipt`](crate::storage::Receipt) of a successful commit, so an
//! aborted operation never emits anything.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Name, Principal, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AccountRegistered {
        account: Principal,
        opening_balance: Money,
    },
    AccountRemoved {
        account: Principal,
    },
    Deposited {
        account: Principal,
        quantity: Money,
    },
    DepositEscrowed {
        depositor: Principal,
        quantity: Money,
    },
    Withdrawn {
        account: Principal,
        quantity: Money,
        transfer_id: u64,
    },
    CategoryAdded {
        category: Name,
    },
    CategoryRemoved {
        category: Name,
    },
    ProjectCreated {
        project: Name,
        creator: Principal,
        category: Name,
        requested: Money,
    },
    ProjectUpdated {
        project: Name,
    },
    TierAdded {
        project: Name,
        tier: Name,
        price: Money,
        stock: u32,
    },
    FundingOpened {
        project: Name,
        fee: Money,
        begin_time: Timestamp,
        end_time: Timestamp,
    },
    Donated {
        project: Name,
        contributor: Principal,
        amount: Money,
        total: Money,
    },
    Undonated {
        project: Name,
        contributor: Principal,
        amount: Money,
    },
    Pledged {
        project: Name,
        contributor: Principal,
        tier: Name,
        price: Money,
    },
    Unpledged {
        project: Name,
        contributor: Principal,
        tier: Name,
        amount: Money,
    },
    Refunded {
        project: Name,
        contributor: Principal,
        amount: Money,
    },
    ProjectFunded {
        project: Name,
        received: Money,
    },
    ProjectFailed {
        project: Name,
        received: Money,
    },
    ProjectCancelled {
        project: Name,
    },
    ProjectDeleted {
        project: Name,
    },
}

impl Event {
    /// Short topic identifier, stable across releases.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::AccountRegistered { .. } => "account_registered",
            Event::AccountRemoved { .. } => "account_removed",
            Event::Deposited { .. } => "deposited",
            Event::DepositEscrowed { .. } => "deposit_escrowed",
            Event::Withdrawn { .. } => "withdrawn",
            Event::CategoryAdded { .. } => "category_added",
            Event::CategoryRemoved { .. } => "category_removed",
            Event::ProjectCreated { .. } => "project_created",
            Event::ProjectUpdated { .. } => "project_updated",
            Event::TierAdded { .. } => "tier_added",
            Event::FundingOpened { .. } => "funding_opened",
            Event::Donated { .. } => "donated",
            Event::Undonated { .. } => "undonated",
            Event::Pledged { .. } => "pledged",
            Event::Unpledged { .. } => "unpledged",
            Event::Refunded { .. } => "refunded",
            Event::ProjectFunded { .. } => "project_funded",
            Event::ProjectFailed { .. } => "project_failed",
            Event::ProjectCancelled { .. } => "project_cancelled",
            Event::ProjectDeleted { .. } => "project_deleted",
        }
    }

    /// The project the event concerns, if any.
    pub fn project(&self) -> Option<&Name> {
        match self {
            Event::ProjectCreated { project, .. }
            | Event::ProjectUpdated { project }
            | Event::TierAdded { project, .. }
            | Event::FundingOpened { project, .. }
            | Event::Donated { project, .. }
            | Event::Undonated { project, .. }
            | Event::Pledged { project, .. }
            | Event::Unpledged { project, .. }
            | Event::Refunded { project, .. }
            | Event::ProjectFunded { project, .. }
            | Event::ProjectFailed { project, .. }
            | Event::ProjectCancelled { project }
            | Event::ProjectDeleted { project } => Some(project),
            _ => None,
        }
    }

    /// The principal acting or affected, if any.
    pub fn actor(&self) -> Option<&Principal> {
        match self {
            Event::AccountRegistered { account, .. }
            | Event::AccountRemoved { account }
            | Event::Deposited { account, .. }
            | Event::Withdrawn { account, .. } => Some(account),
            Event::DepositEscrowed { depositor, .. } => Some(depositor),
            Event::ProjectCreated { creator, .. } => Some(creator),
            Event::Donated { contributor, .. }
            | Event::Undonated { contributor, .. }
            | Event::Pledged { contributor, .. }
            | Event::Unpledged { contributor, .. }
            | Event::Refunded { contributor, .. } => Some(contributor),
            _ => None,
        }
    }

    /// The amount moved, if any.
    pub fn amount(&self) -> Option<&Money> {
        match self {
            Event::AccountRegistered { opening_balance, .. } => Some(opening_balance),
            Event::Deposited { quantity, .. }
            | Event::DepositEscrowed { quantity, .. }
            | Event::Withdrawn { quantity, .. } => Some(quantity),
            Event::ProjectCreated { requested, .. } => Some(requested),
            Event::TierAdded { price, .. } | Event::Pledged { price, .. } => Some(price),
            Event::FundingOpened { fee, .. } => Some(fee),
            Event::Donated { amount, .. }
            | Event::Undonated { amount, .. }
            | Event::Unpledged { amount, .. }
            | Event::Refunded { amount, .. } => Some(amount),
            Event::ProjectFunded { received, .. } | Event::ProjectFailed { received, .. } => {
                Some(received)
            }
            _ => None,
        }
    }
}
