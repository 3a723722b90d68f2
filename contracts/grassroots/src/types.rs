//! # Types
//!
//! Shared data structures used across all modules of the Grassroots ledger.
//!
//! ## Status as a Finite-State Machine
//!
//! [`ProjectStatus`] enforces a strict forward-only lifecycle:
//!
//! ```text
//! Setup ──► Funding ──► Funded
//!              ├──────► Failed
//!              └──────► Cancelled
//! ```
//!
//! `Setup` and `Funding` are the only states that accept mutations.
//! `Funded`, `Failed` and `Cancelled` are terminal; the row is retained.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::money::{Currency, Money};
use crate::Error;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

pub const SECONDS_PER_DAY: u64 = 86_400;

const MAX_NAME_LEN: usize = 12;

/// Identifier for principals, projects, tiers and categories.
///
/// 1 to 12 characters drawn from `a-z`, `1-5` and `.`, never ending in `.`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(pub(crate) String);

/// An account holder.
pub type Principal = Name;

impl Name {
    pub fn new(text: impl Into<String>) -> Result<Self, Error> {
        let text = text.into();
        let valid_chars = text
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'1'..=b'5' | b'.'));
        if text.is_empty() || text.len() > MAX_NAME_LEN || !valid_chars || text.ends_with('.') {
            return Err(Error::Validation(format!("invalid name `{text}`")));
        }
        Ok(Name(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::new(s)
    }
}

impl TryFrom<String> for Name {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Name::new(value)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

/// A principal's custody balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Principal,
    /// Spendable balance. Never negative.
    pub balance: Money,
    /// Value committed to contributions that are still open, either
    /// reclaimable or awaiting settlement.
    pub rewards: Money,
}

impl Account {
    pub fn new(id: Principal, currency: Currency) -> Self {
        Account {
            id,
            balance: Money::zero(currency),
            rewards: Money::zero(currency),
        }
    }
}

/// Lifecycle status of a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Created; descriptive fields and tiers may still change.
    Setup,
    /// Campaign window open; accepting donations and pledges.
    Funding,
    /// Target reached; received funds paid out to the creator.
    Funded,
    /// Window closed below target; contributions refunded.
    Failed,
    /// Withdrawn by the creator during the window; contributions refunded.
    Cancelled,
}

impl ProjectStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProjectStatus::Funded | ProjectStatus::Failed | ProjectStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Setup => "setup",
            ProjectStatus::Funding => "funding",
            ProjectStatus::Funded => "funded",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A priced reward slot with finite inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: Name,
    pub price: Money,
    pub description: String,
    pub remaining: u32,
}

/// A funding campaign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Name,
    pub category: Name,
    pub creator: Principal,
    pub title: String,
    pub description: String,
    pub uri: String,
    pub requested: Money,
    /// Sum of the totals of every live contribution to this project.
    pub received: Money,
    /// Tier inventory keyed by tier name.
    pub tiers: BTreeMap<Name, Tier>,
    pub donor_count: u32,
    /// Zero until funding opens.
    pub begin_time: Timestamp,
    /// Zero until funding opens.
    pub end_time: Timestamp,
    pub last_edit: Timestamp,
    pub status: ProjectStatus,
}

impl Project {
    /// Tiers in ascending price order, ties broken by name.
    pub fn tiers_by_price(&self) -> Vec<&Tier> {
        let mut tiers: Vec<&Tier> = self.tiers.values().collect();
        tiers.sort_by(|a, b| a.price.units().cmp(&b.price.units()).then(a.name.cmp(&b.name)));
        tiers
    }

    /// `true` while the campaign window is open at `now`.
    pub fn is_accepting(&self, now: Timestamp) -> bool {
        self.status == ProjectStatus::Funding && now < self.end_time
    }
}

/// Primary key of a contribution row.
pub type ContributionKey = (Name, Principal);

/// The single canonical record of what `contributor` has put into `project`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: u64,
    pub project: Name,
    pub contributor: Principal,
    /// Set when the row was opened by a pledge against a tier.
    pub tier: Option<Name>,
    pub total: Money,
    pub memo: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Contribution {
    pub fn key(&self) -> ContributionKey {
        (self.project.clone(), self.contributor.clone())
    }
}

/// Whitelisted project category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: Name,
}

/// An instruction to the custodial currency system to pay out `quantity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundTransfer {
    pub id: u64,
    pub to: Principal,
    pub quantity: Money,
    pub memo: String,
    pub created_at: Timestamp,
}

/// An inbound deposit notification delivered by the custodial system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub from: Principal,
    pub to: Principal,
    pub quantity: Money,
    #[serde(default)]
    pub memo: String,
}
