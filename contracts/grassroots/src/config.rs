//! Ledger-wide constants that a deployment may override.

use serde::{Deserialize, Serialize};

use crate::money::{Currency, Money};
use crate::types::{Name, Principal};
use crate::Error;

/// What the TransferGateway does with a deposit from an unknown principal
/// whose memo is not the registration memo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedDeposits {
    /// Fail the notification so the custodian bounces the transfer.
    Reject,
    /// Hold the amount under the depositor until they register.
    Escrow,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The only principal allowed to manage categories.
    pub admin: Principal,
    /// The platform's own account at the custodial currency system.
    pub platform: Principal,
    /// The single native currency every amount must be expressed in.
    pub currency: Currency,
    /// Charged to the creator when funding opens.
    pub listing_fee: Money,
    /// Withheld from the first deposit when the platform pays for the row.
    pub ram_fee: Money,
    /// Deposit memo that asks for an account to be created.
    pub register_memo: String,
    pub min_campaign_days: u32,
    pub max_campaign_days: u32,
    /// Refuse to open funding for a project with no tiers.
    pub require_tier_to_open: bool,
    pub unmatched_deposits: UnmatchedDeposits,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            admin: Name(String::from("grassrootsio")),
            platform: Name(String::from("grassroots")),
            currency: Currency::TLOS,
            listing_fee: Money::new(250_000, Currency::TLOS),
            ram_fee: Money::new(1_000, Currency::TLOS),
            register_memo: String::from("register account"),
            min_campaign_days: 1,
            max_campaign_days: 180,
            require_tier_to_open: false,
            unmatched_deposits: UnmatchedDeposits::Escrow,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        self.listing_fee.ensure_currency(self.currency)?;
        self.ram_fee.ensure_currency(self.currency)?;
        if self.listing_fee.units() < 0 || self.ram_fee.units() < 0 {
            return Err(Error::Validation("fees cannot be negative".into()));
        }
        if self.min_campaign_days == 0 || self.min_campaign_days > self.max_campaign_days {
            return Err(Error::Validation(format!(
                "campaign length range {}..={} days is empty",
                self.min_campaign_days, self.max_campaign_days
            )));
        }
        if self.admin == self.platform {
            return Err(Error::Validation(
                "admin and platform must be different principals".into(),
            ));
        }
        if self.register_memo.trim().is_empty() {
            return Err(Error::Validation("register memo cannot be blank".into()));
        }
        Ok(())
    }
}
