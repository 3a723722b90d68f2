//! Application configuration loaded from environment variables.

use grassroots::{Currency, Money, Name, UnmatchedDeposits};

use crate::errors::{GatewayError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite journal
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Endpoint of the custodial currency system that accepts payouts
    pub custodian_url: String,
    /// Secret the custodian presents when it notifies us of a deposit
    pub custodian_secret: String,
    /// How often (in seconds) the outbox is drained
    pub dispatch_interval_secs: u64,
    /// Ledger constants handed to the engine
    pub ledger: grassroots::Config,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let mut ledger = grassroots::Config {
            platform: parse_name(
                "PLATFORM_ACCOUNT",
                &lookup("PLATFORM_ACCOUNT").ok_or_else(|| {
                    GatewayError::Config(
                        "PLATFORM_ACCOUNT environment variable is required".to_string(),
                    )
                })?,
            )?,
            ..grassroots::Config::default()
        };
        if let Some(admin) = lookup("ADMIN_ACCOUNT") {
            ledger.admin = parse_name("ADMIN_ACCOUNT", &admin)?;
        }
        if let Some(currency) = lookup("CURRENCY") {
            ledger.currency = currency
                .parse::<Currency>()
                .map_err(|e| GatewayError::Config(format!("Invalid CURRENCY: {e}")))?;
        }
        if let Some(fee) = lookup("LISTING_FEE") {
            ledger.listing_fee = parse_money("LISTING_FEE", &fee)?;
        }
        if let Some(fee) = lookup("RAM_FEE") {
            ledger.ram_fee = parse_money("RAM_FEE", &fee)?;
        }
        if let Some(policy) = lookup("UNMATCHED_DEPOSITS") {
            ledger.unmatched_deposits = match policy.as_str() {
                "escrow" => UnmatchedDeposits::Escrow,
                "reject" => UnmatchedDeposits::Reject,
                other => {
                    return Err(GatewayError::Config(format!(
                        "Invalid UNMATCHED_DEPOSITS `{other}` (expected escrow or reject)"
                    )))
                }
            };
        }
        ledger
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Config {
            database_url: var("DATABASE_URL", "sqlite:./grassroots.db"),
            api_port: var("API_PORT", "3001")
                .parse()
                .map_err(|_| GatewayError::Config("Invalid API_PORT".to_string()))?,
            custodian_url: lookup("CUSTODIAN_URL").ok_or_else(|| {
                GatewayError::Config("CUSTODIAN_URL environment variable is required".to_string())
            })?,
            custodian_secret: lookup("CUSTODIAN_SECRET")
                .filter(|secret| !secret.is_empty())
                .ok_or_else(|| {
                    GatewayError::Config(
                        "CUSTODIAN_SECRET environment variable is required".to_string(),
                    )
                })?,
            dispatch_interval_secs: var("DISPATCH_INTERVAL_SECS", "5")
                .parse()
                .map_err(|_| GatewayError::Config("Invalid DISPATCH_INTERVAL_SECS".to_string()))?,
            ledger,
        })
    }
}

fn parse_name(key: &str, value: &str) -> Result<Name> {
    Name::new(value).map_err(|e| GatewayError::Config(format!("Invalid {key}: {e}")))
}

fn parse_money(key: &str, value: &str) -> Result<Money> {
    value
        .parse()
        .map_err(|e| GatewayError::Config(format!("Invalid {key}: {e}")))
}
