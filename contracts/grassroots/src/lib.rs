//! # Grassroots
//!
//! Ledger and lifecycle engine for the **Grassroots** crowdfunding platform.
//! It holds user balances, runs funding campaigns through their lifecycle,
//! and books donations and tiered pledges against them.
//!
//! | Phase        | Entry Point(s)                                             |
//! |--------------|------------------------------------------------------------|
//! | Accounts     | [`Grassroots::register_account`], `withdraw`, `remove_account` |
//! | Deposits     | [`Grassroots::on_transfer`]                                |
//! | Categories   | `add_category`, `remove_category`                          |
//! | Setup        | [`Grassroots::new_project`], `add_tier`, `update_info`, `delete_project` |
//! | Funding      | [`Grassroots::open_funding`], `donate`, `undonate`, `pledge`, `unpledge` |
//! | Settlement   | `cancel_project`, `close_project`                          |
//! | Queries      | `account`, `project`, `contributions_for_project`, ...     |
//!
//! ## Architecture
//!
//! Each component module ([`accounts`], [`categories`], [`projects`],
//! [`contributions`], [`transfers`]) exposes plain functions over a
//! [`Context`]. Storage access is fully delegated to [`storage`].
//!
//! Every mutating call goes through one hook, [`Grassroots::execute`]: it reads
//! the clock once, opens a [`Txn`](storage::Txn), runs the operation, and either
//! commits everything or discards everything. Named actions submitted as JSON
//! reach the same hook through the [`dispatch`] registry.
//!
//! The engine is single-writer: `&mut self` on every mutation. A service that
//! accepts concurrent requests must serialize them before they get here.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub mod accounts;
pub mod categories;
pub mod config;
pub mod contributions;
pub mod dispatch;
pub mod env;
pub mod events;
pub mod money;
pub mod projects;
pub mod storage;
pub mod transfers;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_atomicity;
#[cfg(test)]
mod test_dispatch;
#[cfg(test)]
mod test_donations;
#[cfg(test)]
mod test_transfers;

pub use config::{Config, UnmatchedDeposits};
pub use dispatch::Dispatcher;
pub use env::{Caller, Clock, Env, ManualClock, SystemClock};
pub use events::Event;
pub use money::{Currency, Money, MoneyError};
pub use projects::{ProjectInfo, TierSpec};
pub use storage::{Receipt, Snapshot, Storage};
pub use transfers::DepositOutcome;
pub use types::{
    Account, Category, Contribution, Deposit, Name, OutboundTransfer, Principal, Project,
    ProjectStatus, Tier, Timestamp,
};

/// Kinds of rows an error can point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Account,
    Project,
    Tier,
    Contribution,
    Pledge,
    Category,
    Transfer,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Account => "account",
            Entity::Project => "project",
            Entity::Tier => "tier",
            Entity::Contribution => "contribution",
            Entity::Pledge => "pledge",
            Entity::Category => "category",
            Entity::Transfer => "transfer",
        })
    }
}

/// Every way an operation can abort. An aborted operation has no effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("`{caller}` is not authorized to act as `{required}`")]
    Unauthorized { caller: String, required: Principal },

    #[error("{kind} `{id}` not found")]
    NotFound { kind: Entity, id: String },

    #[error("{kind} `{id}` already exists")]
    AlreadyExists { kind: Entity, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient funds in `{account}`: available {available}, required {required}")]
    InsufficientFunds {
        account: Principal,
        available: Money,
        required: Money,
    },

    #[error("`{id}` is {actual}, expected {expected}")]
    State {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn not_found(kind: Entity, id: impl fmt::Display) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: Entity, id: impl fmt::Display) -> Self {
        Error::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable identifier for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthorized { .. } => "unauthorized",
            Error::NotFound { .. } => "not_found",
            Error::AlreadyExists { .. } => "already_exists",
            Error::Validation(_) => "validation_error",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::State { .. } => "state_error",
            Error::Unsupported(_) => "unsupported",
        }
    }
}

impl From<MoneyError> for Error {
    fn from(err: MoneyError) -> Self {
        Error::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// What an operation gets to work with: who is calling and when, the
/// deployment's constants, and its own transaction.
pub struct Context<'a> {
    pub env: Env,
    pub config: &'a Config,
    pub txn: storage::Txn<'a>,
}

pub struct Grassroots {
    storage: Storage,
    config: Config,
    clock: Arc<dyn Clock>,
    dispatcher: Dispatcher,
}

impl Grassroots {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Grassroots {
            storage: Storage::default(),
            config,
            clock,
            dispatcher: Dispatcher::standard(),
        })
    }

    /// A fresh engine whose category whitelist is already seeded with
    /// [`categories::DEFAULT_CATEGORIES`].
    pub fn with_default_categories(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut engine = Grassroots::new(config, clock)?;
        let admin = Caller::User(engine.config.admin.clone());
        for name in categories::DEFAULT_CATEGORIES {
            let category = Name::new(name)?;
            engine.execute(admin.clone(), "addcategory", |ctx| {
                categories::add(ctx, &category)
            })?;
        }
        Ok(engine)
    }

    /// An engine resuming from a previously persisted [`Snapshot`].
    pub fn from_snapshot(config: Config, clock: Arc<dyn Clock>, snapshot: Snapshot) -> Result<Self> {
        let mut engine = Grassroots::new(config, clock)?;
        engine.storage = Storage::restore(snapshot);
        Ok(engine)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn snapshot(&self) -> Snapshot {
        self.storage.snapshot()
    }

    /// Copy of the committed state, to hand back to [`Grassroots::rollback`]
    /// if a commit has to be undone by the host.
    pub fn checkpoint(&self) -> Storage {
        self.storage.clone()
    }

    pub fn rollback(&mut self, checkpoint: Storage) {
        debug!("rolled back to checkpoint");
        self.storage = checkpoint;
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Run `op` as one all-or-nothing unit on behalf of `caller`.
    pub fn execute<T>(
        &mut self,
        caller: Caller,
        action: &str,
        op: impl FnOnce(&mut Context<'_>) -> Result<T>,
    ) -> Result<(T, Receipt)> {
        run(
            &mut self.storage,
            &self.config,
            self.clock.as_ref(),
            caller,
            action,
            op,
        )
    }

    /// Run a named action with a JSON payload.
    pub fn dispatch(&mut self, caller: Caller, action: &str, payload: Value) -> Result<Receipt> {
        let handler = self.dispatcher.handler(action)?;
        let ((), receipt) = run(
            &mut self.storage,
            &self.config,
            self.clock.as_ref(),
            caller,
            action,
            |ctx| handler(ctx, payload),
        )?;
        Ok(receipt)
    }

    pub fn actions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.dispatcher.names()
    }

    // ── AccountLedger ────────────────────────────────────────────────

    pub fn register_account(&mut self, caller: &Principal, account: &Principal) -> Result<Receipt> {
        self.execute(user(caller), "newaccount", |ctx| accounts::register(ctx, account))
            .map(|(_, r)| r)
    }

    pub fn withdraw(
        &mut self,
        caller: &Principal,
        account: &Principal,
        quantity: Money,
    ) -> Result<Receipt> {
        self.execute(user(caller), "withdraw", |ctx| {
            accounts::withdraw(ctx, account, &quantity)
        })
        .map(|(_, r)| r)
    }

    pub fn remove_account(&mut self, caller: &Principal, account: &Principal) -> Result<Receipt> {
        self.execute(user(caller), "rmvaccount", |ctx| accounts::remove(ctx, account))
            .map(|(_, r)| r)
    }

    // ── CategoryRegistry ─────────────────────────────────────────────

    pub fn add_category(&mut self, caller: &Principal, category: &Name) -> Result<Receipt> {
        self.execute(user(caller), "addcategory", |ctx| categories::add(ctx, category))
            .map(|(_, r)| r)
    }

    pub fn remove_category(&mut self, caller: &Principal, category: &Name) -> Result<Receipt> {
        self.execute(user(caller), "rmvcategory", |ctx| {
            categories::remove(ctx, category)
        })
        .map(|(_, r)| r)
    }

    // ── ProjectRegistry ──────────────────────────────────────────────

    pub fn new_project(
        &mut self,
        caller: &Principal,
        project: &Name,
        category: &Name,
        creator: &Principal,
        info: ProjectInfo,
    ) -> Result<Receipt> {
        self.execute(user(caller), "newproject", |ctx| {
            projects::create(ctx, project, category, creator, info)
        })
        .map(|(_, r)| r)
    }

    pub fn add_tier(
        &mut self,
        caller: &Principal,
        project: &Name,
        creator: &Principal,
        tier: TierSpec,
    ) -> Result<Receipt> {
        self.execute(user(caller), "addtier", |ctx| {
            projects::add_tier(ctx, project, creator, tier)
        })
        .map(|(_, r)| r)
    }

    pub fn update_info(
        &mut self,
        caller: &Principal,
        project: &Name,
        creator: &Principal,
        info: ProjectInfo,
    ) -> Result<Receipt> {
        self.execute(user(caller), "updateinfo", |ctx| {
            projects::update_info(ctx, project, creator, info)
        })
        .map(|(_, r)| r)
    }

    pub fn open_funding(
        &mut self,
        caller: &Principal,
        project: &Name,
        creator: &Principal,
        length_in_days: u32,
    ) -> Result<Receipt> {
        self.execute(user(caller), "openfunding", |ctx| {
            projects::open_funding(ctx, project, creator, length_in_days)
        })
        .map(|(_, r)| r)
    }

    pub fn cancel_project(
        &mut self,
        caller: &Principal,
        project: &Name,
        creator: &Principal,
    ) -> Result<Receipt> {
        self.execute(user(caller), "cancelproj", |ctx| {
            projects::cancel(ctx, project, creator)
        })
        .map(|(_, r)| r)
    }

    pub fn close_project(
        &mut self,
        caller: &Principal,
        project: &Name,
        creator: &Principal,
    ) -> Result<(ProjectStatus, Receipt)> {
        self.execute(user(caller), "closeproj", |ctx| {
            projects::close(ctx, project, creator)
        })
    }

    pub fn delete_project(
        &mut self,
        caller: &Principal,
        project: &Name,
        creator: &Principal,
    ) -> Result<Receipt> {
        self.execute(user(caller), "rmvproject", |ctx| {
            projects::delete(ctx, project, creator)
        })
        .map(|(_, r)| r)
    }

    // ── ContributionLedger ───────────────────────────────────────────

    pub fn donate(
        &mut self,
        caller: &Principal,
        project: &Name,
        contributor: &Principal,
        amount: Money,
        memo: &str,
    ) -> Result<Receipt> {
        self.execute(user(caller), "donate", |ctx| {
            contributions::donate(ctx, project, contributor, &amount, memo)
        })
        .map(|(_, r)| r)
    }

    pub fn undonate(
        &mut self,
        caller: &Principal,
        project: &Name,
        contributor: &Principal,
    ) -> Result<Receipt> {
        self.execute(user(caller), "undonate", |ctx| {
            contributions::undonate(ctx, project, contributor)
        })
        .map(|(_, r)| r)
    }

    pub fn pledge(
        &mut self,
        caller: &Principal,
        project: &Name,
        tier: &Name,
        contributor: &Principal,
    ) -> Result<Receipt> {
        self.execute(user(caller), "pledge", |ctx| {
            contributions::pledge(ctx, project, tier, contributor)
        })
        .map(|(_, r)| r)
    }

    pub fn unpledge(
        &mut self,
        caller: &Principal,
        project: &Name,
        contributor: &Principal,
    ) -> Result<Receipt> {
        self.execute(user(caller), "unpledge", |ctx| {
            contributions::unpledge(ctx, project, contributor)
        })
        .map(|(_, r)| r)
    }

    // ── TransferGateway ──────────────────────────────────────────────

    /// React to a deposit notification from the custodial system.
    pub fn on_transfer(&mut self, deposit: &Deposit) -> Result<(DepositOutcome, Receipt)> {
        self.execute(Caller::Platform, "transfer", |ctx| {
            transfers::on_transfer(ctx, deposit)
        })
    }

    /// Mark an outbound transfer as delivered to the custodial system.
    pub fn acknowledge_transfer(&mut self, id: u64) -> Result<OutboundTransfer> {
        self.storage.acknowledge_transfer(id)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn account(&self, id: &Principal) -> Option<&Account> {
        self.storage.account(id)
    }

    pub fn project(&self, id: &Name) -> Option<&Project> {
        self.storage.project(id)
    }

    /// Tiers of `project` in ascending price order.
    pub fn tiers(&self, project: &Name) -> Result<Vec<&Tier>> {
        self.storage
            .project(project)
            .map(Project::tiers_by_price)
            .ok_or_else(|| Error::not_found(Entity::Project, project))
    }

    pub fn contribution(&self, project: &Name, contributor: &Principal) -> Option<&Contribution> {
        self.storage.contribution(project, contributor)
    }

    pub fn contributions_for_project(&self, project: &Name) -> Vec<&Contribution> {
        self.storage.contributions_for_project(project)
    }

    pub fn contributions_by_contributor(&self, contributor: &Principal) -> Vec<&Contribution> {
        self.storage.contributions_by_contributor(contributor)
    }

    pub fn projects_by_category(&self, category: &Name) -> Vec<&Project> {
        self.storage.projects_by_category(category)
    }

    pub fn projects_by_creator(&self, creator: &Principal) -> Vec<&Project> {
        self.storage.projects_by_creator(creator)
    }

    pub fn projects_ending_before(&self, ts: Timestamp) -> Vec<&Project> {
        self.storage.projects_ending_before(ts)
    }

    pub fn categories(&self) -> Vec<&Category> {
        self.storage.categories().collect()
    }

    pub fn is_valid_category(&self, category: &Name) -> bool {
        self.storage.category(category).is_some()
    }

    pub fn escrowed(&self, depositor: &Principal) -> Option<&Money> {
        self.storage.escrowed(depositor)
    }

    pub fn pending_transfers(&self) -> Vec<&OutboundTransfer> {
        self.storage.pending_transfers()
    }
}

fn user(principal: &Principal) -> Caller {
    Caller::User(principal.clone())
}

fn run<T>(
    storage: &mut Storage,
    config: &Config,
    clock: &dyn Clock,
    caller: Caller,
    action: &str,
    op: impl FnOnce(&mut Context<'_>) -> Result<T>,
) -> Result<(T, Receipt)> {
    let env = Env::new(caller, clock.now());
    let mut ctx = Context {
        env,
        config,
        txn: storage.begin(),
    };

    match op(&mut ctx) {
        Ok(value) => {
            let Context { env, txn, .. } = ctx;
            let receipt = txn.commit();
            info!(
                action,
                caller = %env.caller(),
                now = env.now(),
                events = receipt.events.len(),
                "committed"
            );
            Ok((value, receipt))
        }
        Err(err) => {
            debug!(action, caller = %ctx.env.caller(), error = %err, "aborted");
            Err(err)
        }
    }
}
