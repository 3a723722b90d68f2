//! Named-action registry.
//!
//! Maps the action names clients submit (`donate`, `openfunding`, ...) to
//! handlers that decode a JSON payload and call the component operation.
//! Handlers never commit anything themselves; [`Grassroots::dispatch`] wraps
//! every one of them in the same begin/commit/abort hook.
//!
//! [`Grassroots::dispatch`]: crate::Grassroots::dispatch

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::money::Money;
use crate::projects::{ProjectInfo, TierSpec};
use crate::types::{Name, Principal};
use crate::{accounts, categories, contributions, projects, Context, Error, Result};

pub type Handler = Box<dyn Fn(&mut Context<'_>, Value) -> Result<()> + Send + Sync>;

fn boxed<F>(handler: F) -> Handler
where
    F: Fn(&mut Context<'_>, Value) -> Result<()> + Send + Sync + 'static,
{
    Box::new(handler)
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: BTreeMap<&'static str, Handler>,
}

impl Dispatcher {
    /// A registry holding every ledger action.
    pub fn standard() -> Self {
        let mut d = Dispatcher::default();

        d.register("newaccount", |ctx, p: AccountParams| {
            accounts::register(ctx, &p.account).map(drop)
        });
        d.register("rmvaccount", |ctx, p: AccountParams| {
            accounts::remove(ctx, &p.account)
        });
        d.register("withdraw", |ctx, p: WithdrawParams| {
            accounts::withdraw(ctx, &p.account, &p.quantity).map(drop)
        });

        d.register("addcategory", |ctx, p: CategoryParams| {
            categories::add(ctx, &p.category)
        });
        d.register("rmvcategory", |ctx, p: CategoryParams| {
            categories::remove(ctx, &p.category)
        });

        d.register("newproject", |ctx, p: NewProjectParams| {
            projects::create(ctx, &p.project, &p.category, &p.creator, p.info).map(drop)
        });
        d.register("addtier", |ctx, p: AddTierParams| {
            projects::add_tier(ctx, &p.project, &p.creator, p.tier)
        });
        d.register("updateinfo", |ctx, p: UpdateInfoParams| {
            projects::update_info(ctx, &p.project, &p.creator, p.info)
        });
        d.register("openfunding", |ctx, p: OpenFundingParams| {
            projects::open_funding(ctx, &p.project, &p.creator, p.length_in_days)
        });
        d.register("cancelproj", |ctx, p: ProjectParams| {
            projects::cancel(ctx, &p.project, &p.creator)
        });
        d.register("closeproj", |ctx, p: ProjectParams| {
            projects::close(ctx, &p.project, &p.creator).map(drop)
        });
        d.register("rmvproject", |ctx, p: ProjectParams| {
            projects::delete(ctx, &p.project, &p.creator)
        });

        d.register("donate", |ctx, p: DonateParams| {
            contributions::donate(ctx, &p.project, &p.contributor, &p.amount, &p.memo).map(drop)
        });
        d.register("undonate", |ctx, p: ContributionParams| {
            contributions::undonate(ctx, &p.project, &p.contributor).map(drop)
        });
        d.register("pledge", |ctx, p: PledgeParams| {
            contributions::pledge(ctx, &p.project, &p.tier, &p.contributor).map(drop)
        });
        d.register("unpledge", |ctx, p: ContributionParams| {
            contributions::unpledge(ctx, &p.project, &p.contributor).map(drop)
        });

        d
    }

    /// Register `handler` under `name`, decoding its payload as `P`.
    pub fn register<P, F>(&mut self, name: &'static str, handler: F)
    where
        P: DeserializeOwned + 'static,
        F: Fn(&mut Context<'_>, P) -> Result<()> + Send + Sync + 'static,
    {
        let handler = boxed(move |ctx, payload| {
            let params: P = serde_json::from_value(payload).map_err(|e| {
                Error::Validation(format!("malformed `{name}` payload: {e}"))
            })?;
            handler(ctx, params)
        });
        self.handlers.insert(name, handler);
    }

    pub fn handler(&self, name: &str) -> Result<&Handler> {
        self.handlers
            .get(name)
            .ok_or_else(|| Error::Unsupported(format!("unknown action `{name}`")))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }
}

// ── Payloads ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AccountParams {
    account: Principal,
}

#[derive(Deserialize)]
struct WithdrawParams {
    account: Principal,
    quantity: Money,
}

#[derive(Deserialize)]
struct CategoryParams {
    category: Name,
}

#[derive(Deserialize)]
struct NewProjectParams {
    project: Name,
    category: Name,
    creator: Principal,
    #[serde(flatten)]
    info: ProjectInfo,
}

#[derive(Deserialize)]
struct AddTierParams {
    project: Name,
    creator: Principal,
    #[serde(flatten)]
    tier: TierSpec,
}

#[derive(Deserialize)]
struct UpdateInfoParams {
    project: Name,
    creator: Principal,
    #[serde(flatten)]
    info: ProjectInfo,
}

#[derive(Deserialize)]
struct OpenFundingParams {
    project: Name,
    creator: Principal,
    length_in_days: u32,
}

#[derive(Deserialize)]
struct ProjectParams {
    project: Name,
    creator: Principal,
}

#[derive(Deserialize)]
struct DonateParams {
    project: Name,
    contributor: Principal,
    amount: Money,
    #[serde(default)]
    memo: String,
}

#[derive(Deserialize)]
struct ContributionParams {
    project: Name,
    contributor: Principal,
}

#[derive(Deserialize)]
struct PledgeParams {
    project: Name,
    tier: Name,
    contributor: Principal,
}
