//! ProjectRegistry: project rows, their tier inventory, and the lifecycle
//! state machine.
//!
//! Every entry point authorizes the creator twice: the caller must be the
//! named creator, and the named creator must own the project.
//!
//! Settlement lives here too. A project that reaches its target pays the
//! whole `received` amount to its creator in the same unit that flipped it to
//! `Funded`; a project that is cancelled or fails refunds every live
//! contribution before it goes terminal.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounts;
use crate::categories;
use crate::events::Event;
use crate::money::Money;
use crate::storage::Txn;
use crate::types::{Name, Principal, Project, ProjectStatus, Tier, SECONDS_PER_DAY};
use crate::{Context, Entity, Error, Result};

/// Descriptive fields a creator controls while the project is in `Setup`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub title: String,
    pub description: String,
    pub uri: String,
    pub requested: Money,
}

/// A tier as proposed by its creator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub tier: Name,
    pub price: Money,
    pub description: String,
    pub stock: u32,
}

pub fn create(
    ctx: &mut Context<'_>,
    id: &Name,
    category: &Name,
    creator: &Principal,
    info: ProjectInfo,
) -> Result<Project> {
    ctx.env.require_auth(creator)?;
    if ctx.txn.project(id).is_some() {
        return Err(Error::already_exists(Entity::Project, id));
    }
    if !categories::is_valid(&ctx.txn, category) {
        return Err(Error::Validation(format!("invalid category `{category}`")));
    }
    validate_info(ctx, &info)?;

    let now = ctx.env.now();
    let project = Project {
        id: id.clone(),
        category: category.clone(),
        creator: creator.clone(),
        title: info.title,
        description: info.description,
        uri: info.uri,
        requested: info.requested,
        received: Money::zero(ctx.config.currency),
        tiers: Default::default(),
        donor_count: 0,
        begin_time: 0,
        end_time: 0,
        last_edit: now,
        status: ProjectStatus::Setup,
    };

    ctx.txn.save_project(project.clone());
    ctx.txn.emit(Event::ProjectCreated {
        project: id.clone(),
        creator: creator.clone(),
        category: category.clone(),
        requested: project.requested,
    });
    Ok(project)
}

pub fn add_tier(ctx: &mut Context<'_>, id: &Name, creator: &Principal, offer: TierSpec) -> Result<()> {
    let mut project = load_owned(ctx, id, creator)?;
    require_status(&project, ProjectStatus::Setup)?;
    if project.tiers.contains_key(&offer.tier) {
        return Err(Error::already_exists(
            Entity::Tier,
            format!("{id}/{}", offer.tier),
        ));
    }
    offer.price.ensure_currency(ctx.config.currency)?;
    if !offer.price.is_positive() {
        return Err(Error::Validation("tier price must be positive".into()));
    }
    require_filled("description", &offer.description)?;
    if offer.stock == 0 {
        return Err(Error::Validation("tier stock must be positive".into()));
    }

    ctx.txn.emit(Event::TierAdded {
        project: id.clone(),
        tier: offer.tier.clone(),
        price: offer.price,
        stock: offer.stock,
    });
    project.tiers.insert(
        offer.tier.clone(),
        Tier {
            name: offer.tier,
            price: offer.price,
            description: offer.description,
            remaining: offer.stock,
        },
    );
    project.last_edit = ctx.env.now();
    ctx.txn.save_project(project);
    Ok(())
}

pub fn update_info(
    ctx: &mut Context<'_>,
    id: &Name,
    creator: &Principal,
    info: ProjectInfo,
) -> Result<()> {
    let mut project = load_owned(ctx, id, creator)?;
    require_status(&project, ProjectStatus::Setup)?;
    validate_info(ctx, &info)?;

    project.title = info.title;
    project.description = info.description;
    project.uri = info.uri;
    project.requested = info.requested;
    project.last_edit = ctx.env.now();
    ctx.txn.save_project(project);
    ctx.txn.emit(Event::ProjectUpdated { project: id.clone() });
    Ok(())
}

/// Charge the listing fee and start the campaign window.
pub fn open_funding(
    ctx: &mut Context<'_>,
    id: &Name,
    creator: &Principal,
    length_in_days: u32,
) -> Result<()> {
    let mut project = load_owned(ctx, id, creator)?;
    require_status(&project, ProjectStatus::Setup)?;

    let (min, max) = (ctx.config.min_campaign_days, ctx.config.max_campaign_days);
    if length_in_days < min || length_in_days > max {
        return Err(Error::Validation(format!(
            "project length must be between {min} and {max} days, got {length_in_days}"
        )));
    }
    if ctx.config.require_tier_to_open && project.tiers.is_empty() {
        return Err(Error::Validation(format!(
            "project `{id}` must have at least 1 tier"
        )));
    }

    let now = ctx.env.now();
    let end_time = u64::from(length_in_days)
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|length| now.checked_add(length))
        .ok_or_else(|| {
            Error::Validation(format!(
                "a {length_in_days}-day window starting at {now} overflows the clock"
            ))
        })?;

    let fee = ctx.config.listing_fee;
    if fee.is_positive() {
        accounts::debit(&mut ctx.txn, creator, &fee)?;
    } else {
        ctx.txn.require_account(creator)?;
    }

    project.begin_time = now;
    project.end_time = end_time;
    project.last_edit = now;
    project.status = ProjectStatus::Funding;

    ctx.txn.emit(Event::FundingOpened {
        project: id.clone(),
        fee,
        begin_time: project.begin_time,
        end_time: project.end_time,
    });
    ctx.txn.save_project(project);
    Ok(())
}

/// Withdraw a live campaign. Every contribution is refunded.
pub fn cancel(ctx: &mut Context<'_>, id: &Name, creator: &Principal) -> Result<()> {
    let mut project = load_owned(ctx, id, creator)?;
    require_window_open(&project, ctx.env.now())?;

    refund_all(&mut ctx.txn, &mut project)?;
    project.status = ProjectStatus::Cancelled;
    ctx.txn.emit(Event::ProjectCancelled { project: id.clone() });
    ctx.txn.save_project(project);
    Ok(())
}

/// Settle a campaign whose window has elapsed.
pub fn close(ctx: &mut Context<'_>, id: &Name, creator: &Principal) -> Result<ProjectStatus> {
    let mut project = load_owned(ctx, id, creator)?;
    require_status(&project, ProjectStatus::Funding)?;
    let now = ctx.env.now();
    if now < project.end_time {
        return Err(Error::State {
            id: id.to_string(),
            expected: format!("window closed at {}", project.end_time),
            actual: format!("still open at {now}"),
        });
    }

    // Donations and pledges settle a project the moment it reaches its
    // target, so a FUNDING project here has always fallen short. The funded
    // arm only guards against that ever changing.
    if project.received.covers(&project.requested)? {
        settle_funded(&mut ctx.txn, &mut project)?;
    } else {
        let received = project.received;
        refund_all(&mut ctx.txn, &mut project)?;
        project.status = ProjectStatus::Failed;
        ctx.txn.emit(Event::ProjectFailed {
            project: id.clone(),
            received,
        });
    }
    let status = project.status;
    ctx.txn.save_project(project);
    Ok(status)
}

pub fn delete(ctx: &mut Context<'_>, id: &Name, creator: &Principal) -> Result<()> {
    let project = load_owned(ctx, id, creator)?;
    require_status(&project, ProjectStatus::Setup)?;
    ctx.txn.delete_project(id);
    ctx.txn.emit(Event::ProjectDeleted { project: id.clone() });
    Ok(())
}

// ── Shared checks ────────────────────────────────────────────────────

/// Authorize `creator` and load a project they own.
fn load_owned(ctx: &Context<'_>, id: &Name, creator: &Principal) -> Result<Project> {
    ctx.env.require_auth(creator)?;
    let project = ctx.txn.require_project(id)?;
    if &project.creator != creator {
        return Err(Error::Unauthorized {
            caller: creator.to_string(),
            required: project.creator,
        });
    }
    Ok(project)
}

pub(crate) fn require_status(project: &Project, expected: ProjectStatus) -> Result<()> {
    if project.status != expected {
        return Err(Error::State {
            id: project.id.to_string(),
            expected: expected.to_string(),
            actual: project.status.to_string(),
        });
    }
    Ok(())
}

/// `Funding` and `now` strictly before the end of the window.
pub(crate) fn require_window_open(project: &Project, now: u64) -> Result<()> {
    if !project.is_accepting(now) {
        return Err(Error::State {
            id: project.id.to_string(),
            expected: format!("funding before {}", project.end_time),
            actual: format!("{} at {now}", project.status),
        });
    }
    Ok(())
}

fn validate_info(ctx: &Context<'_>, info: &ProjectInfo) -> Result<()> {
    require_filled("title", &info.title)?;
    require_filled("description", &info.description)?;
    require_filled("uri", &info.uri)?;
    info.requested.ensure_currency(ctx.config.currency)?;
    if !info.requested.is_positive() {
        return Err(Error::Validation(format!(
            "must request a positive amount, got {}",
            info.requested
        )));
    }
    Ok(())
}

fn require_filled(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} cannot be blank")));
    }
    Ok(())
}

// ── Settlement ───────────────────────────────────────────────────────

/// Flip to `Funded`, pay the creator and close out every contributor's
/// commitment. The caller saves `project`.
pub(crate) fn settle_funded(txn: &mut Txn<'_>, project: &mut Project) -> Result<()> {
    for contribution in txn.contributions_for_project(&project.id) {
        accounts::settle_contribution(txn, &contribution.contributor, &contribution.total)?;
    }
    accounts::credit(txn, &project.creator, &project.received)?;
    project.status = ProjectStatus::Funded;
    info!(project = %project.id, received = %project.received, "project funded");
    txn.emit(Event::ProjectFunded {
        project: project.id.clone(),
        received: project.received,
    });
    Ok(())
}

/// Return every live contribution to its contributor and delete the rows.
/// The caller sets the terminal status and saves `project`.
pub(crate) fn refund_all(txn: &mut Txn<'_>, project: &mut Project) -> Result<()> {
    for contribution in txn.contributions_for_project(&project.id) {
        accounts::release_contribution(txn, &contribution.contributor, &contribution.total)?;
        txn.delete_contribution(&project.id, &contribution.contributor);
        project.received = project.received.checked_sub(&contribution.total)?;
        txn.emit(Event::Refunded {
            project: project.id.clone(),
            contributor: contribution.contributor,
            amount: contribution.total,
        });
    }
    project.donor_count = 0;
    Ok(())
}
