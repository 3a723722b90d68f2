//! ContributionLedger: donations, pledges, and their reclaims.
//!
//! There is one row per `(project, contributor)`. Repeat donations add to the
//! row's `total`; a pledge opens a row tied to a tier. Every entry point keeps
//! `project.received == Σ total` and moves the same amount between the
//! contributor's `balance` and `rewards`.

use crate::accounts;
use crate::events::Event;
use crate::money::Money;
use crate::projects::{self, require_status, require_window_open};
use crate::types::{Contribution, Name, Principal, Project, ProjectStatus};
use crate::{Context, Entity, Error, Result};

pub fn donate(
    ctx: &mut Context<'_>,
    project_id: &Name,
    contributor: &Principal,
    amount: &Money,
    memo: &str,
) -> Result<Contribution> {
    ctx.env.require_auth(contributor)?;
    let mut project = ctx.txn.require_project(project_id)?;
    ctx.txn.require_account(contributor)?;
    let now = ctx.env.now();
    require_window_open(&project, now)?;
    amount.ensure_currency(ctx.config.currency)?;
    if !amount.is_positive() {
        return Err(Error::Validation(format!(
            "donation must be positive, got {amount}"
        )));
    }

    accounts::commit_to_contribution(&mut ctx.txn, contributor, amount)?;

    let row = match ctx.txn.contribution(project_id, contributor) {
        Some(mut existing) => {
            existing.total = existing.total.checked_add(amount)?;
            existing.memo = memo.to_string();
            existing.updated_at = now;
            existing
        }
        None => {
            project.donor_count += 1;
            Contribution {
                id: ctx.txn.next_contribution_id(),
                project: project_id.clone(),
                contributor: contributor.clone(),
                tier: None,
                total: *amount,
                memo: memo.to_string(),
                created_at: now,
                updated_at: now,
            }
        }
    };
    ctx.txn.save_contribution(row.clone());
    ctx.txn.emit(Event::Donated {
        project: project_id.clone(),
        contributor: contributor.clone(),
        amount: *amount,
        total: row.total,
    });

    receive(ctx, &mut project, amount)?;
    Ok(row)
}

/// Reclaim the whole contribution while the project is still funding.
pub fn undonate(ctx: &mut Context<'_>, project_id: &Name, contributor: &Principal) -> Result<Money> {
    ctx.env.require_auth(contributor)?;
    let row = ctx
        .txn
        .contribution(project_id, contributor)
        .ok_or_else(|| Error::not_found(Entity::Contribution, format!("{project_id}/{contributor}")))?;
    let mut project = ctx.txn.require_project(project_id)?;
    require_status(&project, ProjectStatus::Funding)?;

    reclaim(ctx, &mut project, &row)?;
    ctx.txn.emit(Event::Undonated {
        project: project_id.clone(),
        contributor: contributor.clone(),
        amount: row.total,
    });
    ctx.txn.save_project(project);
    Ok(row.total)
}

/// Buy one unit of a tier. A contributor holds at most one row per project,
/// so pledging again (or pledging on top of a donation) is rejected.
pub fn pledge(
    ctx: &mut Context<'_>,
    project_id: &Name,
    tier_name: &Name,
    contributor: &Principal,
) -> Result<Contribution> {
    ctx.env.require_auth(contributor)?;
    let mut project = ctx.txn.require_project(project_id)?;
    ctx.txn.require_account(contributor)?;
    let tier = project
        .tiers
        .get(tier_name)
        .cloned()
        .ok_or_else(|| Error::not_found(Entity::Tier, format!("{project_id}/{tier_name}")))?;
    let now = ctx.env.now();
    require_window_open(&project, now)?;

    if let Some(existing) = ctx.txn.contribution(project_id, contributor) {
        return Err(Error::Unsupported(match existing.tier {
            Some(current) => format!(
                "changing the pledge of `{contributor}` on `{project_id}` from tier `{current}` to `{tier_name}`"
            ),
            None => format!(
                "pledging on `{project_id}` on top of the existing donation of `{contributor}`"
            ),
        }));
    }
    if tier.remaining == 0 {
        return Err(Error::State {
            id: format!("{project_id}/{tier_name}"),
            expected: "pledges left".into(),
            actual: "sold out".into(),
        });
    }

    accounts::commit_to_contribution(&mut ctx.txn, contributor, &tier.price)?;
    if let Some(slot) = project.tiers.get_mut(tier_name) {
        slot.remaining -= 1;
    }
    project.donor_count += 1;

    let row = Contribution {
        id: ctx.txn.next_contribution_id(),
        project: project_id.clone(),
        contributor: contributor.clone(),
        tier: Some(tier_name.clone()),
        total: tier.price,
        memo: String::new(),
        created_at: now,
        updated_at: now,
    };
    ctx.txn.save_contribution(row.clone());
    ctx.txn.emit(Event::Pledged {
        project: project_id.clone(),
        contributor: contributor.clone(),
        tier: tier_name.clone(),
        price: tier.price,
    });

    receive(ctx, &mut project, &tier.price)?;
    Ok(row)
}

/// Take back a pledge while the campaign window is open.
pub fn unpledge(ctx: &mut Context<'_>, project_id: &Name, contributor: &Principal) -> Result<Money> {
    ctx.env.require_auth(contributor)?;
    let (row, tier) = ctx
        .txn
        .contribution(project_id, contributor)
        .and_then(|row| row.tier.clone().map(|tier| (row, tier)))
        .ok_or_else(|| Error::not_found(Entity::Pledge, format!("{project_id}/{contributor}")))?;
    let mut project = ctx.txn.require_project(project_id)?;
    require_window_open(&project, ctx.env.now())?;

    reclaim(ctx, &mut project, &row)?;
    ctx.txn.emit(Event::Unpledged {
        project: project_id.clone(),
        contributor: contributor.clone(),
        tier,
        amount: row.total,
    });
    ctx.txn.save_project(project);
    Ok(row.total)
}

/// Book `amount` into `project` and settle it if the target is reached.
fn receive(ctx: &mut Context<'_>, project: &mut Project, amount: &Money) -> Result<()> {
    project.received = project.received.checked_add(amount)?;
    if project.received.covers(&project.requested)? {
        projects::settle_funded(&mut ctx.txn, project)?;
    }
    ctx.txn.save_project(project.clone());
    Ok(())
}

/// Undo `row` entirely: refund, shrink `received`, restore tier inventory.
fn reclaim(ctx: &mut Context<'_>, project: &mut Project, row: &Contribution) -> Result<()> {
    accounts::release_contribution(&mut ctx.txn, &row.contributor, &row.total)?;
    project.received = project.received.checked_sub(&row.total)?;
    project.donor_count = project.donor_count.saturating_sub(1);
    if let Some(tier) = row.tier.as_ref().and_then(|t| project.tiers.get_mut(t)) {
        tier.remaining += 1;
    }
    ctx.txn.delete_contribution(&row.project, &row.contributor);
    Ok(())
}
