#![allow(dead_code)]

use crate::money::Money;
use crate::storage::Storage;
use crate::types::{Project, ProjectStatus};

/// A project's `received` equals the sum of its live contribution totals.
pub fn assert_received_matches_contributions(storage: &Storage, project: &Project) {
    let rows = storage.contributions_for_project(&project.id);
    let sum = rows
        .iter()
        .try_fold(Money::zero(project.received.currency()), |acc, c| {
            acc.checked_add(&c.total)
        })
        .expect("contribution totals share the project currency");
    assert_eq!(
        project.received, sum,
        "project {} received {} but contributions sum to {}",
        project.id, project.received, sum
    );
}

/// `donor_count` equals the number of contribution rows.
pub fn assert_donor_count(storage: &Storage, project: &Project) {
    let rows = storage.contributions_for_project(&project.id).len();
    assert_eq!(
        project.donor_count as usize, rows,
        "project {} counts {} donors but has {} rows",
        project.id, project.donor_count, rows
    );
}

/// Every pledge row points at an existing tier and holds at least its price.
pub fn assert_tier_bounds(storage: &Storage, project: &Project) {
    for row in storage.contributions_for_project(&project.id) {
        let Some(tier_name) = &row.tier else { continue };
        let tier = project
            .tiers
            .get(tier_name)
            .unwrap_or_else(|| panic!("pledge on {} names unknown tier {tier_name}", project.id));
        assert!(
            row.total.units() >= tier.price.units(),
            "pledge of {} on {}/{} is below the tier price",
            row.contributor,
            project.id,
            tier_name
        );
    }
}

pub fn assert_balances_non_negative(storage: &Storage) {
    for account in storage.accounts() {
        assert!(
            account.balance.units() >= 0,
            "account {} has negative balance {}",
            account.id,
            account.balance
        );
        assert!(
            account.rewards.units() >= 0,
            "account {} has negative rewards {}",
            account.id,
            account.rewards
        );
    }
}

/// Only forward transitions are allowed:
///   Setup   -> Funding
///   Funding -> Funded | Failed | Cancelled
pub fn assert_valid_status_transition(from: ProjectStatus, to: ProjectStatus) {
    let valid = from == to
        || matches!(
            (from, to),
            (ProjectStatus::Setup, ProjectStatus::Funding)
                | (ProjectStatus::Funding, ProjectStatus::Funded)
                | (ProjectStatus::Funding, ProjectStatus::Failed)
                | (ProjectStatus::Funding, ProjectStatus::Cancelled)
        );
    assert!(valid, "invalid status transition {from} -> {to}");
}

/// Every ledger-wide invariant at once.
pub fn assert_all(storage: &Storage) {
    assert_balances_non_negative(storage);
    for project in storage.projects() {
        assert_received_matches_contributions(storage, project);
        assert_donor_count(storage, project);
        assert_tier_bounds(storage, project);
    }
}
