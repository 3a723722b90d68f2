//! # Storage
//!
//! Keyed tables, their secondary indexes, and the transactional unit that
//! every operation writes through.
//!
//! ## Tables
//!
//! | Table           | Key                       | Row                  |
//! |-----------------|---------------------------|----------------------|
//! | `accounts`      | `Principal`               | [`Account`]          |
//! | `projects`      | `Name`                    | [`Project`]          |
//! | `contributions` | `(project, contributor)`  | [`Contribution`]     |
//! | `categories`    | `Name`                    | [`Category`]         |
//! | `escrow`        | `Principal`               | [`Money`]            |
//! | `outbox`        | transfer id               | [`OutboundTransfer`] |
//!
//! ## Secondary indexes
//!
//! | Index                          | Entry                     |
//! |--------------------------------|---------------------------|
//! | `projects_by_category`         | `(category, project)`     |
//! | `projects_by_creator`          | `(creator, project)`      |
//! | `projects_by_end_time`         | `(end_time, project)`     |
//! | `contributions_by_contributor` | `(contributor, project)`  |
//!
//! Project-scoped contribution lookups use the primary key prefix instead of
//! an index. Indexes are only touched in [`Txn::commit`], together with the
//! rows they describe.
//!
//! ## Transactions
//!
//! A [`Txn`] is a write-set layered over the committed tables. Reads consult
//! the write-set first, so an operation sees its own pending writes.
//! `commit` applies the whole write-set at once; dropping the `Txn` without
//! committing leaves the committed tables exactly as they were.
//!
//! ## Snapshots
//!
//! [`Storage::snapshot`] flattens the committed tables into a serializable
//! [`Snapshot`]; [`Storage::restore`] rebuilds the tables and every index
//! from one.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::money::Money;
use crate::types::{
    Account, Category, Contribution, ContributionKey, Name, OutboundTransfer, Principal, Project,
    Timestamp,
};
use crate::{Entity, Error};

/// Sorts before every valid [`Name`]; used as an open lower bound.
fn name_floor() -> Name {
    Name(String::new())
}

/// Auto-increment counters. Part of the write-set like any row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    next_contribution_id: u64,
    next_transfer_id: u64,
}

/// Committed state of the ledger.
#[derive(Clone, Debug, Default)]
pub struct Storage {
    accounts: BTreeMap<Principal, Account>,
    projects: BTreeMap<Name, Project>,
    contributions: BTreeMap<ContributionKey, Contribution>,
    categories: BTreeMap<Name, Category>,
    escrow: BTreeMap<Principal, Money>,
    outbox: BTreeMap<u64, OutboundTransfer>,
    counters: Counters,

    projects_by_category: BTreeSet<(Name, Name)>,
    projects_by_creator: BTreeSet<(Principal, Name)>,
    projects_by_end_time: BTreeSet<(Timestamp, Name)>,
    contributions_by_contributor: BTreeSet<(Principal, Name)>,
}

/// What a committed operation produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub events: Vec<Event>,
    pub transfers: Vec<OutboundTransfer>,
}

/// Committed tables as plain rows. Indexes are derived, so they are not
/// stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub accounts: Vec<Account>,
    pub projects: Vec<Project>,
    pub contributions: Vec<Contribution>,
    pub categories: Vec<Category>,
    pub escrow: Vec<(Principal, Money)>,
    pub outbox: Vec<OutboundTransfer>,
    pub counters: Counters,
}

impl Storage {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            accounts: self.accounts.values().cloned().collect(),
            projects: self.projects.values().cloned().collect(),
            contributions: self.contributions.values().cloned().collect(),
            categories: self.categories.values().cloned().collect(),
            escrow: self
                .escrow
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            outbox: self.outbox.values().cloned().collect(),
            counters: self.counters,
        }
    }

    pub fn restore(snapshot: Snapshot) -> Storage {
        let mut store = Storage {
            counters: snapshot.counters,
            ..Storage::default()
        };
        for account in snapshot.accounts {
            store.accounts.insert(account.id.clone(), account);
        }
        for project in snapshot.projects {
            store.index_project(&project);
            store.projects.insert(project.id.clone(), project);
        }
        for row in snapshot.contributions {
            store
                .contributions_by_contributor
                .insert((row.contributor.clone(), row.project.clone()));
            store.contributions.insert(row.key(), row);
        }
        for category in snapshot.categories {
            store.categories.insert(category.name.clone(), category);
        }
        store.escrow.extend(snapshot.escrow);
        for transfer in snapshot.outbox {
            store.outbox.insert(transfer.id, transfer);
        }
        store
    }
}

// ── Committed reads ──────────────────────────────────────────────────

impl Storage {
    pub fn account(&self, id: &Principal) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn project(&self, id: &Name) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn contribution(&self, project: &Name, contributor: &Principal) -> Option<&Contribution> {
        self.contributions
            .get(&(project.clone(), contributor.clone()))
    }

    pub fn contributions_for_project(&self, project: &Name) -> Vec<&Contribution> {
        self.contributions
            .range((project.clone(), name_floor())..)
            .take_while(|((p, _), _)| p == project)
            .map(|(_, c)| c)
            .collect()
    }

    pub fn contributions_by_contributor(&self, contributor: &Principal) -> Vec<&Contribution> {
        self.contributions_by_contributor
            .range((contributor.clone(), name_floor())..)
            .take_while(|(c, _)| c == contributor)
            .filter_map(|(c, p)| self.contributions.get(&(p.clone(), c.clone())))
            .collect()
    }

    pub fn category(&self, name: &Name) -> Option<&Category> {
        self.categories.get(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn projects_by_category(&self, category: &Name) -> Vec<&Project> {
        self.projects_by_category
            .range((category.clone(), name_floor())..)
            .take_while(|(c, _)| c == category)
            .filter_map(|(_, p)| self.projects.get(p))
            .collect()
    }

    pub fn projects_by_creator(&self, creator: &Principal) -> Vec<&Project> {
        self.projects_by_creator
            .range((creator.clone(), name_floor())..)
            .take_while(|(c, _)| c == creator)
            .filter_map(|(_, p)| self.projects.get(p))
            .collect()
    }

    /// Projects whose campaign window ends strictly before `ts`, earliest first.
    /// Projects that never opened funding are not listed.
    pub fn projects_ending_before(&self, ts: Timestamp) -> Vec<&Project> {
        if ts <= 1 {
            return Vec::new();
        }
        self.projects_by_end_time
            .range((1, name_floor())..(ts, name_floor()))
            .filter_map(|(_, p)| self.projects.get(p))
            .collect()
    }

    pub fn escrowed(&self, depositor: &Principal) -> Option<&Money> {
        self.escrow.get(depositor)
    }

    pub fn pending_transfers(&self) -> Vec<&OutboundTransfer> {
        self.outbox.values().collect()
    }

    /// Drop a delivered transfer from the outbox.
    pub fn acknowledge_transfer(&mut self, id: u64) -> Result<OutboundTransfer, Error> {
        self.outbox.remove(&id).ok_or_else(|| Error::NotFound {
            kind: Entity::Transfer,
            id: id.to_string(),
        })
    }

    pub fn begin(&mut self) -> Txn<'_> {
        let counters = self.counters;
        Txn {
            store: self,
            accounts: WriteSet::default(),
            projects: WriteSet::default(),
            contributions: WriteSet::default(),
            categories: WriteSet::default(),
            escrow: WriteSet::default(),
            counters,
            outbox: Vec::new(),
            events: Vec::new(),
        }
    }

    fn index_project(&mut self, project: &Project) {
        self.projects_by_category
            .insert((project.category.clone(), project.id.clone()));
        self.projects_by_creator
            .insert((project.creator.clone(), project.id.clone()));
        if project.end_time > 0 {
            self.projects_by_end_time
                .insert((project.end_time, project.id.clone()));
        }
    }

    fn unindex_project(&mut self, project: &Project) {
        self.projects_by_category
            .remove(&(project.category.clone(), project.id.clone()));
        self.projects_by_creator
            .remove(&(project.creator.clone(), project.id.clone()));
        self.projects_by_end_time
            .remove(&(project.end_time, project.id.clone()));
    }
}

// ── Write-set ────────────────────────────────────────────────────────

/// Pending writes for one table: `Some` is an upsert, `None` a delete.
#[derive(Debug)]
struct WriteSet<K, V> {
    writes: BTreeMap<K, Option<V>>,
}

impl<K, V> Default for WriteSet<K, V> {
    fn default() -> Self {
        WriteSet {
            writes: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, V: Clone> WriteSet<K, V> {
    fn get(&self, base: &BTreeMap<K, V>, key: &K) -> Option<V> {
        match self.writes.get(key) {
            Some(pending) => pending.clone(),
            None => base.get(key).cloned(),
        }
    }

    fn put(&mut self, key: K, value: V) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: K) {
        self.writes.insert(key, None);
    }

    /// Rows from `start` onward for which `within` holds, with pending
    /// writes applied.
    fn scan(&self, base: &BTreeMap<K, V>, start: &K, within: impl Fn(&K) -> bool) -> Vec<V> {
        let mut merged: BTreeMap<K, V> = base
            .range(start.clone()..)
            .take_while(|(k, _)| within(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, pending) in self
            .writes
            .range(start.clone()..)
            .take_while(|(k, _)| within(*k))
        {
            match pending {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }
        merged.into_values().collect()
    }
}

// ── Transaction ──────────────────────────────────────────────────────

/// One operation's all-or-nothing unit of work.
pub struct Txn<'a> {
    store: &'a mut Storage,
    accounts: WriteSet<Principal, Account>,
    projects: WriteSet<Name, Project>,
    contributions: WriteSet<ContributionKey, Contribution>,
    categories: WriteSet<Name, Category>,
    escrow: WriteSet<Principal, Money>,
    counters: Counters,
    outbox: Vec<OutboundTransfer>,
    events: Vec<Event>,
}

impl Txn<'_> {
    // accounts

    pub fn account(&self, id: &Principal) -> Option<Account> {
        self.accounts.get(&self.store.accounts, id)
    }

    pub fn require_account(&self, id: &Principal) -> Result<Account, Error> {
        self.account(id).ok_or_else(|| Error::not_found(Entity::Account, id))
    }

    pub fn save_account(&mut self, account: Account) {
        self.accounts.put(account.id.clone(), account);
    }

    pub fn delete_account(&mut self, id: &Principal) {
        self.accounts.delete(id.clone());
    }

    // projects

    pub fn project(&self, id: &Name) -> Option<Project> {
        self.projects.get(&self.store.projects, id)
    }

    pub fn require_project(&self, id: &Name) -> Result<Project, Error> {
        self.project(id).ok_or_else(|| Error::not_found(Entity::Project, id))
    }

    pub fn save_project(&mut self, project: Project) {
        self.projects.put(project.id.clone(), project);
    }

    pub fn delete_project(&mut self, id: &Name) {
        self.projects.delete(id.clone());
    }

    /// Projects created by `creator`, pending writes included.
    pub fn projects_by_creator(&self, creator: &Principal) -> Vec<Project> {
        let mut ids: BTreeSet<Name> = self
            .store
            .projects_by_creator
            .range((creator.clone(), name_floor())..)
            .take_while(|(c, _)| c == creator)
            .map(|(_, p)| p.clone())
            .collect();
        for (id, pending) in &self.projects.writes {
            if matches!(pending, Some(p) if &p.creator == creator) {
                ids.insert(id.clone());
            }
        }
        ids.iter()
            .filter_map(|id| self.project(id))
            .filter(|p| &p.creator == creator)
            .collect()
    }

    // contributions

    pub fn contribution(&self, project: &Name, contributor: &Principal) -> Option<Contribution> {
        self.contributions.get(
            &self.store.contributions,
            &(project.clone(), contributor.clone()),
        )
    }

    pub fn save_contribution(&mut self, contribution: Contribution) {
        self.contributions.put(contribution.key(), contribution);
    }

    pub fn delete_contribution(&mut self, project: &Name, contributor: &Principal) {
        self.contributions
            .delete((project.clone(), contributor.clone()));
    }

    /// Every live contribution to `project`, ordered by contributor.
    pub fn contributions_for_project(&self, project: &Name) -> Vec<Contribution> {
        self.contributions.scan(
            &self.store.contributions,
            &(project.clone(), name_floor()),
            |(p, _)| p == project,
        )
    }

    /// Every live contribution made by `contributor`, pending writes included.
    pub fn contributions_by_contributor(&self, contributor: &Principal) -> Vec<Contribution> {
        let mut projects: BTreeSet<Name> = self
            .store
            .contributions_by_contributor
            .range((contributor.clone(), name_floor())..)
            .take_while(|(c, _)| c == contributor)
            .map(|(_, p)| p.clone())
            .collect();
        for ((project, c), pending) in &self.contributions.writes {
            if c == contributor && pending.is_some() {
                projects.insert(project.clone());
            }
        }
        projects
            .iter()
            .filter_map(|p| self.contribution(p, contributor))
            .collect()
    }

    pub fn next_contribution_id(&mut self) -> u64 {
        let id = self.counters.next_contribution_id;
        self.counters.next_contribution_id += 1;
        id
    }

    // categories

    pub fn category(&self, name: &Name) -> Option<Category> {
        self.categories.get(&self.store.categories, name)
    }

    pub fn save_category(&mut self, category: Category) {
        self.categories.put(category.name.clone(), category);
    }

    pub fn delete_category(&mut self, name: &Name) {
        self.categories.delete(name.clone());
    }

    // escrow

    pub fn escrowed(&self, depositor: &Principal) -> Option<Money> {
        self.escrow.get(&self.store.escrow, depositor)
    }

    pub fn save_escrow(&mut self, depositor: Principal, amount: Money) {
        self.escrow.put(depositor, amount);
    }

    pub fn clear_escrow(&mut self, depositor: &Principal) {
        self.escrow.delete(depositor.clone());
    }

    // outbox & events

    /// Queue a payout instruction for the custodial system.
    pub fn queue_transfer(
        &mut self,
        to: Principal,
        quantity: Money,
        memo: String,
        now: Timestamp,
    ) -> u64 {
        let id = self.counters.next_transfer_id;
        self.counters.next_transfer_id += 1;
        self.outbox.push(OutboundTransfer {
            id,
            to,
            quantity,
            memo,
            created_at: now,
        });
        id
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Apply every pending write and index update, then hand back what the
    /// operation produced.
    pub fn commit(self) -> Receipt {
        let Txn {
            store,
            accounts,
            projects,
            contributions,
            categories,
            escrow,
            counters,
            outbox,
            events,
        } = self;

        for (id, pending) in accounts.writes {
            match pending {
                Some(account) => store.accounts.insert(id, account),
                None => store.accounts.remove(&id),
            };
        }

        for (id, pending) in projects.writes {
            if let Some(old) = store.projects.remove(&id) {
                store.unindex_project(&old);
            }
            if let Some(project) = pending {
                store.index_project(&project);
                store.projects.insert(id, project);
            }
        }

        for ((project, contributor), pending) in contributions.writes {
            let index_key = (contributor.clone(), project.clone());
            let key = (project, contributor);
            match pending {
                Some(row) => {
                    store.contributions_by_contributor.insert(index_key);
                    store.contributions.insert(key, row);
                }
                None => {
                    store.contributions_by_contributor.remove(&index_key);
                    store.contributions.remove(&key);
                }
            }
        }

        for (name, pending) in categories.writes {
            match pending {
                Some(category) => store.categories.insert(name, category),
                None => store.categories.remove(&name),
            };
        }

        for (depositor, pending) in escrow.writes {
            match pending {
                Some(amount) => store.escrow.insert(depositor, amount),
                None => store.escrow.remove(&depositor),
            };
        }

        store.counters = counters;
        for transfer in &outbox {
            store.outbox.insert(transfer.id, transfer.clone());
        }

        Receipt {
            events,
            transfers: outbox,
        }
    }
}
