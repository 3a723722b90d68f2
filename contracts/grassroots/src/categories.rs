//! CategoryRegistry: the admin-managed whitelist of project categories.

use crate::events::Event;
use crate::storage::Txn;
use crate::types::{Category, Name};
use crate::{Context, Entity, Error, Result};

/// Categories every fresh deployment starts with.
pub const DEFAULT_CATEGORIES: [&str; 7] = [
    "games", "apps", "research", "tools", "media", "outreach", "products",
];

pub fn add(ctx: &mut Context<'_>, category: &Name) -> Result<()> {
    ctx.env.require_admin(ctx.config)?;
    if is_valid(&ctx.txn, category) {
        return Err(Error::already_exists(Entity::Category, category));
    }
    ctx.txn.save_category(Category {
        name: category.clone(),
    });
    ctx.txn.emit(Event::CategoryAdded {
        category: category.clone(),
    });
    Ok(())
}

/// Projects already filed under `category` keep it; only new projects are
/// affected.
pub fn remove(ctx: &mut Context<'_>, category: &Name) -> Result<()> {
    ctx.env.require_admin(ctx.config)?;
    if !is_valid(&ctx.txn, category) {
        return Err(Error::not_found(Entity::Category, category));
    }
    ctx.txn.delete_category(category);
    ctx.txn.emit(Event::CategoryRemoved {
        category: category.clone(),
    });
    Ok(())
}

pub fn is_valid(txn: &Txn<'_>, category: &Name) -> bool {
    txn.category(category).is_some()
}
