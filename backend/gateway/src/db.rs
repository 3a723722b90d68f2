//! Database layer: migrations, the event/transfer journal and the persisted
//! ledger state.

use grassroots::{Receipt, Snapshot};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use crate::errors::Result;
use crate::journal::{EventRecord, JournalEntry, TransferRecord};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    let url = if url.contains(":memory:") || url.contains("mode=") {
        url
    } else if url.contains('?') {
        format!("{url}&mode=rwc")
    } else {
        format!("{url}?mode=rwc")
    };
    connect(&url, 5).await
}

/// Open a pool of at most `max_connections` and migrate it.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Journal writes
// ─────────────────────────────────────────────────────────

/// Persist everything a committed operation produced, together with the
/// ledger state it left behind. Returns the number of event rows written.
pub async fn record_receipt(
    pool: &SqlitePool,
    action: &str,
    caller: &str,
    receipt: &Receipt,
    state: &Snapshot,
    recorded_at: i64,
) -> Result<usize> {
    let mut tx = pool.begin().await?;

    for event in &receipt.events {
        let entry = JournalEntry::from_event(event)?;
        sqlx::query(
            r#"
            INSERT INTO events
                (action, caller, event_type, project_id, actor, amount, payload, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(action)
        .bind(caller)
        .bind(&entry.event_type)
        .bind(&entry.project_id)
        .bind(&entry.actor)
        .bind(&entry.amount)
        .bind(&entry.payload)
        .bind(recorded_at)
        .execute(&mut *tx)
        .await?;
    }

    for transfer in &receipt.transfers {
        sqlx::query(
            r#"
            INSERT INTO transfers (transfer_id, recipient, quantity, memo, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(transfer.id as i64)
        .bind(transfer.to.as_str())
        .bind(transfer.quantity.to_string())
        .bind(&transfer.memo)
        .bind(transfer.created_at as i64)
        .execute(&mut *tx)
        .await?;
    }

    write_state(&mut tx, state, recorded_at).await?;
    tx.commit().await?;
    Ok(receipt.events.len())
}

/// Stamp the pending journal row of `transfer_id` as delivered and store the
/// ledger state without it in its outbox.
pub async fn mark_delivered(
    pool: &SqlitePool,
    transfer_id: u64,
    state: &Snapshot,
    delivered_at: i64,
) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let rows = sqlx::query(
        r#"
        UPDATE transfers SET delivered_at = ?2
        WHERE  id = (
            SELECT id FROM transfers
            WHERE  transfer_id = ?1 AND delivered_at IS NULL
            ORDER  BY id DESC
            LIMIT  1
        )
        "#,
    )
    .bind(transfer_id as i64)
    .bind(delivered_at)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    write_state(&mut tx, state, delivered_at).await?;
    tx.commit().await?;
    Ok(rows > 0)
}

// ─────────────────────────────────────────────────────────
// Ledger state
// ─────────────────────────────────────────────────────────

/// Store `state` outside of any journal write; used when a fresh ledger is
/// seeded.
pub async fn save_state(pool: &SqlitePool, state: &Snapshot, saved_at: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    write_state(&mut tx, state, saved_at).await?;
    tx.commit().await?;
    Ok(())
}

/// The last committed ledger state, if one was ever stored.
pub async fn load_state(pool: &SqlitePool) -> Result<Option<Snapshot>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT snapshot FROM ledger_state WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    match row {
        Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

async fn write_state(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    state: &Snapshot,
    updated_at: i64,
) -> Result<()> {
    let json = serde_json::to_string(state)?;
    sqlx::query(
        r#"
        INSERT INTO ledger_state (id, snapshot, updated_at)
        VALUES (1, ?1, ?2)
        ON CONFLICT (id) DO UPDATE SET snapshot = excluded.snapshot,
                                       updated_at = excluded.updated_at
        "#,
    )
    .bind(json)
    .bind(updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Journal reads
// ─────────────────────────────────────────────────────────

const EVENT_COLUMNS: &str =
    "id, action, caller, event_type, project_id, actor, amount, payload, created_at";

/// Fetch all events in commit order.
pub async fn get_all_events(pool: &SqlitePool) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events ORDER BY id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch all events for a given project in commit order.
pub async fn get_events_for_project(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE project_id = ?1 ORDER BY id ASC"
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_transfers(pool: &SqlitePool) -> Result<Vec<TransferRecord>> {
    let rows = sqlx::query_as::<_, TransferRecord>(
        r#"
        SELECT id, transfer_id, recipient, quantity, memo, created_at, delivered_at
        FROM   transfers
        ORDER  BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
