//! Journal rows: committed ledger events and outbound transfers as they are
//! stored in and read back from SQLite.

use grassroots::{Event, OutboundTransfer};
use serde::{Deserialize, Serialize};

/// A committed event flattened for storage. `payload` keeps the full event
/// as JSON; the other columns are for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub event_type: String,
    pub project_id: Option<String>,
    pub actor: Option<String>,
    pub amount: Option<String>,
    pub payload: String,
}

impl JournalEntry {
    pub fn from_event(event: &Event) -> serde_json::Result<Self> {
        Ok(JournalEntry {
            event_type: event.topic().to_string(),
            project_id: event.project().map(|p| p.to_string()),
            actor: event.actor().map(|a| a.to_string()),
            amount: event.amount().map(|m| m.to_string()),
            payload: serde_json::to_string(event)?,
        })
    }
}

/// An event record as read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub action: String,
    pub caller: String,
    pub event_type: String,
    pub project_id: Option<String>,
    pub actor: Option<String>,
    pub amount: Option<String>,
    pub payload: String,
    pub created_at: i64,
}

/// An outbound transfer instruction and its delivery state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransferRecord {
    pub id: i64,
    pub transfer_id: i64,
    pub recipient: String,
    pub quantity: String,
    pub memo: String,
    pub created_at: i64,
    pub delivered_at: Option<i64>,
}

impl TransferRecord {
    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }
}

/// Payload posted to the custodial system for one payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstruction {
    pub id: u64,
    pub from: String,
    pub to: String,
    pub quantity: String,
    pub memo: String,
}

impl TransferInstruction {
    pub fn new(platform: &grassroots::Name, transfer: &OutboundTransfer) -> Self {
        TransferInstruction {
            id: transfer.id,
            from: platform.to_string(),
            to: transfer.to.to_string(),
            quantity: transfer.quantity.to_string(),
            memo: transfer.memo.clone(),
        }
    }
}
