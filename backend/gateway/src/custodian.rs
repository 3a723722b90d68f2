//! Outbox dispatcher: delivers queued withdrawals to the custodial currency
//! system and acknowledges them in the ledger.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied when the custodian is unreachable, rate
//!   limits us or fails with a 5xx, up to [`MAX_BACKOFF_SECS`] seconds.
//! * A 4xx other than 429 is a hard refusal: the transfer stays in the outbox
//!   and is retried on the next tick.
//! * Shutdown is observed between attempts.
//! * Delivery is at-least-once: a transfer whose acknowledgement cannot be
//!   stored is sent again with the same `id`, which the custodian uses to
//!   drop duplicates.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use grassroots::{Name, OutboundTransfer};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::ApiState;
use crate::db;
use crate::errors::{GatewayError, Result};
use crate::journal::TransferInstruction;

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_ATTEMPTS: u32 = 5;

pub struct Dispatcher {
    pub state: Arc<ApiState>,
    pub client: Client,
    pub custodian_url: String,
    pub platform: Name,
    pub interval: Duration,
}

/// Drain the outbox every `interval` until `shutdown` fires.
pub async fn run(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) {
    info!("Dispatcher starting, custodian: {}", dispatcher.custodian_url);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(dispatcher.interval) => {}
        }

        match drain_once(&dispatcher, &shutdown).await {
            Ok(0) => {}
            Ok(n) => info!("Delivered {n} outbound transfers"),
            Err(e) => error!("Dispatcher error: {e}"),
        }
    }

    info!("Dispatcher stopped");
}

/// Deliver every pending transfer once. Returns how many were delivered.
pub async fn drain_once(dispatcher: &Dispatcher, shutdown: &CancellationToken) -> Result<usize> {
    let pending: Vec<OutboundTransfer> = {
        let engine = dispatcher.state.engine.lock().await;
        engine.pending_transfers().into_iter().cloned().collect()
    };

    let mut delivered = 0;
    for transfer in pending {
        if shutdown.is_cancelled() {
            break;
        }
        let instruction = TransferInstruction::new(&dispatcher.platform, &transfer);
        match deliver(&dispatcher.client, &dispatcher.custodian_url, &instruction, shutdown).await {
            Ok(()) => {
                acknowledge(dispatcher, transfer.id).await?;
                delivered += 1;
            }
            Err(e) => warn!(transfer = transfer.id, "Transfer not delivered: {e}"),
        }
    }
    Ok(delivered)
}

/// Drop a delivered transfer from the outbox. If the new state cannot be
/// stored the transfer stays queued and is offered again under the same id.
async fn acknowledge(dispatcher: &Dispatcher, id: u64) -> Result<()> {
    let mut engine = dispatcher.state.engine.lock().await;
    let checkpoint = engine.checkpoint();
    engine.acknowledge_transfer(id)?;
    let stored = db::mark_delivered(
        &dispatcher.state.pool,
        id,
        &engine.snapshot(),
        Utc::now().timestamp(),
    )
    .await;
    match stored {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(transfer = id, "Delivered transfer had no pending journal row");
            Ok(())
        }
        Err(e) => {
            engine.rollback(checkpoint);
            Err(e)
        }
    }
}

/// POST one instruction, retrying transient failures.
async fn deliver(
    client: &Client,
    url: &str,
    instruction: &TransferInstruction,
    shutdown: &CancellationToken,
) -> Result<()> {
    let mut backoff = INITIAL_BACKOFF_SECS;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let retry_reason = match client.post(url).json(instruction).send().await {
            Err(e) => e.to_string(),
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    debug!(transfer = instruction.id, "Custodian accepted transfer");
                    return Ok(());
                }
                if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(GatewayError::Custodian(format!("{status}: {body}")));
                }
                format!("custodian answered {status}")
            }
        };

        if attempt >= MAX_ATTEMPTS {
            return Err(GatewayError::Custodian(format!(
                "gave up after {attempt} attempts: {retry_reason}"
            )));
        }
        warn!("Custodian request failed (will retry in {backoff}s): {retry_reason}");
        tokio::select! {
            _ = shutdown.cancelled() => {
                return Err(GatewayError::Custodian("shutting down".to_string()));
            }
            _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
    }
}
