//! Grassroots gateway entry point.
//!
//! Hosts one ledger engine behind a single-writer lock and exposes it over a
//! small Axum REST API. Deposit notifications from the custodial currency
//! system arrive on `POST /transfers`; a background dispatcher delivers
//! queued withdrawals back to it. Every committed receipt is journaled to
//! SQLite together with the ledger state, which is reloaded on startup.

mod api;
mod config;
mod custodian;
mod db;
mod errors;
mod journal;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use grassroots::{Grassroots, SystemClock};
use reqwest::Client;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let pool = db::init_pool(&config.database_url).await?;

    let engine = match db::load_state(&pool).await? {
        Some(snapshot) => {
            info!(
                accounts = snapshot.accounts.len(),
                projects = snapshot.projects.len(),
                pending_transfers = snapshot.outbox.len(),
                "Resuming ledger from stored state"
            );
            Grassroots::from_snapshot(config.ledger.clone(), Arc::new(SystemClock), snapshot)?
        }
        None => {
            let engine =
                Grassroots::with_default_categories(config.ledger.clone(), Arc::new(SystemClock))?;
            db::save_state(&pool, &engine.snapshot(), Utc::now().timestamp()).await?;
            engine
        }
    };
    info!(
        admin = %config.ledger.admin,
        platform = %config.ledger.platform,
        currency = %config.ledger.currency,
        "Ledger ready"
    );
    let state = Arc::new(api::ApiState {
        engine: Mutex::new(engine),
        pool,
        custodian_secret: config.custodian_secret.clone(),
    });

    // ─── Background dispatcher ────────────────────────────
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(custodian::Dispatcher {
        state: state.clone(),
        client,
        custodian_url: config.custodian_url.clone(),
        platform: config.ledger.platform.clone(),
        interval: Duration::from_secs(config.dispatch_interval_secs),
    });
    let dispatcher_task = tokio::spawn(custodian::run(dispatcher, shutdown.clone()));

    // ─── REST API ─────────────────────────────────────────
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    dispatcher_task.await?;
    Ok(())
}
