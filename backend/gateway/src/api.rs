//! Axum REST API handlers.
//!
//! Every mutating request takes the engine lock, runs one ledger operation
//! and journals its receipt before the lock is released, so the journal
//! order is the commit order. The receipt and the ledger state it leaves
//! behind are written in one SQLite transaction; if that write fails the
//! engine is rolled back to where it was before the operation, so a failed
//! reply never hides a committed operation.
//!
//! `POST /transfers` credits accounts, so it only accepts requests that
//! carry the custodian's shared secret in [`CUSTODIAN_TOKEN_HEADER`].

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use grassroots::{
    Account, Caller, Contribution, Deposit, DepositOutcome, Grassroots, Name, Project, Receipt,
    Storage,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::db;
use crate::errors::{GatewayError, Result};
use crate::journal::EventRecord;

/// Header carrying the principal proven by the upstream authentication layer.
pub const PRINCIPAL_HEADER: &str = "x-grassroots-principal";

/// Header carrying the secret shared with the custodial currency system.
pub const CUSTODIAN_TOKEN_HEADER: &str = "x-grassroots-custodian-token";

pub struct ApiState {
    pub engine: Mutex<Grassroots>,
    pub pool: SqlitePool,
    pub custodian_secret: String,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/actions/:name", post(post_action))
        .route("/transfers", post(post_transfer))
        .route("/accounts/:name", get(get_account))
        .route("/projects/:name", get(get_project))
        .route("/projects/:name/contributions", get(get_project_contributions))
        .route("/projects/:name/events", get(get_project_events))
        .route(
            "/contributors/:name/contributions",
            get(get_contributor_contributions),
        )
        .route("/categories/:name/projects", get(get_category_projects))
        .route("/events", get(get_all_events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub outcome: DepositOutcome,
    pub receipt: Receipt,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        ListResponse {
            count: items.len(),
            items,
        }
    }
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub count: usize,
    pub events: Vec<EventRecord>,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /actions/:name`
///
/// Runs the named ledger action on behalf of the principal in
/// [`PRINCIPAL_HEADER`]; the body is the action's JSON payload.
pub async fn post_action(
    State(state): State<Arc<ApiState>>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Receipt>> {
    let principal = principal_from(&headers)?;

    let mut engine = state.engine.lock().await;
    let checkpoint = engine.checkpoint();
    let receipt = engine.dispatch(Caller::User(principal.clone()), &action, payload)?;
    journal_or_rollback(
        &mut engine,
        checkpoint,
        &state.pool,
        &action,
        principal.as_str(),
        &receipt,
    )
    .await?;
    Ok(Json(receipt))
}

/// `POST /transfers`
///
/// Deposit notification from the custodial currency system.
pub async fn post_transfer(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(deposit): Json<Deposit>,
) -> Result<Json<TransferResponse>> {
    require_custodian(&headers, &state.custodian_secret)?;

    let mut engine = state.engine.lock().await;
    let checkpoint = engine.checkpoint();
    let (outcome, receipt) = engine.on_transfer(&deposit)?;
    journal_or_rollback(
        &mut engine,
        checkpoint,
        &state.pool,
        "transfer",
        &Caller::Platform.to_string(),
        &receipt,
    )
    .await?;
    Ok(Json(TransferResponse { outcome, receipt }))
}

/// `GET /accounts/:name`
pub async fn get_account(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<Account>> {
    let id = parse_name(&name)?;
    let engine = state.engine.lock().await;
    engine
        .account(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(grassroots::Entity::Account, &id))
}

/// `GET /projects/:name`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<Project>> {
    let id = parse_name(&name)?;
    let engine = state.engine.lock().await;
    engine
        .project(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(grassroots::Entity::Project, &id))
}

/// `GET /projects/:name/contributions`
pub async fn get_project_contributions(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<ListResponse<Contribution>>> {
    let id = parse_name(&name)?;
    let engine = state.engine.lock().await;
    if engine.project(&id).is_none() {
        return Err(not_found(grassroots::Entity::Project, &id));
    }
    let rows: Vec<Contribution> = engine
        .contributions_for_project(&id)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(rows.into()))
}

/// `GET /contributors/:name/contributions`
pub async fn get_contributor_contributions(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<ListResponse<Contribution>>> {
    let id = parse_name(&name)?;
    let engine = state.engine.lock().await;
    let rows: Vec<Contribution> = engine
        .contributions_by_contributor(&id)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(rows.into()))
}

/// `GET /categories/:name/projects`
pub async fn get_category_projects(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<ListResponse<Project>>> {
    let id = parse_name(&name)?;
    let engine = state.engine.lock().await;
    let rows: Vec<Project> = engine
        .projects_by_category(&id)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(rows.into()))
}

/// `GET /projects/:name/events`
pub async fn get_project_events(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<EventsResponse>> {
    let events = db::get_events_for_project(&state.pool, &name).await?;
    Ok(Json(EventsResponse {
        count: events.len(),
        events,
    }))
}

/// `GET /events`
pub async fn get_all_events(State(state): State<Arc<ApiState>>) -> Result<Json<EventsResponse>> {
    let events = db::get_all_events(&state.pool).await?;
    Ok(Json(EventsResponse {
        count: events.len(),
        events,
    }))
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

/// Journal `receipt` with the engine's new state, or undo the operation that
/// produced it.
async fn journal_or_rollback(
    engine: &mut Grassroots,
    checkpoint: Storage,
    pool: &SqlitePool,
    action: &str,
    caller: &str,
    receipt: &Receipt,
) -> Result<()> {
    let written = db::record_receipt(
        pool,
        action,
        caller,
        receipt,
        &engine.snapshot(),
        Utc::now().timestamp(),
    )
    .await;
    if let Err(e) = written {
        warn!(action, caller, "Journal write failed, rolling back: {e}");
        engine.rollback(checkpoint);
        return Err(e);
    }
    Ok(())
}

fn require_custodian(headers: &HeaderMap, secret: &str) -> Result<()> {
    let presented = headers
        .get(CUSTODIAN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthenticated(CUSTODIAN_TOKEN_HEADER))?;
    if presented != secret {
        return Err(GatewayError::Forbidden(CUSTODIAN_TOKEN_HEADER));
    }
    Ok(())
}

fn principal_from(headers: &HeaderMap) -> Result<Name> {
    let raw = headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthenticated(PRINCIPAL_HEADER))?;
    parse_name(raw.trim())
}

fn parse_name(raw: &str) -> Result<Name> {
    Ok(Name::new(raw)?)
}

fn not_found(kind: grassroots::Entity, id: &Name) -> GatewayError {
    GatewayError::Ledger(grassroots::Error::NotFound {
        kind,
        id: id.to_string(),
    })
}
