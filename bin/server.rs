// Covenant Enforcement - JSON API
// Exposes the enforcement core over HTTP with Axum

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use covenant_enforcement::{
    Arrears, CureTrack, DashboardSummary, Database, DeadlineEntry, DeadlineStatus,
    EnforcementConfig, EnforcementEngine, EnforcementError, EnforcementLogEntry,
    LenderResearchSummary, Parcel, ParcelFigures, ParcelStatus, ParcelStore, PendingAction, RankedParcel, SettlementQuote,
    TransitionContext,
};

#[derive(Parser)]
#[command(name = "enforcement-server", version)]
struct Args {
    #[arg(long, env = "ENFORCEMENT_DB", default_value = "enforcement.db")]
    db: PathBuf,

    #[arg(long, env = "ENFORCEMENT_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "ENFORCEMENT_ADDR", default_value = "0.0.0.0:3000")]
    addr: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    engine: Arc<EnforcementEngine>,
}

impl AppState {
    fn db(&self) -> Result<MutexGuard<'_, Database>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: String) -> Self {
        Self { status, message }
    }
}

impl From<EnforcementError> for ApiError {
    fn from(err: EnforcementError) -> Self {
        let status = match &err {
            EnforcementError::ParcelNotFound { .. } => StatusCode::NOT_FOUND,
            EnforcementError::InvalidSettlement { .. }
            | EnforcementError::BelowPolicyFloor { .. }
            | EnforcementError::IllegalTransition { .. }
            | EnforcementError::NoApplicableRate { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EnforcementError::InvariantViolation { .. } => StatusCode::CONFLICT,
            EnforcementError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", err);
        }
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("{:#}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Deserialize)]
struct AsOfQuery {
    as_of: Option<NaiveDate>,
}

impl AsOfQuery {
    fn date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

#[derive(Deserialize)]
struct ParcelQuery {
    status: Option<ParcelStatus>,
    as_of: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct RateQuery {
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct QuoteQuery {
    tier: Option<String>,
    as_of: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct LogQuery {
    parcel_id: Option<i64>,
}

#[derive(Deserialize)]
struct ValidateRequest {
    amount: f64,
    as_of: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct TransitionRequest {
    status: ParcelStatus,
    #[serde(default)]
    settlement_amount: Option<f64>,
    #[serde(default)]
    settlement_tier: Option<String>,
    #[serde(default)]
    delinquent_since: Option<NaiveDate>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    as_of: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct PacketSentRequest {
    sent_on: NaiveDate,
    #[serde(default)]
    tracking: Option<String>,
    #[serde(default)]
    track: Option<CureTrack>,
}

#[derive(Serialize)]
struct ParcelDetail {
    parcel: Parcel,
    figures: ParcelFigures,
    pending: Vec<String>,
}

#[derive(Serialize)]
struct RateResponse {
    date: NaiveDate,
    weekly_rate: f64,
}

#[derive(Serialize)]
struct ShareResponse {
    parcel_id: i64,
    sqft: u32,
    share: f64,
}

#[derive(Serialize)]
struct DeadlineStatusResponse {
    parcel_id: i64,
    as_of: NaiveDate,
    status: DeadlineStatus,
}

#[derive(Serialize)]
struct ValidateResponse {
    parcel_id: i64,
    amount: f64,
    accepted: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/parcels?status=&as_of=
async fn list_parcels(State(state): State<AppState>, Query(q): Query<ParcelQuery>) -> ApiResult<Vec<ParcelFigures>> {
    let as_of = AsOfQuery { as_of: q.as_of }.date();
    let db = state.db()?;
    let parcels: Vec<Parcel> = db
        .parcels()?
        .into_iter()
        .filter(|p| q.status.map_or(true, |s| p.status == s))
        .collect();
    let credits = db.credits(None)?;
    ok(state.engine.all_figures(&parcels, &credits, as_of)?)
}

/// GET /api/parcels/:id
async fn get_parcel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(q): Query<AsOfQuery>,
) -> ApiResult<ParcelDetail> {
    let db = state.db()?;
    let parcel = db.parcel(id)?;
    let credits = db.credits(Some(id))?;
    let figures = state.engine.parcel_figures(&parcel, &credits, q.date())?;
    let pending = state
        .engine
        .pending_actions(&parcel, &credits, q.date())?
        .iter()
        .map(PendingAction::describe)
        .collect();
    ok(ParcelDetail { parcel, figures, pending })
}

/// GET /api/parcels/:id/arrears
async fn get_arrears(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(q): Query<AsOfQuery>,
) -> ApiResult<Arrears> {
    let db = state.db()?;
    let parcel = db.parcel(id)?;
    let credits = db.credits(Some(id))?;
    ok(state.engine.compute_arrears(&parcel, &credits, q.date())?)
}

/// GET /api/parcels/:id/share
async fn get_share(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ShareResponse> {
    let parcel = state.db()?.parcel(id)?;
    let share = state.engine.pro_rata_share(&parcel)?;
    ok(ShareResponse {
        parcel_id: id,
        sqft: parcel.sqft,
        share,
    })
}

/// GET /api/parcels/:id/deadline-status
async fn get_deadline_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(q): Query<AsOfQuery>,
) -> ApiResult<DeadlineStatusResponse> {
    let db = state.db()?;
    let parcel = db.parcel(id)?;
    let credits = db.credits(Some(id))?;
    let status = state.engine.deadline_status(&parcel, &credits, q.date())?;
    ok(DeadlineStatusResponse {
        parcel_id: id,
        as_of: q.date(),
        status,
    })
}

/// GET /api/parcels/:id/settlement?tier= - one tier, or every tier when none is given
async fn get_settlement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(q): Query<QuoteQuery>,
) -> ApiResult<Vec<SettlementQuote>> {
    let as_of = AsOfQuery { as_of: q.as_of }.date();
    let db = state.db()?;
    let parcel = db.parcel(id)?;
    let credits = db.credits(Some(id))?;

    let quotes = match q.tier.as_deref() {
        Some(tier) => vec![state.engine.propose_settlement(&parcel, &credits, tier, as_of)?],
        None => {
            let owed = state.engine.compute_arrears(&parcel, &credits, as_of)?.amount;
            state.engine.settlement().quote_all(owed)
        }
    };
    ok(quotes)
}

/// POST /api/parcels/:id/settlement/validate
async fn validate_settlement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<ValidateResponse> {
    let as_of = AsOfQuery { as_of: req.as_of }.date();
    let db = state.db()?;
    let parcel = db.parcel(id)?;
    let credits = db.credits(Some(id))?;
    state
        .engine
        .validate_settlement(&parcel, &credits, req.amount, as_of)?;
    ok(ValidateResponse {
        parcel_id: id,
        amount: req.amount,
        accepted: true,
    })
}

/// POST /api/parcels/:id/transition
async fn transition(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<EnforcementLogEntry> {
    let ctx = TransitionContext {
        as_of: AsOfQuery { as_of: req.as_of }.date(),
        settlement_amount: req.settlement_amount,
        settlement_tier: req.settlement_tier,
        delinquent_since: req.delinquent_since,
        note: req.note,
    };
    let mut db = state.db()?;
    let entry = state.engine.transition(&mut *db, id, req.status, &ctx)?;
    ok(entry)
}

/// POST /api/parcels/:id/packet-sent
async fn packet_sent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PacketSentRequest>,
) -> ApiResult<EnforcementLogEntry> {
    let mut db = state.db()?;
    let entry = state
        .engine
        .machine()
        .record_packet_sent(&mut *db, id, req.sent_on, req.tracking.as_deref(), req.track)?;
    ok(entry)
}

/// GET /api/rate?date=
async fn get_rate(State(state): State<AppState>, Query(q): Query<RateQuery>) -> ApiResult<RateResponse> {
    let date = q.date.unwrap_or_else(|| chrono::Local::now().date_naive());
    ok(RateResponse {
        date,
        weekly_rate: state.engine.current_rate(date)?,
    })
}

/// GET /api/rank
async fn rank(State(state): State<AppState>, Query(q): Query<AsOfQuery>) -> ApiResult<Vec<RankedParcel>> {
    let db = state.db()?;
    let parcels = db.parcels()?;
    let credits = db.credits(None)?;
    let ranking = state.engine.rank_delinquent(&parcels, &credits, q.date())?;
    ok(ranking.into_iter().collect())
}

/// GET /api/deadlines
async fn deadlines(State(state): State<AppState>, Query(q): Query<AsOfQuery>) -> ApiResult<Vec<DeadlineEntry>> {
    let parcels = state.db()?.parcels()?;
    ok(state.engine.machine().deadline_board(&parcels, q.date()))
}

/// GET /api/summary
async fn summary(State(state): State<AppState>, Query(q): Query<AsOfQuery>) -> ApiResult<DashboardSummary> {
    let db = state.db()?;
    let parcels = db.parcels()?;
    let credits = db.credits(None)?;
    let log_entries = db.log_count()?;
    ok(state.engine.summary(&parcels, &credits, log_entries, q.date())?)
}

/// GET /api/lenders
async fn lenders(State(state): State<AppState>) -> ApiResult<LenderResearchSummary> {
    let parcels = state.db()?.parcels()?;
    ok(state.engine.lender_research(&parcels))
}

/// GET /api/log?parcel_id=
async fn log(State(state): State<AppState>, Query(q): Query<LogQuery>) -> ApiResult<Vec<EnforcementLogEntry>> {
    ok(state.db()?.log_entries(q.parcel_id)?)
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/parcels", get(list_parcels))
        .route("/parcels/:id", get(get_parcel))
        .route("/parcels/:id/arrears", get(get_arrears))
        .route("/parcels/:id/share", get(get_share))
        .route("/parcels/:id/deadline-status", get(get_deadline_status))
        .route("/parcels/:id/settlement", get(get_settlement))
        .route("/parcels/:id/settlement/validate", post(validate_settlement))
        .route("/parcels/:id/transition", post(transition))
        .route("/parcels/:id/packet-sent", post(packet_sent))
        .route("/rate", get(get_rate))
        .route("/rank", get(rank))
        .route("/deadlines", get(deadlines))
        .route("/summary", get(summary))
        .route("/lenders", get(lenders))
        .route("/log", get(log))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    if !args.db.exists() {
        eprintln!("❌ Database not found at {:?}", args.db);
        eprintln!("   Run: covenant-enforcement --db {:?} init", args.db);
        std::process::exit(1);
    }

    let config = EnforcementConfig::load(args.config.as_deref())?;
    let db = Database::open(&args.db)?;
    let engine = EnforcementEngine::for_store(config, &db)?;
    info!(db = ?args.db, "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        engine: Arc::new(engine),
    };

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!(addr = %args.addr, "enforcement API listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
