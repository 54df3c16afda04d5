//! JSON HTTP API.
//!
//! Serves the idea catalog, on-demand validation, user contributions and
//! the visitor counter. Every `/api/*` route passes through the per-IP
//! rate limiter in [`crate::rate_limit`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/ideas` | Filtered, paginated idea list |
//! | `GET`  | `/api/ideas/{id}` | One idea |
//! | `POST` | `/api/ideas/search` | `{query, filters}` search, same shape as the list |
//! | `GET`  | `/api/ideas/tags/list` | Distinct tags, optionally filtered |
//! | `GET`  | `/api/ideas/stats/summary` | Catalog counters |
//! | `GET`  | `/api/ideas/export/excel` | Spreadsheet download |
//! | `GET`  | `/api/validation/idea/{id}` | Validate a stored idea (`refresh=true` or `force=true` recomputes) |
//! | `POST` | `/api/validation/validate` | Validate an ad-hoc `{name, description, tags}` |
//! | `GET`  | `/api/validation/status/{id}` | Stored validation status |
//! | `POST` | `/api/contributions/verify` | Record an existence report |
//! | `POST` | `/api/contributions/competitor` | Record a competitor |
//! | `POST` | `/api/contributions/saturation` | Record a saturation estimate |
//! | `GET`  | `/api/contributions/idea/{id}` | Contributions for an idea |
//! | `GET`  | `/api/visitors/count` | Visitor counters |
//! | `POST` | `/api/visitors/increment` | Count a visit |
//! | `GET`  | `/api/health` | Health check |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Idea not found", "code": "not_found", "id": 42 }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `rate_limited` (429),
//! `internal` (500). Internal errors carry a `message` with the cause only
//! when `server.development` is set.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::{header, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use ideavoid_core::models::{Idea, ValidationOutcome};
use ideavoid_core::search::SearchValidator;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::contributions::{Contribution, ContributionKind, ContributionLog, Submission};
use crate::export;
use crate::rate_limit::{rate_limit_middleware, ClientIp, RateLimiter};
use crate::repository::{IdeaQuery, IdeaRepository};
use crate::service::ValidationService;
use crate::visitors::VisitorCounter;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    repository: Arc<IdeaRepository>,
    service: Arc<ValidationService>,
    contributions: Arc<ContributionLog>,
    visitors: Arc<VisitorCounter>,
    limiter: RateLimiter,
}

impl AppState {
    /// Opens the catalog and wires the configured validators.
    ///
    /// An unreadable ideas file is not fatal: the server starts with an
    /// empty catalog and ad-hoc validation still works.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let repository = Arc::new(IdeaRepository::open_or_empty(&config.data.ideas_path));
        let service = ValidationService::from_config(config, Arc::clone(&repository))?;
        Ok(Self::assemble(config, repository, service))
    }

    /// Like [`from_config`](Self::from_config) with an explicit repository
    /// and search validator.
    pub fn with_search(
        config: &Config,
        repository: Arc<IdeaRepository>,
        search: Arc<dyn SearchValidator>,
    ) -> Self {
        let aggregator = Aggregator::with_search(config.validation.internal_enabled, search);
        let service = ValidationService::new(
            aggregator,
            Arc::clone(&repository),
            Duration::from_secs(config.validation.cache_ttl_secs),
        );
        Self::assemble(config, repository, service)
    }

    fn assemble(
        config: &Config,
        repository: Arc<IdeaRepository>,
        service: ValidationService,
    ) -> Self {
        Self {
            config: Arc::new(config.clone()),
            repository,
            service: Arc::new(service),
            contributions: Arc::new(ContributionLog::new(&config.data.contributions_path)),
            visitors: Arc::new(VisitorCounter::new(&config.data.visitors_path)),
            limiter: RateLimiter::new(
                config.server.rate_limit_requests,
                Duration::from_secs(config.server.rate_limit_window_secs),
            ),
        }
    }

    pub fn service(&self) -> &Arc<ValidationService> {
        &self.service
    }

    fn internal(&self, message: &str, err: anyhow::Error) -> ApiError {
        tracing::error!(error = %format!("{:#}", err), "{}", message);
        let error = ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message);
        if self.config.server.development {
            error.with("message", format!("{:#}", err))
        } else {
            error
        }
    }
}

/// Builds the router with CORS and rate limiting applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/ideas", get(list_ideas))
        .route("/ideas/search", post(search_ideas))
        .route("/ideas/tags/list", get(list_tags))
        .route("/ideas/stats/summary", get(stats_summary))
        .route("/ideas/export/excel", get(export_excel))
        .route("/ideas/{id}", get(get_idea))
        .route("/validation/idea/{id}", get(validate_stored))
        .route("/validation/validate", post(validate_adhoc))
        .route("/validation/status/{id}", get(validation_status))
        .route("/contributions/verify", post(submit_verification))
        .route("/contributions/competitor", post(submit_competitor))
        .route("/contributions/saturation", post(submit_saturation))
        .route("/contributions/idea/{id}", get(contributions_for_idea))
        .route("/visitors/count", get(visitor_count))
        .route("/visitors/increment", post(visitor_increment))
        .route("/health", get(health))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/", get(index))
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(cors)
        .with_state(state)
}

/// Starts the server on `[server].bind` and runs until Ctrl-C or SIGTERM.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    eprintln!("ideavoid listening on http://{}", listener.local_addr()?);
    eprintln!(
        "  rate limit: {} requests per {}s per IP",
        config.server.rate_limit_requests, config.server.rate_limit_window_secs
    );
    eprintln!(
        "  external search: {}",
        if state.service.aggregator().search().is_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );

    serve(listener, state, shutdown_signal()).await
}

/// Serves `state` on `listener` until `shutdown` resolves, then releases
/// the search backend.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let limiter = state.limiter.clone();
    let period = Duration::from_secs(state.config.server.rate_limit_window_secs);
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            limiter.sweep(Utc::now());
        }
    });

    let search = Arc::clone(state.service.aggregator().search());
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    sweeper.abort();
    search.shutdown().await;
    tracing::info!("server stopped");
    result.context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

// ============ Errors ============

/// Error response: `{ "error": message, "code": code, ...extras }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    extras: Map<String, Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            extras: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extras.insert(key.to_string(), value.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("error".into(), Value::String(self.message));
        body.insert("code".into(), Value::String(self.code.to_string()));
        body.extend(self.extras);
        (self.status, Json(Value::Object(body))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "bad_request", msg)
}

fn not_found(msg: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not_found", msg)
}

fn idea_not_found(id: &str) -> ApiError {
    let id = id
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id));
    not_found("Idea not found").with("id", id)
}

async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking task failed")?
}

// ============ Ideas ============

async fn list_ideas(State(state): State<AppState>, Query(query): Query<IdeaQuery>) -> Response {
    let catalog = state.repository.snapshot();
    Json(catalog.query(&query)).into_response()
}

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    filters: Map<String, Value>,
}

/// Filter values arrive as JSON strings or numbers.
fn filter_text(filters: &Map<String, Value>, key: &str) -> Option<String> {
    match filters.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn search_ideas(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let query = IdeaQuery {
        search: req.query,
        tag: filter_text(&req.filters, "tag"),
        category: filter_text(&req.filters, "category"),
        page: filter_text(&req.filters, "page"),
        items_per_page: filter_text(&req.filters, "itemsPerPage"),
    };
    let catalog = state.repository.snapshot();
    Ok(Json(catalog.query(&query)).into_response())
}

async fn get_idea(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Idea>, ApiError> {
    let catalog = state.repository.snapshot();
    id.parse::<u64>()
        .ok()
        .and_then(|n| catalog.get(n).cloned())
        .map(Json)
        .ok_or_else(|| idea_not_found(&id))
}

#[derive(Deserialize)]
struct TagQuery {
    #[serde(default)]
    search: Option<String>,
}

async fn list_tags(State(state): State<AppState>, Query(q): Query<TagQuery>) -> Json<Value> {
    let catalog = state.repository.snapshot();
    Json(json!({ "tags": catalog.tags(q.search.as_deref()) }))
}

async fn stats_summary(State(state): State<AppState>) -> Response {
    let catalog = state.repository.snapshot();
    Json(catalog.stats()).into_response()
}

async fn export_excel(State(state): State<AppState>) -> Result<Response, ApiError> {
    let corpus = state.repository.snapshot().corpus();
    let bytes = blocking(move || export::build_workbook(&corpus))
        .await
        .map_err(|e| state.internal("Failed to export Excel", e))?;

    Ok((
        [
            (header::CONTENT_TYPE, export::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", export::FILE_NAME),
            ),
        ],
        bytes,
    )
        .into_response())
}

// ============ Validation ============

#[derive(Deserialize, Default)]
struct RefreshQuery {
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    force: Option<String>,
}

impl RefreshQuery {
    fn forced(&self) -> bool {
        self.refresh.as_deref() == Some("true") || self.force.as_deref() == Some("true")
    }
}

async fn validate_stored(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<RefreshQuery>,
) -> Result<Json<ValidationOutcome>, ApiError> {
    let Ok(numeric) = id.parse::<u64>() else {
        return Err(bad_request("Invalid idea ID").with("id", id));
    };
    let catalog = state.repository.snapshot();
    let Some(idea) = catalog.get(numeric) else {
        tracing::warn!(id = numeric, "validation requested for unknown idea");
        return Err(idea_not_found(&id));
    };

    if q.forced() {
        tracing::info!(id = numeric, "force refreshing validation");
        return Ok(Json(state.service.validate_fresh(idea).await));
    }

    if let (Some(validation), Some(saturation)) = (&idea.validation, &idea.saturation) {
        return Ok(Json(ValidationOutcome {
            validation: validation.clone(),
            saturation: saturation.clone(),
        }));
    }

    Ok(Json(state.service.validate(idea).await))
}

#[derive(Deserialize)]
struct AdHocIdea {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

async fn validate_adhoc(
    State(state): State<AppState>,
    payload: Result<Json<AdHocIdea>, JsonRejection>,
) -> Result<Json<ValidationOutcome>, ApiError> {
    let Json(body) = payload?;
    let name = body.name.unwrap_or_default();
    let description = body.description.unwrap_or_default();
    if name.trim().is_empty() && description.trim().is_empty() {
        return Err(bad_request("Name or description required"));
    }
    let idea = Idea::new(name, description, body.tags);
    Ok(Json(state.service.validate(&idea).await))
}

async fn validation_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let catalog = state.repository.snapshot();
    let idea = id
        .parse::<u64>()
        .ok()
        .and_then(|n| catalog.get(n))
        .ok_or_else(|| idea_not_found(&id))?;

    let validation = idea.validation.as_ref();
    Ok(Json(json!({
        "status": validation.map_or("unverified", |v| v.status.as_str()),
        "sources": validation.map(|v| &v.sources).cloned().unwrap_or_default(),
        "aggregatedScore": validation.map(|v| &v.aggregated_score),
        "lastChecked": idea.saturation.as_ref().map(|s| s.last_verified),
    })))
}

// ============ Contributions ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerificationRequest {
    #[serde(flatten)]
    submission: Submission,
    #[serde(default)]
    exists: Option<bool>,
    #[serde(default)]
    competitor_links: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompetitorRequest {
    #[serde(flatten)]
    submission: Submission,
    #[serde(default)]
    competitor_name: Option<String>,
    #[serde(default)]
    competitor_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaturationRequest {
    #[serde(flatten)]
    submission: Submission,
    #[serde(default)]
    saturation_level: Option<String>,
    #[serde(default)]
    competitor_count: Option<u64>,
}

async fn record(
    state: AppState,
    ip: ClientIp,
    submission: Submission,
    kind: ContributionKind,
    failure: &'static str,
) -> Result<Json<Value>, ApiError> {
    let contribution = Contribution::new(submission, kind, Some(ip.0.to_string()))
        .ok_or_else(|| bad_request("Idea ID or name required"))?;
    let log = Arc::clone(&state.contributions);
    let saved = blocking(move || log.append(contribution))
        .await
        .map_err(|e| state.internal(failure, e))?;
    Ok(Json(json!({ "success": true, "contribution": saved })))
}

async fn submit_verification(
    State(state): State<AppState>,
    Extension(ip): Extension<ClientIp>,
    payload: Result<Json<VerificationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let kind = ContributionKind::Verification {
        exists: req.exists,
        competitor_links: req.competitor_links,
    };
    record(state, ip, req.submission, kind, "Failed to submit verification").await
}

async fn submit_competitor(
    State(state): State<AppState>,
    Extension(ip): Extension<ClientIp>,
    payload: Result<Json<CompetitorRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let kind = ContributionKind::Competitor {
        competitor_name: req.competitor_name.unwrap_or_default(),
        competitor_link: req.competitor_link.unwrap_or_default(),
    };
    record(state, ip, req.submission, kind, "Failed to submit competitor").await
}

async fn submit_saturation(
    State(state): State<AppState>,
    Extension(ip): Extension<ClientIp>,
    payload: Result<Json<SaturationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let kind = ContributionKind::Saturation {
        saturation_level: req.saturation_level.filter(|l| !l.is_empty()),
        competitor_count: req.competitor_count.filter(|n| *n > 0),
    };
    record(state, ip, req.submission, kind, "Failed to submit saturation").await
}

async fn contributions_for_idea(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let log = Arc::clone(&state.contributions);
    let found = blocking(move || log.for_idea(&id))
        .await
        .map_err(|e| state.internal("Failed to get contributions", e))?;
    Ok(Json(json!({ "contributions": found })))
}

// ============ Visitors ============

async fn visitor_count(State(state): State<AppState>) -> Result<Response, ApiError> {
    let visitors = Arc::clone(&state.visitors);
    let count = blocking(move || visitors.count())
        .await
        .map_err(|e| state.internal("Failed to get visitor count", e))?;
    Ok(Json(count).into_response())
}

async fn visitor_increment(
    State(state): State<AppState>,
    Extension(ip): Extension<ClientIp>,
) -> Result<Response, ApiError> {
    let visitors = Arc::clone(&state.visitors);
    let count = blocking(move || visitors.increment(Some(&ip.0.to_string())))
        .await
        .map_err(|e| state.internal("Failed to increment visitor count", e))?;
    Ok(Json(count).into_response())
}

// ============ Misc ============

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "IdeaAvoid API Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "ideas": "/api/ideas",
            "validation": "/api/validation",
            "contributions": "/api/contributions",
            "visitors": "/api/visitors",
        },
        "timestamp": Utc::now(),
    }))
}

async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    not_found("Not found").with(
        "message",
        format!("Route {} {} not found", method, uri.path()),
    )
}
