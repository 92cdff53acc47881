//! Axum-based HTTP API for accounts and task lists.
//!
//! - Request body size limit (64KB)
//! - Request timeout (30s)
//! - Bearer-token authentication on every `/api/todos` route
//! - Errors rendered as `{"error": "..."}` with the status from [`TodoError`]

use crate::auth::{AccountStore, AuthService, Identity, TokenSigner};
use crate::config::Config;
use crate::error::TodoError;
use crate::storage::Database;
use crate::tasks::{Task, TaskStore};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub tasks: Arc<TaskStore>,
    /// Whether new account registration is allowed.
    pub allow_registration: bool,
}

impl AppState {
    pub fn new(db: Database, signer: TokenSigner, allow_registration: bool) -> Self {
        Self {
            auth: Arc::new(AuthService::new(AccountStore::new(db.clone()), signer)),
            tasks: Arc::new(TaskStore::new(db)),
            allow_registration,
        }
    }
}

/// Build the router with all routes and middleware layers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/register", post(handle_register))
        .route("/api/login", post(handle_login))
        .route("/api/todos", get(handle_list_todos).post(handle_create_todo))
        // Static segment wins over `{id}` in the matcher.
        .route("/api/todos/reorder", patch(handle_reorder_todos))
        .route(
            "/api/todos/{id}",
            patch(handle_toggle_todo).delete(handle_delete_todo),
        )
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP API until Ctrl+C.
pub async fn run_gateway(config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path())
        .with_context(|| format!("opening {}", config.database_path().display()))?;

    let secret = match config.auth.token_secret.as_deref() {
        Some(secret) => secret.as_bytes().to_vec(),
        None => crate::auth::token::load_or_generate_secret(&config.token_key_path())?,
    };
    let signer = TokenSigner::new(secret, Some(config.auth.token_ttl_secs));
    let state = AppState::new(db, signer, config.auth.allow_registration);

    let host = config.gateway.host.as_str();
    let listener = tokio::net::TcpListener::bind((host, config.gateway.port))
        .await
        .with_context(|| format!("binding {host}:{}", config.gateway.port))?;
    let local = listener.local_addr()?;

    tracing::info!(addr = %local, "task API listening");
    println!("Task API listening on http://{local}");
    println!("  POST   /api/register       - create an account");
    println!("  POST   /api/login          - get a bearer token");
    println!("  GET    /api/todos          - list tasks");
    println!("  POST   /api/todos          - create a task");
    println!("  PATCH  /api/todos/{{id}}     - toggle completion");
    println!("  DELETE /api/todos/{{id}}     - delete a task");
    println!("  PATCH  /api/todos/reorder  - {{\"orderedIds\": [...]}}");
    println!("  GET    /health             - health check");
    println!("  Press Ctrl+C to stop.\n");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("task API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// REQUEST HELPERS
// ══════════════════════════════════════════════════════════════════════════════

/// Concrete return type for handlers that answer with an ad-hoc JSON object.
type JsonResponse = Result<(StatusCode, Json<serde_json::Value>), TodoError>;

/// Request body for registration and login. Missing fields are reported by
/// the auth layer, not by serde.
#[derive(Debug, Default, Deserialize)]
struct CredentialsBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateTodoBody {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ReorderBody {
    #[serde(rename = "orderedIds")]
    ordered_ids: Vec<i64>,
}

/// Extract bearer token from Authorization header.
///
/// `Ok(None)` when no credential was sent. Any scheme other than Bearer
/// (matched case-insensitively) is a credential we cannot accept.
fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<&str>, TodoError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| TodoError::Forbidden("Malformed Authorization header".into()))?
        .trim();
    if value.is_empty() || value.eq_ignore_ascii_case("bearer") {
        return Ok(None);
    }
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(Some(token.trim())),
        _ => Err(TodoError::Forbidden(
            "Unsupported authorization scheme".into(),
        )),
    }
}

fn require_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, TodoError> {
    let identity = extract_bearer_token(headers).and_then(|token| state.auth.authenticate(token));
    match &identity {
        Ok(identity) => tracing::debug!(
            account_id = identity.account_id,
            username = %identity.username,
            "authenticated request"
        ),
        Err(e) => tracing::debug!(status = %e.status(), "rejected request: {e}"),
    }
    identity
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, TodoError> {
    body.map(|Json(b)| b)
        .map_err(|e| TodoError::Validation(format!("Invalid request: {}", e.body_text())))
}

fn task_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, TodoError> {
    id.map(|Path(id)| id)
        .map_err(|_| TodoError::Validation("Task id must be an integer".into()))
}

/// Run CPU-heavy auth work (password stretching) off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, TodoError>
where
    F: FnOnce() -> Result<T, TodoError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TodoError::Internal(format!("auth task panicked: {e}")))?
}

// ══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health: always public
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/register: create a new account. No token is issued.
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> JsonResponse {
    if !state.allow_registration {
        return Err(TodoError::Forbidden("Registration is disabled".into()));
    }
    let body = json_body(body)?;

    let auth = Arc::clone(&state.auth);
    let username = body.username.trim().to_string();
    let password = body.password;
    let registered = username.clone();
    blocking(move || auth.register(&username, &password)).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "registered",
            "username": registered,
        })),
    ))
}

/// POST /api/login: exchange credentials for a bearer token.
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> JsonResponse {
    let body = json_body(body)?;

    let auth = Arc::clone(&state.auth);
    let outcome = blocking(move || auth.login(&body.username, &body.password)).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "token": outcome.token,
            "username": outcome.username,
        })),
    ))
}

/// GET /api/todos: tasks of the caller, ordered by position.
async fn handle_list_todos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Task>>, TodoError> {
    let identity = require_identity(&state, &headers)?;
    Ok(Json(state.tasks.list(identity.account_id)?))
}

/// POST /api/todos: append a task.
async fn handle_create_todo(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateTodoBody>, JsonRejection>,
) -> Result<Json<Task>, TodoError> {
    let identity = require_identity(&state, &headers)?;
    let body = json_body(body)?;
    Ok(Json(state.tasks.create(identity.account_id, &body.text)?))
}

/// PATCH /api/todos/{id}: flip completion.
async fn handle_toggle_todo(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Task>, TodoError> {
    let identity = require_identity(&state, &headers)?;
    let id = task_id(id)?;
    Ok(Json(state.tasks.toggle(identity.account_id, id)?))
}

/// DELETE /api/todos/{id}
async fn handle_delete_todo(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> JsonResponse {
    let identity = require_identity(&state, &headers)?;
    let id = task_id(id)?;
    state.tasks.delete(identity.account_id, id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "status": "deleted", "id": id })),
    ))
}

/// PATCH /api/todos/reorder: `{"orderedIds": [...]}` in final display order.
async fn handle_reorder_todos(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ReorderBody>, JsonRejection>,
) -> JsonResponse {
    let identity = require_identity(&state, &headers)?;
    let body = json_body(body)?;
    let summary = state.tasks.reorder(identity.account_id, &body.ordered_ids)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "reordered",
            "applied": summary.applied,
            "appended": summary.appended,
            "skipped": summary.skipped,
        })),
    ))
}
