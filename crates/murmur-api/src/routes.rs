use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use murmur_types::api::{
    CommandRequest, CommandResponse, EventView, JoinRequest, JoinResponse, LogoutRequest, OkResponse,
    PollQuery, PollResponse, SendRequest, SendResponse,
};

use crate::AppState;
use crate::error::ChatError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/login", post(login))
        .route("/api/send", post(send))
        .route("/api/poll", get(poll))
        .route("/api/cmd", post(command))
        .route("/api/logout", post(logout))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

/// Malformed bodies and query strings are reported in the same JSON shape
/// as every other error.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ChatError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ChatError::Validation(rejection.body_text()))
}

pub async fn login(
    State(chat): State<AppState>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<JoinResponse>, ChatError> {
    let req = body(payload)?;
    let joined = chat.join(&req.nickname).await?;
    Ok(Json(JoinResponse {
        ok: true,
        token: joined.token,
        greeting: joined.greeting,
        room: joined.room,
    }))
}

pub async fn send(
    State(chat): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ChatError> {
    let req = body(payload)?;
    let id = chat.send(&req.token, &req.text).await?;
    Ok(Json(SendResponse { ok: true, id }))
}

pub async fn poll(
    State(chat): State<AppState>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> Result<Json<PollResponse>, ChatError> {
    let Query(query) = query.map_err(|rejection| ChatError::Validation(rejection.body_text()))?;
    let events = chat.poll(&query.token, query.after, query.limit)?;
    Ok(Json(PollResponse {
        ok: true,
        events: events.iter().map(EventView::from).collect(),
    }))
}

pub async fn command(
    State(chat): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, ChatError> {
    let req = body(payload)?;
    let text = chat.command(&req.token, &req.command).await?;
    Ok(Json(CommandResponse { ok: true, text }))
}

pub async fn logout(
    State(chat): State<AppState>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ChatError> {
    let req = body(payload)?;
    chat.leave(&req.token)?;
    Ok(Json(OkResponse { ok: true }))
}
