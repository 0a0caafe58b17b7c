//! HTTP API endpoints and router assembly.
//!
//! All gameplay routes require a bearer token issued by `/api/register`.
//! The admin surface sits behind HTTP Basic Auth.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{self, AdminConfig, AuthedUser, UserRegistry};
use crate::error::GameError;
use crate::game::GameService;
use crate::limit::{self, RateLimiter};
use crate::protocol::{
    JoinResponse, LastResultResponse, MyScoreResponse, RegisterRequest, RegisterResponse,
    RoundInfo, ScoreboardResponse, SubmissionInfo, SubmitRequest, VoteRequest,
};
use crate::types::UnknownTermEntry;

/// Shared application state behind every handler.
pub struct AppState {
    pub game: GameService,
    pub users: UserRegistry,
}

/// Register a display name and receive a bearer token.
///
/// POST /api/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, GameError> {
    let name = req.display_name.trim();
    if name.is_empty() {
        return Err(GameError::Validation(
            "display_name must not be empty".to_string(),
        ));
    }
    let user = state.users.register(name).await;
    tracing::info!(user_id = %user.id, "Registered player");
    Ok(Json(RegisterResponse {
        user_id: user.id,
        token: user.token,
    }))
}

/// Join the game: become a participant of a fresh round, or queue for the
/// next one if a round is already running.
///
/// POST /api/join
pub async fn join(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
) -> Result<Json<JoinResponse>, GameError> {
    let outcome = state.game.join(&user.id).await?;
    Ok(Json(JoinResponse::from_outcome(outcome, Utc::now())))
}

/// Current round state, or 204 when no round is running.
///
/// GET /api/round
pub async fn current_round(
    State(state): State<Arc<AppState>>,
    AuthedUser(_): AuthedUser,
) -> Result<Response, GameError> {
    match state.game.current_round().await? {
        Some(round) => Ok(Json(RoundInfo::from_round(round, Utc::now())).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Submit an answer for one category of the running round.
///
/// POST /api/submit
pub async fn submit(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmissionInfo>, GameError> {
    if req.text.trim().is_empty() {
        return Err(GameError::Validation("text must not be empty".to_string()));
    }
    let submission = state
        .game
        .submit(&user.id, &req.category_id, &req.text)
        .await?;
    Ok(Json(submission.into()))
}

/// Vote on an unknown term during the voting phase.
///
/// POST /api/vote
pub async fn vote(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Json(req): Json<VoteRequest>,
) -> Result<Json<UnknownTermEntry>, GameError> {
    let entry = state
        .game
        .vote_unknown(&user.id, &req.category_id, &req.normalized_text, req.value)
        .await?;
    Ok(Json(entry))
}

/// List the unknown terms currently up for vote.
///
/// GET /api/unknown-terms
pub async fn unknown_terms(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
) -> Result<Json<Vec<UnknownTermEntry>>, GameError> {
    let entries = state.game.unknown_terms(&user.id).await?;
    Ok(Json(entries))
}

const DEFAULT_SCOREBOARD_LIMIT: usize = 20;
const MAX_SCOREBOARD_LIMIT: usize = 100;

/// Persistent highscores plus live per-round estimates.
///
/// GET /api/scoreboard?limit=N
pub async fn scoreboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ScoreboardResponse>, GameError> {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_SCOREBOARD_LIMIT)
        .min(MAX_SCOREBOARD_LIMIT);
    let (highscores, live) = state.game.scoreboard(limit).await?;
    Ok(Json(ScoreboardResponse { highscores, live }))
}

/// The caller's accumulated total.
///
/// GET /api/me/score
pub async fn my_score(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
) -> Result<Json<MyScoreResponse>, GameError> {
    let total_points = state.game.my_total(&user.id).await?;
    Ok(Json(MyScoreResponse {
        user_id: user.id,
        total_points,
    }))
}

/// The caller's result breakdown from their last finalized round.
///
/// GET /api/me/last-result
pub async fn my_last_result(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
) -> Result<Json<LastResultResponse>, GameError> {
    let last_result = state.game.my_last_result(&user.id).await?;
    Ok(Json(LastResultResponse {
        user_id: user.id,
        last_result,
    }))
}

/// Finalize the running round (if any) and start a new one immediately.
///
/// POST /api/admin/force-round
pub async fn force_round(State(state): State<Arc<AppState>>) -> Result<Response, GameError> {
    let round = state.game.force_new_round().await?;
    tracing::info!(number = round.number, letter = %round.letter, "Forced new round");
    Ok(Json(RoundInfo::from_round(round, Utc::now())).into_response())
}

/// Assemble the full router with middleware layers applied.
pub fn build_router(
    state: Arc<AppState>,
    admin_config: Arc<AdminConfig>,
    rate_limiter: Arc<RateLimiter>,
) -> Router {
    // Write endpoints get the rate limit; reads stay cheap and unthrottled
    let limited_routes = Router::new()
        .route("/api/submit", post(submit))
        .route("/api/vote", post(vote))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            limit::rate_limit_middleware,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/force-round", post(force_round))
        .layer(middleware::from_fn_with_state(
            admin_config,
            auth::admin_auth_middleware,
        ));

    Router::new()
        .route("/api/register", post(register))
        .route("/api/join", post(join))
        .route("/api/round", get(current_round))
        .route("/api/unknown-terms", get(unknown_terms))
        .route("/api/scoreboard", get(scoreboard))
        .route("/api/me/score", get(my_score))
        .route("/api/me/last-result", get(my_last_result))
        .merge(limited_routes)
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
