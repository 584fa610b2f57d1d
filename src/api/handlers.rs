use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::domain::{Direction, Guess, Player};
use crate::error::GameError;

/// Error wrapper mapping domain failures onto HTTP responses.
///
/// A pending-guess conflict carries the holder's id so the client can
/// poll the guess that blocks them.
pub struct ApiError(GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            GameError::PendingGuessExists {
                pending_guess_id, ..
            } => (
                StatusCode::CONFLICT,
                Json(json!({
                    "statusCode": 409,
                    "message": "Player already has a pending guess",
                    "pendingGuessId": pending_guess_id,
                })),
            )
                .into_response(),
            GameError::GuessNotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Guess not found" })),
            )
                .into_response(),
            err => {
                error!("request failed: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaceGuessRequest {
    pub direction: Direction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: i64,
    pub database_connected: bool,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_connected = match &state.store {
        Some(store) => store.health_check().await,
        None => true,
    };

    let status_code = if database_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if database_connected {
                "healthy"
            } else {
                "degraded"
            },
            timestamp: Utc::now(),
            uptime_seconds: state.uptime_seconds(),
            database_connected,
        }),
    )
}

/// POST /players
pub async fn create_player(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Player>), ApiError> {
    let player = state.orchestrator.create_player().await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// GET /players/:player_id
pub async fn get_player(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<Player>, ApiError> {
    let player = state.orchestrator.get_player(&player_id).await?;
    Ok(Json(player))
}

/// POST /players/:player_id/guesses
pub async fn place_guess(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Json(request): Json<PlaceGuessRequest>,
) -> Result<(StatusCode, Json<Guess>), ApiError> {
    let guess = state
        .orchestrator
        .place_guess(&player_id, request.direction)
        .await?;
    Ok((StatusCode::CREATED, Json(guess)))
}

/// GET /players/:player_id/guesses
pub async fn list_guesses(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<Vec<Guess>>, ApiError> {
    let guesses = state.orchestrator.list_guesses(&player_id).await?;
    Ok(Json(guesses))
}

/// GET /players/:player_id/guesses/:guess_id
pub async fn get_guess(
    State(state): State<AppState>,
    Path((_player_id, guess_id)): Path<(String, Uuid)>,
) -> Result<Json<Guess>, ApiError> {
    let guess = state
        .orchestrator
        .get_guess(guess_id)
        .await?
        .ok_or(GameError::GuessNotFound(guess_id))?;
    Ok(Json(guess))
}
