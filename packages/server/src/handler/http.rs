//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::state::{AppState, RegisteredPlayer};

/// Body of `POST /api/players/register`
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
}

/// Error body; clients show `message` to the user
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Register a player name
pub async fn register_player(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredPlayer>), (StatusCode, Json<ErrorResponse>)> {
    let name = request.name.trim();
    if name.is_empty() {
        tracing::warn!("Rejected registration with an empty name");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                message: "player name is required".to_string(),
            }),
        ));
    }

    let player = RegisteredPlayer {
        name: name.to_string(),
        registered_at: chrono::Utc::now().to_rfc3339(),
    };
    state.players.lock().await.push(player.clone());
    tracing::info!("Player '{}' registered", player.name);

    Ok((StatusCode::CREATED, Json(player)))
}

/// List registered players
pub async fn list_players(State(state): State<Arc<AppState>>) -> Json<Vec<RegisteredPlayer>> {
    Json(state.players.lock().await.clone())
}
