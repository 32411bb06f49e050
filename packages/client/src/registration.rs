//! Player registration against the HTTP API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;

/// Message used when the server gives no usable reason
pub const UNKNOWN_REGISTRATION_ERROR: &str = "unknown error while registering player";

/// Registers a player name before entering the game.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    async fn register(&self, name: &str) -> Result<(), RegistrationError>;
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Trim `name` and reject it if nothing is left.
pub fn validate_player_name(name: &str) -> Result<&str, RegistrationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RegistrationError::EmptyName);
    }
    Ok(trimmed)
}

/// Best-effort reason for a rejected registration: the body's `message`,
/// then the status reason phrase, then a fixed default.
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_REGISTRATION_ERROR.to_string())
}

/// `reqwest` client for `POST {api_base}/register`.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    http: reqwest::Client,
    api_base: String,
}

impl RegistrationClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn register_url(&self) -> String {
        format!("{}/register", self.api_base)
    }
}

#[async_trait]
impl RegistrationApi for RegistrationClient {
    async fn register(&self, name: &str) -> Result<(), RegistrationError> {
        let name = validate_player_name(name)?;

        let response = self
            .http
            .post(self.register_url())
            .json(&RegisterRequest { name })
            .send()
            .await
            .map_err(|e| RegistrationError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!("Player '{}' registered", name);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(status, &body);
        tracing::warn!("Registration of '{}' rejected ({}): {}", name, status, message);
        Err(RegistrationError::Rejected(message))
    }
}
