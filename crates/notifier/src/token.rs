//! Bearer-token lifecycle for the violation API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::AuthError;

/// Login credentials for the violation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default)]
struct TokenState {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Shared token state: one manager per sender, serialised behind a
/// mutex so concurrent uploads never race a refresh.
pub struct TokenManager {
    client: Client,
    base_url: String,
    credentials: Credentials,
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new(client: Client, base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credentials,
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Current access token, authenticating first if none is held.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;
        if state.access_token.is_empty() {
            *state = self.login().await?;
        }
        Ok(state.access_token.clone())
    }

    /// Exchange the refresh token for a new pair, falling back to a
    /// full re-login when the exchange is rejected.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;
        match self.exchange(&state.refresh_token).await {
            Ok(new_state) => *state = new_state,
            Err(err) => {
                warn!(error = %err, "token refresh failed, re-authenticating");
                *state = self.login().await?;
            }
        }
        Ok(state.access_token.clone())
    }

    async fn login(&self) -> Result<TokenState, AuthError> {
        debug!(base_url = %self.base_url, "authenticating against violation API");
        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&self.credentials)
            .send()
            .await?;
        Self::parse_tokens(response).await
    }

    async fn exchange(&self, refresh_token: &str) -> Result<TokenState, AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/refresh", self.base_url))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        Self::parse_tokens(response).await
    }

    async fn parse_tokens(response: reqwest::Response) -> Result<TokenState, AuthError> {
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status { status });
        }
        let body: TokenResponse = response.json().await.map_err(|e| AuthError::Parse {
            reason: e.to_string(),
        })?;
        if body.access_token.is_empty() {
            return Err(AuthError::Parse {
                reason: "empty access token".to_string(),
            });
        }
        Ok(TokenState {
            access_token: body.access_token,
            refresh_token: body.refresh_token.unwrap_or_default(),
        })
    }
}
