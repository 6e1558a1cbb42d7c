//! Client-credentials token exchange.
//!
//! The chat gateway authenticates with a bearer token obtained from a
//! separate OAuth endpoint. Tokens are cached until shortly before expiry;
//! one exchanger is shared by all rounds of a session.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::LlmConfig;
use crate::types::{AppError, AppResult};

// Refresh this long before the reported expiry.
const EXPIRY_LEEWAY_SECS: i64 = 60;
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    bearer: String,
    expires_at: DateTime<Utc>,
}

pub struct TokenExchanger {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenExchanger {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.token_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        )
    }

    /// Return a valid bearer token, exchanging credentials if the cached
    /// one is missing or about to expire.
    pub async fn bearer(&self) -> AppResult<String> {
        let mut guard = self.cached.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.bearer.clone());
            }
        }

        debug!(url = %self.token_url, "Exchanging client credentials for bearer token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::TokenExchange(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::TokenExchange(format!("invalid token response: {e}")))?;

        let ttl = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let cached = CachedToken {
            bearer: token.access_token,
            expires_at: Utc::now() + Duration::seconds((ttl - EXPIRY_LEEWAY_SECS).max(0)),
        };
        let bearer = cached.bearer.clone();
        *guard = Some(cached);
        Ok(bearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_and_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"abc123","expires_in":3600,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let exchanger =
            TokenExchanger::new(format!("{}/oauth/token", server.url()), "id", "secret");

        let first = exchanger.bearer().await.unwrap();
        let second = exchanger.bearer().await.unwrap();
        assert_eq!(first, "abc123");
        assert_eq!(second, "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_failure_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .with_body("bad client")
            .create_async()
            .await;

        let exchanger =
            TokenExchanger::new(format!("{}/oauth/token", server.url()), "id", "wrong");

        let err = exchanger.bearer().await.unwrap_err();
        match err {
            AppError::TokenExchange(message) => {
                assert!(message.contains("401"));
                assert!(message.contains("bad client"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
