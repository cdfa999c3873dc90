//! GoTrue client — `IdentityProvider` over the hosted auth REST API
//! (`/auth/v1/...`), as exposed by Supabase-style backends.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::AuthConfig;
use crate::error::IdentityError;

use super::provider::{IdentityProvider, User};

/// Requests that take longer than this fail instead of stalling a transition.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Token response from `/token` and (when auto-confirm is on) `/signup`.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: String,
    user: User,
}

/// `/signup` answers with either a session or the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(SessionResponse),
    User(User),
}

/// HTTP identity client holding the current session's access token.
pub struct GoTrueClient {
    base_url: String,
    api_key: SecretString,
    client: reqwest::Client,
    access_token: RwLock<Option<SecretString>>,
}

impl GoTrueClient {
    pub fn new(config: &AuthConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
            access_token: RwLock::new(None),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    /// Adopt a session obtained elsewhere, e.g. from an OAuth redirect.
    pub async fn set_session(&self, access_token: &str) {
        *self.access_token.write().await = Some(SecretString::from(access_token.to_string()));
    }

    pub async fn has_session(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    async fn bearer(&self) -> Option<String> {
        self.access_token
            .read()
            .await
            .as_ref()
            .map(|t| t.expose_secret().to_string())
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.api_url(path))
            .header("apikey", self.api_key.expose_secret())
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, IdentityError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(status = %status, "Identity request rejected");
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(error_message(&body, status)));
        }
        Err(IdentityError::Rejected(error_message(&body, status)))
    }

    async fn json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, IdentityError> {
        resp.json::<T>()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))
    }
}

/// Pull the human-readable message out of an auth error body.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(String::from))
        })
        .unwrap_or_else(|| format!("request failed with status {status}"))
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn current_user(&self) -> Result<Option<User>, IdentityError> {
        let Some(token) = self.bearer().await else {
            return Ok(None);
        };

        let resp = self
            .request(reqwest::Method::GET, "user")
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!("Access token rejected, clearing session");
            *self.access_token.write().await = None;
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Unavailable(error_message(&body, status)));
        }

        Ok(Some(Self::json(resp).await?))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, IdentityError> {
        let resp = self
            .send(
                self.request(reqwest::Method::POST, "token?grant_type=password")
                    .json(&serde_json::json!({ "email": email, "password": password })),
            )
            .await?;
        let session: SessionResponse = Self::json(resp).await?;
        self.set_session(&session.access_token).await;
        Ok(session.user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<User>, IdentityError> {
        let resp = self
            .send(self.request(reqwest::Method::POST, "signup").json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            })))
            .await?;

        match Self::json::<SignUpResponse>(resp).await? {
            SignUpResponse::Session(session) => {
                self.set_session(&session.access_token).await;
                Ok(Some(session.user))
            }
            SignUpResponse::User(user) => Ok(Some(user)),
        }
    }

    async fn oauth_authorize_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, IdentityError> {
        let mut url = reqwest::Url::parse(&self.api_url("authorize"))
            .map_err(|e| IdentityError::InvalidResponse(format!("bad auth URL: {e}")))?;
        url.query_pairs_mut().append_pair("provider", provider);
        if let Some(redirect) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect);
        }
        Ok(url.to_string())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(token) = self.bearer().await else {
            return Ok(());
        };
        let result = self
            .send(self.request(reqwest::Method::POST, "logout").bearer_auth(token))
            .await;
        // The local session is dropped even if the server call failed.
        *self.access_token.write().await = None;
        result.map(|_| ())
    }

    async fn reset_password(&self, email: &str) -> Result<(), IdentityError> {
        self.send(
            self.request(reqwest::Method::POST, "recover")
                .json(&serde_json::json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), IdentityError> {
        let token = self
            .bearer()
            .await
            .ok_or_else(|| IdentityError::Rejected("Not signed in".into()))?;
        self.send(
            self.request(reqwest::Method::PUT, "user")
                .bearer_auth(token)
                .json(&serde_json::json!({ "password": new_password })),
        )
        .await?;
        Ok(())
    }
}
