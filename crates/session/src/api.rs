//! Client for the backend's auth endpoints.
//!
//! - `POST /api/auth/login`
//! - `GET  /api/auth/me`
//! - `PUT  /api/auth/change-password`
//! - `PUT  /api/auth/profile`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use schoolerp_auth::{Credentials, PasswordChange, SessionUser, UserPatch};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The backend answered 401: the credentials or token are not accepted.
    #[error("unauthorized{}", detail(.0))]
    Unauthorized(String),
    #[error("API error ({status}){}", detail(.message))]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
}

fn detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// Message supplied by the backend, suitable for showing to the user.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized(message) | ApiError::Api { message, .. } if !message.is_empty() => {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}

/// Successful login payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub user: SessionUser,
    pub token: String,
}

/// Auth endpoints as seen by the session store.
///
/// Implementations attach `token` as a bearer credential where one is given.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;

    async fn current_user(&self, token: &str) -> Result<SessionUser, ApiError>;

    async fn change_password(&self, token: &str, change: &PasswordChange) -> Result<(), ApiError>;

    async fn update_profile(&self, token: &str, fields: &UserPatch) -> Result<SessionUser, ApiError>;
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// `{ "user": {...} }`, or a bare user document from older endpoints.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserBody {
    Wrapped { user: SessionUser },
    Bare(SessionUser),
}

impl From<UserBody> for SessionUser {
    fn from(body: UserBody) -> Self {
        match body {
            UserBody::Wrapped { user } | UserBody::Bare(user) => user,
        }
    }
}

/// HTTP implementation of [`AuthApi`] on top of a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    api_url: String,
    client: reqwest::Client,
}

impl HttpAuthApi {
    /// `api_url` is the backend origin, e.g. `http://localhost:5000`.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self::with_client(api_url, client))
    }

    pub fn with_client(api_url: impl Into<String>, client: reqwest::Client) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { api_url, client }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();
        tracing::debug!(url = %resp.url(), status = status.as_u16(), "auth request completed");

        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body);
        if status == StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized(message))
        } else {
            Err(ApiError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let body = LoginBody {
            email: credentials.identifier(),
            password: credentials.password(),
        };
        let resp = self
            .send(self.client.post(self.url("/api/auth/login")).json(&body))
            .await?;

        resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn current_user(&self, token: &str) -> Result<SessionUser, ApiError> {
        let resp = self
            .send(self.client.get(self.url("/api/auth/me")).bearer_auth(token))
            .await?;

        let body: UserBody = resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.into())
    }

    async fn change_password(&self, token: &str, change: &PasswordChange) -> Result<(), ApiError> {
        let body = ChangePasswordBody {
            current_password: change.current(),
            new_password: change.new_password(),
        };
        self.send(
            self.client
                .put(self.url("/api/auth/change-password"))
                .bearer_auth(token)
                .json(&body),
        )
        .await?;

        Ok(())
    }

    async fn update_profile(&self, token: &str, fields: &UserPatch) -> Result<SessionUser, ApiError> {
        let resp = self
            .send(
                self.client
                    .put(self.url("/api/auth/profile"))
                    .bearer_auth(token)
                    .json(fields),
            )
            .await?;

        let body: UserBody = resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.into())
    }
}

/// Extract a human-readable message from an error response body.
///
/// The backend uses `{"message": ...}`; some middleware answers with
/// `{"error": ...}` or plain text. Empty when the body carries no message.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(Value::String(message)) = map.get(key) {
                if !message.trim().is_empty() {
                    return message.trim().to_string();
                }
            }
        }
    }

    let text = body.trim();
    if text.starts_with('{') || text.starts_with('<') {
        return String::new();
    }
    text.to_string()
}
