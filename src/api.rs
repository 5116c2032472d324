//! API Module
//!
//! HTTP communication with the workshop backend. Every request goes through
//! one [`ApiClient`], which attaches the current bearer credential when the
//! request is built.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// API client for the workshop backend
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    credential: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credential: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach `Bearer <token>` to every request built from now on.
    pub(crate) fn set_auth_header(&self, token: &str) {
        match self.credential.write() {
            Ok(mut slot) => *slot = Some(token.to_string()),
            Err(poisoned) => *poisoned.into_inner() = Some(token.to_string()),
        }
    }

    /// Stop attaching any `Authorization` header.
    pub(crate) fn clear_auth_header(&self) {
        match self.credential.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    /// The `Authorization` value the next request would carry.
    pub fn auth_header(&self) -> Option<String> {
        self.current_token().map(|token| bearer(&token))
    }

    fn current_token(&self) -> Option<String> {
        match self.credential.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let builder = self.client.request(method, url);
        match self.current_token() {
            Some(token) => builder.header(AUTHORIZATION, bearer(&token)),
            None => builder,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    /// GET authenticated with `token` instead of the current credential.
    pub async fn get_with_token<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, ApiError> {
        let builder = self
            .client
            .get(self.url(path))
            .header(AUTHORIZATION, bearer(token));
        self.send(builder).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    /// PUT with query parameters and no body.
    pub async fn put_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::PUT, path).query(query)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(self.request(Method::DELETE, path)).await
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            let detail = extract_detail(&body);
            warn!("Request failed with status {}: {:?}", status.as_u16(), detail);
            return Err(ApiError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        // Empty bodies decode as JSON null so `()` and `Option<_>` work
        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        serde_json::from_slice(body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"detail": "..."}`, validation lists
/// (`{"detail": [{"msg": "..."}]}`) and `{"error": "..."}`.
fn extract_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let detail = value.get("detail").or_else(|| value.get("error"))?;

    match detail {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Array(items) => items
            .iter()
            .find_map(|item| item.get("msg")?.as_str().map(str::to_string)),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// API errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Http { status: u16, detail: Option<String> },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl ApiError {
    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Explicit rejection of the credential by the server.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Http { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Message to show a user, falling back to `fallback` when the server
    /// gave none.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Http {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ApiError::Validation(message) | ApiError::Forbidden(message) => message.clone(),
            _ => fallback.to_string(),
        }
    }
}
