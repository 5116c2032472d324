//! Authentication diagnostics.
//!
//! A point-in-time report for troubleshooting "remember me" and login
//! persistence. Purely informational: token expiry read here never ends a
//! session, only the server does.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Session;
use crate::models::Role;
use crate::storage::TokenStore;

/// Claims read from the token payload without checking the signature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decode the middle segment of a JWT.
pub fn decode_claims(token: &str) -> Result<TokenClaims, String> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| "token is not a JWT".to_string())?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid claims: {e}"))
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub timestamp: DateTime<Utc>,
    pub user_logged_in: bool,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub storage_available: bool,
    pub token_exists: bool,
    pub token_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_decode_error: Option<String>,
    pub host: String,
    pub recommendations: Vec<String>,
}

pub fn run(store: &TokenStore, session: &Session) -> DiagnosticsReport {
    run_at(store, session, Utc::now())
}

pub fn run_at(store: &TokenStore, session: &Session, now: DateTime<Utc>) -> DiagnosticsReport {
    let storage_available = store.is_available();
    let token = store.read();

    let mut report = DiagnosticsReport {
        timestamp: now,
        user_logged_in: session.user.is_some(),
        username: session.user.as_ref().map(|u| u.username.clone()),
        role: session.user.as_ref().map(|u| u.role),
        storage_available,
        token_exists: token.is_some(),
        token_length: token.as_ref().map_or(0, String::len),
        token_expiry: None,
        token_valid: None,
        token_decode_error: None,
        host: host_description(),
        recommendations: Vec::new(),
    };

    if let Some(token) = &token {
        match decode_claims(token) {
            Ok(TokenClaims { exp: Some(exp), .. }) => {
                report.token_expiry = DateTime::from_timestamp(exp, 0);
                report.token_valid = report.token_expiry.map(|expiry| expiry > now);
            }
            Ok(_) => report.token_decode_error = Some("token carries no exp claim".into()),
            Err(e) => report.token_decode_error = Some(e),
        }
    }

    if !report.storage_available {
        report.recommendations.push(
            "Local storage is unavailable; the session cannot be remembered between runs.".into(),
        );
    }
    if !report.token_exists && report.user_logged_in {
        report
            .recommendations
            .push("Logged in but no token is stored. Try logging out and in again.".into());
    }
    if report.token_exists && report.token_valid == Some(false) {
        report
            .recommendations
            .push("Stored token has expired. Use \"remember me\" for a longer-lived token.".into());
    }

    report
}

fn host_description() -> String {
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "unknown host".to_string());
    format!("{} ({})", hostname, whoami::distro())
}
