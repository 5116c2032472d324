//! Authentication Module
//!
//! Session lifecycle: startup verification, login, logout and the
//! self-service account changes. [`SessionController`] is the only writer
//! of the token store and of the API client's credential.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{
    LoginRequest, RegisterRequest, RegisterResponse, TokenResponse, UpdatePasswordRequest,
    UpdateUsernameRequest, User,
};
use crate::storage::TokenStore;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const ME_PATH: &str = "/api/auth/me";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const UPDATE_USERNAME_PATH: &str = "/api/auth/update-username";
pub const UPDATE_PASSWORD_PATH: &str = "/api/auth/update-password";

pub const MIN_REGISTER_PASSWORD_LEN: usize = 8;
pub const MIN_UPDATE_PASSWORD_LEN: usize = 6;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Uninitialized,
    Verifying,
    Authenticated,
    Unauthenticated,
}

/// Snapshot of the session as readers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: Option<User>,
    #[serde(skip)]
    pub token: Option<String>,
    pub loading: bool,
    pub phase: SessionPhase,
}

impl Session {
    fn new() -> Self {
        Self {
            user: None,
            token: None,
            loading: true,
            phase: SessionPhase::Uninitialized,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.is_admin())
    }
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure { error: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success)
    }
}

#[derive(Serialize)]
struct LoginOutcomeWire<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for LoginOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            LoginOutcome::Success => LoginOutcomeWire {
                success: true,
                error: None,
            },
            LoginOutcome::Failure { error } => LoginOutcomeWire {
                success: false,
                error: Some(error),
            },
        };
        wire.serialize(serializer)
    }
}

/// Owns the authentication state and mediates between the token store and
/// the API client.
pub struct SessionController {
    store: TokenStore,
    api: Arc<ApiClient>,
    state: Mutex<Session>,
    remember_me: Mutex<bool>,
}

impl SessionController {
    pub fn new(store: TokenStore, api: Arc<ApiClient>) -> Self {
        Self {
            store,
            api,
            state: Mutex::new(Session::new()),
            remember_me: Mutex::new(false),
        }
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    fn state(&self) -> MutexGuard<'_, Session> {
        // Session holds plain data; a panic mid-update cannot break it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Session {
        self.state().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state().token.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    pub fn is_admin(&self) -> bool {
        self.state().is_admin()
    }

    /// Restore the session persisted by a previous run.
    pub async fn initialize(&self) {
        let stored = self.store.read();
        info!("Initializing auth, stored token exists: {}", stored.is_some());

        match stored {
            Some(token) => {
                self.set_token(Some(token));
                self.state().phase = SessionPhase::Verifying;
                self.verify(None).await;
            }
            None => {
                let mut state = self.state();
                state.phase = SessionPhase::Unauthenticated;
                state.loading = false;
            }
        }
    }

    /// Check a token with the backend.
    ///
    /// `None` checks the current credential. `Some(token)` checks a
    /// candidate, which becomes the session's token once the server accepts
    /// it. Only a 401 for the session's own token ends the session; any
    /// other failure leaves user and token untouched. A result that arrives
    /// after the session's token changed is dropped.
    pub async fn verify(&self, token_to_check: Option<&str>) {
        debug!("Verifying token");
        let expected = self.token();

        let result = match token_to_check {
            Some(token) => self.api.get_with_token::<User>(ME_PATH, token).await,
            None => self.api.get::<User>(ME_PATH).await,
        };

        let mut state = self.state();
        if state.token != expected {
            debug!("Session changed while verifying, discarding result");
            return;
        }

        match result {
            Ok(user) => {
                info!("Token verified, user: {}", user.username);
                if let Some(token) = token_to_check.filter(|t| expected.as_deref() != Some(*t)) {
                    if !self.store.write(token) {
                        warn!("Token not persisted; session will not survive a restart");
                    }
                    self.set_token_in(&mut state, Some(token.to_string()));
                }
                state.user = Some(user);
                state.phase = SessionPhase::Authenticated;
            }
            Err(e) if e.is_unauthorized() => {
                let own_token = token_to_check.map_or(true, |t| expected.as_deref() == Some(t));
                if own_token {
                    info!("Token rejected by server, logging out");
                    self.end_session(&mut state);
                } else {
                    info!("Candidate token rejected, keeping current session");
                }
            }
            Err(e) => {
                warn!("Token verification failed, keeping session: {}", e);
            }
        }

        state.loading = false;
    }

    /// Exchange credentials for a token.
    ///
    /// A failed login leaves every piece of state as it was.
    pub async fn login(&self, username: &str, password: &str, remember_me: bool) -> LoginOutcome {
        let request = LoginRequest {
            username,
            password,
            remember_me,
        };

        let response = match self.api.post::<_, TokenResponse>(LOGIN_PATH, &request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Login failed: {}", e);
                return LoginOutcome::Failure {
                    error: e.user_message("Login failed"),
                };
            }
        };

        if !self.store.write(&response.access_token) {
            warn!("Token not persisted; session will not survive a restart");
        }

        let user = response.user();
        info!("Logged in as {} ({})", user.username, user.role);

        self.set_token(Some(response.access_token));
        {
            let mut state = self.state();
            state.user = Some(user);
            state.phase = SessionPhase::Authenticated;
            state.loading = false;
        }
        *self.remember_me.lock().unwrap_or_else(|p| p.into_inner()) = remember_me;

        LoginOutcome::Success
    }

    /// Forget the session everywhere. Safe to call repeatedly.
    pub fn logout(&self) {
        let mut state = self.state();
        self.end_session(&mut state);
    }

    /// Report the outcome of any authenticated request; a 401 ends the
    /// session.
    pub fn observe<T>(&self, result: &Result<T, ApiError>) {
        if let Err(e) = result {
            if e.is_unauthorized() && self.token().is_some() {
                info!("Request rejected with 401, ending session");
                self.logout();
            }
        }
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, username: &str, password: &str) -> Result<String, ApiError> {
        if username.trim().is_empty() {
            return Err(ApiError::Validation("Please enter a username".into()));
        }
        if password.chars().count() < MIN_REGISTER_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_REGISTER_PASSWORD_LEN
            )));
        }

        let response: RegisterResponse = self
            .api
            .post(REGISTER_PATH, &RegisterRequest { username, password })
            .await?;
        info!("Registered account {}", response.username);
        Ok(response.username)
    }

    /// Rename the current account, then log in again under the new name.
    pub async fn update_username(&self, new_username: &str, password: &str) -> Result<(), ApiError> {
        if new_username.trim().is_empty() {
            return Err(ApiError::Validation("Please enter a new username".into()));
        }
        if password.is_empty() {
            return Err(ApiError::Validation("Please enter your current password".into()));
        }

        let result = self
            .api
            .put::<_, serde_json::Value>(
                UPDATE_USERNAME_PATH,
                &UpdateUsernameRequest {
                    new_username,
                    password,
                },
            )
            .await;
        self.observe(&result);
        result?;

        // The old token names a subject that no longer exists
        let remember_me = *self.remember_me.lock().unwrap_or_else(|p| p.into_inner());
        match self.login(new_username, password, remember_me).await {
            LoginOutcome::Success => Ok(()),
            LoginOutcome::Failure { error } => Err(ApiError::Validation(error)),
        }
    }

    pub async fn update_password(&self, current: &str, new: &str) -> Result<(), ApiError> {
        if current.is_empty() {
            return Err(ApiError::Validation("Please enter your current password".into()));
        }
        if new.chars().count() < MIN_UPDATE_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "New password must be at least {} characters",
                MIN_UPDATE_PASSWORD_LEN
            )));
        }

        let result = self
            .api
            .put::<_, serde_json::Value>(
                UPDATE_PASSWORD_PATH,
                &UpdatePasswordRequest {
                    current_password: current,
                    new_password: new,
                },
            )
            .await;
        self.observe(&result);
        result.map(|_| ())
    }

    fn set_token(&self, token: Option<String>) {
        let mut state = self.state();
        self.set_token_in(&mut state, token);
    }

    /// The one place token and credential change together. Callers hold the
    /// session lock.
    fn set_token_in(&self, state: &mut Session, token: Option<String>) {
        match &token {
            Some(token) => self.api.set_auth_header(token),
            None => self.api.clear_auth_header(),
        }
        state.token = token;
    }

    fn end_session(&self, state: &mut Session) {
        if !self.store.clear() {
            warn!("Stored token could not be removed");
        }

        self.set_token_in(state, None);
        if state.user.take().is_some() {
            info!("Logged out");
        }
        state.phase = SessionPhase::Unauthenticated;
        state.loading = false;
    }
}
