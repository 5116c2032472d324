#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ignitionlab_lib::config::Config;
use ignitionlab_lib::storage::{KeyValueStore, MemoryStorage, TOKEN_KEY};
use ignitionlab_lib::AppState;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn config(server: &MockServer) -> Config {
    Config {
        api_base_url: server.uri(),
        data_dir: std::env::temp_dir().join("ignitionlab-tests"),
        request_timeout: Duration::from_secs(5),
    }
}

pub fn app(server: &MockServer, storage: Arc<MemoryStorage>) -> AppState {
    AppState::with_storage(config(server), storage).unwrap()
}

/// Storage already holding `token`.
pub fn storage_with_token(token: &str) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(TOKEN_KEY, token).unwrap();
    storage
}

pub async fn mount_login(server: &MockServer, username: &str, password: &str, token: &str, role: &str) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({
            "username": username,
            "password": password,
            "remember_me": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "username": username,
            "role": role,
        })))
        .mount(server)
        .await;
}

/// App logged in through the backend as `user` with `role`.
pub async fn logged_in_app(server: &MockServer, role: &str) -> AppState {
    mount_login(server, "tech1", "secret", "tok-session", role).await;
    let app = app(server, Arc::new(MemoryStorage::new()));
    app.session.initialize().await;
    assert!(app.session.login("tech1", "secret", false).await.is_success());
    app
}
