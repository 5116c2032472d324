mod common;

use std::sync::Arc;
use std::time::Duration;

use ignitionlab_lib::auth::{LoginOutcome, SessionPhase};
use ignitionlab_lib::guard::{guard, GuardDecision, Route};
use ignitionlab_lib::models::{Role, User};
use ignitionlab_lib::storage::{KeyValueStore, MemoryStorage, TOKEN_KEY};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{app, logged_in_app, mount_login, storage_with_token};

fn tech1() -> User {
    User {
        username: "tech1".into(),
        role: Role::Technician,
    }
}

#[tokio::test]
async fn stored_token_is_verified_on_startup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("Authorization", "Bearer abc.def.ghi"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"username": "tech1", "role": "technician"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, storage_with_token("abc.def.ghi"));
    assert!(app.session.is_loading());
    assert_eq!(guard(&app.session.snapshot(), Route::Dashboard), GuardDecision::Wait);

    app.session.initialize().await;

    let session = app.session.snapshot();
    assert_eq!(session.user, Some(tech1()));
    assert!(!session.loading);
    assert_eq!(session.phase, SessionPhase::Authenticated);
    assert_eq!(app.session.api().auth_header().as_deref(), Some("Bearer abc.def.ghi"));
    assert_eq!(
        guard(&session, Route::Dashboard),
        GuardDecision::Render(Route::Dashboard)
    );
}

#[tokio::test]
async fn rejected_token_on_startup_clears_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})),
        )
        .mount(&server)
        .await;

    let storage = storage_with_token("expired.token.value");
    let app = app(&server, storage.clone());
    app.session.initialize().await;

    let session = app.session.snapshot();
    assert_eq!(session.user, None);
    assert_eq!(session.token, None);
    assert!(!session.loading);
    assert_eq!(session.phase, SessionPhase::Unauthenticated);
    assert_eq!(app.session.api().auth_header(), None);
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(guard(&session, Route::Jobs), GuardDecision::RedirectToLogin);
}

#[tokio::test]
async fn server_error_on_startup_keeps_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let storage = storage_with_token("abc.def.ghi");
    let app = app(&server, storage.clone());
    app.session.initialize().await;

    let session = app.session.snapshot();
    assert!(!session.loading);
    assert_eq!(session.token.as_deref(), Some("abc.def.ghi"));
    assert_eq!(session.user, None);
    assert_eq!(session.phase, SessionPhase::Verifying);
    assert_eq!(app.session.api().auth_header().as_deref(), Some("Bearer abc.def.ghi"));
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc.def.ghi"));
}

#[tokio::test]
async fn unreachable_backend_on_startup_keeps_the_token() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = common::config(&MockServer::start().await);
    config.api_base_url = format!("http://127.0.0.1:{port}");

    let storage = storage_with_token("abc.def.ghi");
    let app = ignitionlab_lib::AppState::with_storage(config, storage.clone()).unwrap();
    app.session.initialize().await;

    assert!(!app.session.is_loading());
    assert_eq!(app.session.token().as_deref(), Some("abc.def.ghi"));
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("abc.def.ghi"));
}

#[tokio::test]
async fn no_stored_token_skips_verification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let app = app(&server, Arc::new(MemoryStorage::new()));
    app.session.initialize().await;

    let session = app.session.snapshot();
    assert!(!session.loading);
    assert_eq!(session.phase, SessionPhase::Unauthenticated);
    assert_eq!(guard(&session, Route::Customers), GuardDecision::RedirectToLogin);
}

#[tokio::test]
async fn unavailable_storage_on_startup_means_logged_out() {
    let server = MockServer::start().await;
    let app = app(&server, Arc::new(MemoryStorage::unavailable()));
    app.session.initialize().await;

    assert_eq!(app.session.phase(), SessionPhase::Unauthenticated);
    assert!(!app.session.is_loading());
}

#[tokio::test]
async fn failed_login_changes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let app = app(&server, storage.clone());
    app.session.initialize().await;

    let outcome = app.session.login("x", "wrong", false).await;
    assert_eq!(
        outcome,
        LoginOutcome::Failure {
            error: "Invalid credentials".into()
        }
    );
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(app.session.api().auth_header(), None);
    assert_eq!(app.session.user(), None);
    assert_eq!(app.session.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn failed_login_without_detail_uses_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = app(&server, Arc::new(MemoryStorage::new()));
    let outcome = app.session.login("x", "right", false).await;
    assert_eq!(
        outcome,
        LoginOutcome::Failure {
            error: "Login failed".into()
        }
    );
}

#[tokio::test]
async fn successful_login_sets_store_header_and_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "x", "password": "right", "remember_me": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok1",
            "token_type": "bearer",
            "username": "x",
            "role": "admin",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let app = app(&server, storage.clone());
    app.session.initialize().await;

    assert_eq!(app.session.login("x", "right", true).await, LoginOutcome::Success);
    assert_eq!(app.session.store().read().as_deref(), Some("tok1"));
    assert_eq!(app.session.api().auth_header().as_deref(), Some("Bearer tok1"));
    assert_eq!(
        app.session.user(),
        Some(User {
            username: "x".into(),
            role: Role::Admin
        })
    );
    assert!(app.session.is_admin());
    assert_eq!(app.session.phase(), SessionPhase::Authenticated);
}

#[tokio::test]
async fn login_survives_unavailable_storage_in_memory() {
    let server = MockServer::start().await;
    mount_login(&server, "tech1", "secret", "tok-mem", "technician").await;

    let app = app(&server, Arc::new(MemoryStorage::unavailable()));
    app.session.initialize().await;

    assert!(app.session.login("tech1", "secret", false).await.is_success());
    assert_eq!(app.session.user(), Some(tech1()));
    assert_eq!(app.session.api().auth_header().as_deref(), Some("Bearer tok-mem"));
    assert_eq!(app.session.store().read(), None);
}

#[tokio::test]
async fn logout_clears_everything_and_is_idempotent() {
    let server = MockServer::start().await;
    let app = logged_in_app(&server, "technician").await;
    assert!(app.session.store().read().is_some());

    app.session.logout();
    let after_first = app.session.snapshot();
    assert_eq!(app.session.api().auth_header(), None);
    assert_eq!(app.session.store().read(), None);
    assert_eq!(after_first.user, None);
    assert_eq!(after_first.token, None);

    app.session.logout();
    assert_eq!(app.session.snapshot(), after_first);
    assert_eq!(app.session.api().auth_header(), None);
    assert_eq!(app.session.store().read(), None);
}

#[tokio::test]
async fn transient_failure_keeps_an_authenticated_session() {
    let server = MockServer::start().await;
    let app = logged_in_app(&server, "technician").await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    app.session.verify(None).await;

    assert_eq!(app.session.user(), Some(tech1()));
    assert_eq!(app.session.phase(), SessionPhase::Authenticated);
    assert_eq!(app.session.token().as_deref(), Some("tok-session"));
}

#[tokio::test]
async fn accepted_candidate_token_becomes_the_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("Authorization", "Bearer other"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"username": "tech1", "role": "technician"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server, Arc::new(MemoryStorage::new()));
    app.session.verify(Some("other")).await;

    assert_eq!(app.session.user(), Some(tech1()));
    assert_eq!(app.session.token().as_deref(), Some("other"));
    assert_eq!(app.session.api().auth_header().as_deref(), Some("Bearer other"));
    assert_eq!(app.session.store().read().as_deref(), Some("other"));
    assert!(!app.session.is_loading());
}

#[tokio::test]
async fn rejected_candidate_token_keeps_the_current_session() {
    let server = MockServer::start().await;
    let app = logged_in_app(&server, "technician").await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("Authorization", "Bearer forged"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    app.session.verify(Some("forged")).await;

    assert_eq!(app.session.user(), Some(tech1()));
    assert_eq!(app.session.token().as_deref(), Some("tok-session"));
    assert_eq!(app.session.api().auth_header().as_deref(), Some("Bearer tok-session"));
    assert_eq!(app.session.store().read().as_deref(), Some("tok-session"));
}

#[tokio::test]
async fn logout_during_startup_verification_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"username": "tech1", "role": "technician"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = storage_with_token("abc.def.ghi");
    let app = app(&server, storage.clone());
    let session = app.session.clone();
    let verifying = tokio::spawn(async move { session.initialize().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    app.session.logout();
    verifying.await.unwrap();

    let session = app.session.snapshot();
    assert_eq!(session.user, None);
    assert_eq!(session.token, None);
    assert!(!session.loading);
    assert_eq!(session.phase, SessionPhase::Unauthenticated);
    assert_eq!(app.session.api().auth_header(), None);
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(guard(&session, Route::Customers), GuardDecision::RedirectToLogin);
}

#[tokio::test]
async fn login_during_startup_verification_is_not_overwritten() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(
            ResponseTemplate::new(401).set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_login(&server, "tech1", "secret", "tok-fresh", "technician").await;

    let app = app(&server, storage_with_token("stale.token.value"));
    let session = app.session.clone();
    let verifying = tokio::spawn(async move { session.initialize().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(app.session.login("tech1", "secret", false).await.is_success());
    verifying.await.unwrap();

    assert_eq!(app.session.user(), Some(tech1()));
    assert_eq!(app.session.api().auth_header().as_deref(), Some("Bearer tok-fresh"));
    assert_eq!(app.session.store().read().as_deref(), Some("tok-fresh"));
}

#[tokio::test]
async fn register_reports_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({"username": "taken", "password": "longenough"})))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Username already exists"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({"username": "fresh", "password": "longenough"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "User created successfully",
            "username": "fresh",
        })))
        .mount(&server)
        .await;

    let app = app(&server, Arc::new(MemoryStorage::new()));
    let err = app.session.register("taken", "longenough").await.unwrap_err();
    assert_eq!(err.user_message("Registration failed"), "Username already exists");

    assert_eq!(app.session.register("fresh", "longenough").await.unwrap(), "fresh");
    assert_eq!(app.session.user(), None);
}

#[tokio::test]
async fn username_change_logs_in_again_under_the_new_name() {
    let server = MockServer::start().await;
    let app = logged_in_app(&server, "technician").await;

    Mock::given(method("PUT"))
        .and(path("/api/auth/update-username"))
        .and(header("Authorization", "Bearer tok-session"))
        .and(body_json(json!({"new_username": "tech9", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "tech9"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, "tech9", "secret", "tok-renamed", "technician").await;

    app.session.update_username("tech9", "secret").await.unwrap();

    assert_eq!(app.session.user().map(|u| u.username).as_deref(), Some("tech9"));
    assert_eq!(app.session.api().auth_header().as_deref(), Some("Bearer tok-renamed"));
    assert_eq!(app.session.store().read().as_deref(), Some("tok-renamed"));
}

#[tokio::test]
async fn wrong_password_on_update_keeps_the_session() {
    let server = MockServer::start().await;
    let app = logged_in_app(&server, "technician").await;
    Mock::given(method("PUT"))
        .and(path("/api/auth/update-password"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Current password is incorrect"})),
        )
        .mount(&server)
        .await;

    let err = app.session.update_password("nope", "newsecret").await.unwrap_err();
    assert_eq!(err.user_message("Failed to update password"), "Current password is incorrect");
    assert_eq!(app.session.user(), Some(tech1()));
}
