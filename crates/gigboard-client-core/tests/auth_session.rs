#![allow(clippy::expect_used)]

mod support;

use std::rc::Rc;

use gigboard_client_core::storage::{ROLE_KEY, USER_ID_KEY};
use gigboard_client_core::{
    ApiError, AuthError, AuthInputError, AuthSessionManager, DurableStorage, GatewayError, Role,
};
use serde_json::json;
use support::{Harness, ScriptedTransport, bearer, json, path_of, status};

fn manager(harness: &Harness) -> AuthSessionManager {
    AuthSessionManager::new(
        harness.gateway.clone(),
        harness.tokens.clone(),
        harness.storage.clone(),
    )
}

fn backend() -> Rc<ScriptedTransport> {
    ScriptedTransport::new(|request| match path_of(request).as_str() {
        "/auth/login" => json(
            200,
            json!({ "user_id": 41, "access_token": "access-1", "refresh_token": "refresh-1" }),
        ),
        "/auth/register/contractor" | "/auth/register/contractee" => json(
            201,
            json!({ "token": { "user_id": "42", "access_token": "access-2", "refresh_token": "refresh-2" } }),
        ),
        "/users/me" => match bearer(request).as_deref() {
            Some("access-1") => json(200, json!({ "id": 41, "role": "contractor" })),
            _ => json(200, json!({ "id": 42, "role": "superuser" })),
        },
        "/auth/logout" => status(200),
        _ => status(404),
    })
}

#[tokio::test]
async fn login_posts_form_and_stores_session() {
    let harness = Harness::new(None, None, backend());
    let auth = manager(&harness);

    let session = auth.login("  ivan@example.com ", "hunter2").await.expect("logged in");

    assert_eq!(session.user_id.as_deref(), Some("41"));
    assert_eq!(harness.tokens.access_token().as_deref(), Some("access-1"));
    assert_eq!(harness.tokens.refresh_token().as_deref(), Some("refresh-1"));
    assert_eq!(auth.user_id().as_deref(), Some("41"));

    let sent = harness.transport.requests().remove(0);
    assert_eq!(sent.header("content-type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(
        sent.body.as_deref(),
        Some(b"username=ivan%40example.com&password=hunter2".as_slice())
    );
}

#[tokio::test]
async fn wrong_password_for_a_guest_surfaces_as_refresh_unavailable() {
    let transport = ScriptedTransport::new(|_| json(401, json!({ "detail": "Incorrect password" })));
    let harness = Harness::new(None, None, transport);
    let auth = manager(&harness);

    let result = auth.login("ivan@example.com", "wrong").await;

    assert_eq!(result, Err(AuthError::Gateway(GatewayError::RefreshUnavailable)));
    assert!(result.err().is_some_and(|error| error.is_refresh_failure()));
    assert_eq!(harness.transport.calls_to("/auth/refresh"), 0);
    assert!(harness.sink.messages().is_empty());
    assert_eq!(harness.tokens.access_token(), None);
}

#[tokio::test]
async fn login_rejects_blank_input_before_any_request() {
    let harness = Harness::new(None, None, backend());
    let auth = manager(&harness);

    assert_eq!(
        auth.login("   ", "pw").await,
        Err(AuthError::Input(AuthInputError::EmptyUsername))
    );
    assert_eq!(
        auth.login("ivan", "").await,
        Err(AuthError::Input(AuthInputError::EmptyPassword))
    );
    assert!(harness.transport.requests().is_empty());
}

#[tokio::test]
async fn registration_reads_nested_token_payload() {
    let harness = Harness::new(None, None, backend());
    let auth = manager(&harness);
    let profile = json!({ "email": "olga@example.com", "password": "pw", "name": "Olga" });

    let session = auth
        .register_contractee(profile.clone())
        .await
        .expect("registered");

    assert_eq!(session.user_id.as_deref(), Some("42"));
    assert_eq!(harness.tokens.access_token().as_deref(), Some("access-2"));
    let sent = harness.transport.requests().remove(0);
    assert_eq!(path_of(&sent), "/auth/register/contractee");
    let body: serde_json::Value =
        serde_json::from_slice(sent.body.as_deref().expect("json body")).expect("valid json");
    assert_eq!(body, profile);
}

#[tokio::test]
async fn registration_without_token_reports_missing_session() {
    let transport = ScriptedTransport::new(|_| json(201, json!({ "id": 7 })));
    let harness = Harness::new(None, None, transport);
    let auth = manager(&harness);

    let result = auth.register_contractor(json!({ "email": "a@b.c" })).await;

    assert_eq!(result, Err(AuthError::MissingSession));
    assert_eq!(harness.tokens.access_token(), None);
}

#[tokio::test]
async fn resolve_role_persists_known_roles_only() {
    let harness = Harness::new(Some("access-1"), Some("refresh-1"), backend());
    let auth = manager(&harness);

    assert_eq!(auth.resolve_role().await, Ok(Role::Contractor));
    assert_eq!(harness.storage.get(ROLE_KEY).as_deref(), Some("contractor"));
    assert_eq!(auth.current_role(), Role::Contractor);

    let stranger = Harness::new(Some("access-9"), Some("refresh-9"), backend());
    let auth = manager(&stranger);
    assert_eq!(
        auth.resolve_role().await,
        Err(AuthError::UnknownRole("superuser".to_string()))
    );
    assert_eq!(auth.current_role(), Role::Guest);
}

#[tokio::test]
async fn logout_clears_local_session() {
    let harness = Harness::new(Some("access-1"), Some("refresh-1"), backend());
    harness.storage.set(ROLE_KEY, "admin");
    harness.storage.set(USER_ID_KEY, "41");
    let auth = manager(&harness);

    assert_eq!(auth.logout().await, Ok(()));
    assert_eq!(harness.tokens.access_token(), None);
    assert_eq!(harness.tokens.refresh_token(), None);
    assert_eq!(auth.current_role(), Role::Guest);
    assert_eq!(auth.user_id(), None);
    assert!(harness.storage.is_empty());
}

#[tokio::test]
async fn logout_clears_local_session_even_when_server_fails() {
    let transport = ScriptedTransport::new(|_| json(500, json!({ "message": "db down" })));
    let harness = Harness::new(Some("access-1"), Some("refresh-1"), transport);
    harness.storage.set(ROLE_KEY, "contractee");
    let auth = manager(&harness);

    let error = auth.logout().await.expect_err("server failed");

    assert_eq!(
        error,
        AuthError::Gateway(GatewayError::Api(ApiError {
            status: 500,
            message: "db down".to_string()
        }))
    );
    assert_eq!(harness.tokens.access_token(), None);
    assert_eq!(auth.current_role(), Role::Guest);
    assert_eq!(harness.sink.messages(), vec!["Error 500: db down".to_string()]);
}

#[tokio::test]
async fn logout_with_expired_session_is_a_refresh_failure() {
    let harness = Harness::new(
        Some("stale"),
        Some("expired"),
        ScriptedTransport::new(|_| status(401)),
    );
    let auth = manager(&harness);

    let error = auth.logout().await.expect_err("refresh rejected");

    assert!(error.is_refresh_failure());
    assert_eq!(harness.tokens.refresh_token(), None);
}
