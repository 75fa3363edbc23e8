//! Controller tests: route dispatch through `RequestHandler::handle_request`,
//! exactly as the transport drives it.

use std::sync::Arc;

use bytes::Bytes;
use reqscope_protocol::scope::{self, RequestScope};
use reqscope_protocol::{Context, ErrorKind, ReplyStatus, Route};
use reqscope_server::{AccessLog, Controller, ScopeGuard};
use reqscope_services::{
    CreateUserRequest, InMemoryUserStore, StaticSettingsClient, StoreError, UserSettings, UserStore,
};
use reqscope_transport::RequestHandler;
use serde_json::json;

type TestController = Controller<Arc<StaticSettingsClient>, Arc<InMemoryUserStore>>;

fn settings(enabled: bool) -> UserSettings {
    UserSettings {
        enabled,
        api_key: "test-key".into(),
    }
}

async fn controller(enabled: bool) -> TestController {
    let mut controller = Controller::new(
        Arc::new(StaticSettingsClient::new(settings(enabled))),
        Arc::new(InMemoryUserStore::new()),
    );
    controller.add_middleware(ScopeGuard::lenient());
    controller.add_middleware(AccessLog);
    controller.initialize().await.unwrap();
    controller
}

fn ctx() -> Context {
    scope::set_scope(&Context::background(), RequestScope::new("req-42", "198.51.100.3"))
}

fn user_body() -> Bytes {
    Bytes::from(
        json!({
            "full_name": "Katherine Johnson",
            "address": "1 NASA Dr",
            "city": "Hampton",
            "state": "VA",
            "zip_code": 23666,
        })
        .to_string(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn requests_refused_before_initialize() {
    let controller = Controller::new(
        StaticSettingsClient::new(settings(true)),
        InMemoryUserStore::new(),
    );
    let err = controller
        .handle_request(Route::CreateUser, ctx(), user_body())
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Unavailable));
}

#[tokio::test]
async fn initialize_fails_when_settings_unavailable() {
    let mut controller = Controller::new(StaticSettingsClient::failing(), InMemoryUserStore::new());
    let err = controller.initialize().await.unwrap_err();
    assert!(err.is(ErrorKind::Internal));
}

// ─────────────────────────────────────────────────────────────────────────────
// Create user
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_user_returns_created_with_id() {
    let controller = controller(true).await;
    let reply = controller
        .handle_request(Route::CreateUser, ctx(), user_body())
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Created);
    let id = reply.data["id"].as_str().unwrap();
    let stored = controller.user_store().get(id).unwrap();
    assert_eq!(stored.request_id, "req-42");
    assert_eq!(stored.user.state, "VA");
}

#[tokio::test]
async fn create_user_disabled_is_not_implemented() {
    let controller = controller(false).await;
    let err = controller
        .handle_request(Route::CreateUser, ctx(), user_body())
        .await
        .unwrap_err();

    assert!(err.is(ErrorKind::NotImplemented));
    assert!(controller.user_store().is_empty());
}

#[tokio::test]
async fn create_user_validation_failure_is_bad_request() {
    let controller = controller(true).await;
    let body = Bytes::from(json!({"full_name": "K", "state": "V"}).to_string());
    let err = controller
        .handle_request(Route::CreateUser, ctx(), body)
        .await
        .unwrap_err();

    assert!(err.is(ErrorKind::BadRequest));
    assert!(err.message().contains("address is required; city is required"));
}

#[tokio::test]
async fn create_user_store_failure_is_internal() {
    struct DownStore;

    impl UserStore for DownStore {
        async fn insert_user(&self, _ctx: &Context, _user: &CreateUserRequest) -> Result<String, StoreError> {
            Err(StoreError::Unavailable("timeout".into()))
        }
    }

    let mut controller = Controller::new(StaticSettingsClient::new(settings(true)), DownStore);
    controller.initialize().await.unwrap();

    let err = controller
        .handle_request(Route::CreateUser, ctx(), user_body())
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Internal));
}

#[tokio::test]
async fn unscoped_request_still_served_by_lenient_guard() {
    let controller = controller(true).await;
    let reply = controller
        .handle_request(Route::CreateUser, Context::background(), user_body())
        .await
        .unwrap();

    let id = reply.data["id"].as_str().unwrap();
    assert_eq!(controller.user_store().get(id).unwrap().request_id, "");
}

#[tokio::test]
async fn unscoped_request_rejected_by_strict_guard() {
    let mut controller = Controller::new(
        StaticSettingsClient::new(settings(true)),
        InMemoryUserStore::new(),
    );
    controller.add_middleware(ScopeGuard::strict());
    controller.initialize().await.unwrap();

    let err = controller
        .handle_request(Route::CreateUser, Context::background(), user_body())
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Unavailable));
    assert!(controller.user_store().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Update settings
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_settings_enables_user_creation() {
    let controller = controller(false).await;
    controller.settings_client().set(settings(true));

    let reply = controller
        .handle_request(Route::UpdateSettings, ctx(), Bytes::new())
        .await
        .unwrap();

    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(reply.data, json!({"enabled": true}));
    assert!(controller.settings().enabled);

    let created = controller
        .handle_request(Route::CreateUser, ctx(), user_body())
        .await
        .unwrap();
    assert_eq!(created.status, ReplyStatus::Created);
}

#[tokio::test]
async fn update_settings_failure_keeps_previous_settings() {
    let controller = controller(true).await;
    controller.settings_client().set_failing();

    let err = controller
        .handle_request(Route::UpdateSettings, ctx(), Bytes::new())
        .await
        .unwrap_err();

    assert!(err.is(ErrorKind::Internal));
    assert!(controller.settings().enabled);
}
