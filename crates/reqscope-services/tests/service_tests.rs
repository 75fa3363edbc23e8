//! Service-level tests: user creation through `UserService` with real and
//! failing stores, and settings refresh through `SettingsService`.

use std::sync::Arc;

use reqscope_protocol::scope::{self, RequestScope};
use reqscope_protocol::{Context, ErrorKind};
use serde_json::json;

// ─────────────────────────────────────────────────────────────────────────────
// User service tests
// ─────────────────────────────────────────────────────────────────────────────

mod user {
    use super::*;
    use reqscope_services::{CreateUserRequest, InMemoryUserStore, StoreError, UserService, UserStore};

    struct BrokenStore;

    impl UserStore for BrokenStore {
        async fn insert_user(&self, _ctx: &Context, _user: &CreateUserRequest) -> Result<String, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn ctx() -> Context {
        scope::set_scope(&Context::background(), RequestScope::new("req-1", "127.0.0.1"))
    }

    fn body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "full_name": "Grace Hopper",
            "address": "1 Navy Way",
            "city": "Arlington",
            "state": "VA",
            "zip_code": 22201,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn creates_user_with_fresh_id() {
        let store = Arc::new(InMemoryUserStore::new());
        let svc = UserService::new(store.clone());

        let first = svc.create_user(&ctx(), &body()).await.unwrap();
        let second = svc.create_user(&ctx(), &body()).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&first.id).unwrap().user.city, "Arlington");
    }

    #[tokio::test]
    async fn undecodable_body_is_bad_request() {
        let svc = UserService::new(InMemoryUserStore::new());
        let err = svc.create_user(&ctx(), b"{not json").await.unwrap_err();

        assert!(err.is(ErrorKind::BadRequest));
        assert!(err.message().starts_with("failed to decode. "));
        assert!(svc.store().is_empty());
    }

    #[tokio::test]
    async fn wrong_field_type_is_bad_request() {
        let svc = UserService::new(InMemoryUserStore::new());
        let body = serde_json::to_vec(&json!({"zip_code": "22201"})).unwrap();
        let err = svc.create_user(&ctx(), &body).await.unwrap_err();
        assert!(err.is(ErrorKind::BadRequest));
    }

    #[tokio::test]
    async fn invalid_fields_are_bad_request_with_joined_messages() {
        let svc = UserService::new(InMemoryUserStore::new());
        let body = serde_json::to_vec(&json!({
            "full_name": "Grace Hopper",
            "address": "1 Navy Way",
            "state": "Virginia",
            "zip_code": 22201,
        }))
        .unwrap();

        let err = svc.create_user(&ctx(), &body).await.unwrap_err();

        assert!(err.is(ErrorKind::BadRequest));
        assert_eq!(
            err.to_string(),
            "failed to validate create user request. city is required; \
             state is required and must be 2 characters. input error"
        );
    }

    #[tokio::test]
    async fn store_failure_is_internal() {
        let svc = UserService::new(BrokenStore);
        let err = svc.create_user(&ctx(), &body()).await.unwrap_err();

        assert!(err.is(ErrorKind::Internal));
        assert_eq!(
            err.message(),
            "failed to insert user. user store unavailable: connection refused"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings service tests
// ─────────────────────────────────────────────────────────────────────────────

mod settings {
    use super::*;
    use reqscope_services::{SettingsService, StaticSettingsClient, UserSettings};

    #[tokio::test]
    async fn starts_disabled_before_initialize() {
        let svc = SettingsService::new(StaticSettingsClient::new(UserSettings {
            enabled: true,
            api_key: "k".into(),
        }));
        assert!(!svc.current().enabled);

        svc.initialize().await.unwrap();
        assert!(svc.current().enabled);
    }

    #[tokio::test]
    async fn failing_source_reports_internal() {
        let svc = SettingsService::new(StaticSettingsClient::failing());
        let err = svc.initialize().await.unwrap_err();
        assert!(err.is(ErrorKind::Internal));
        assert!(!svc.current().enabled);
    }

    #[tokio::test]
    async fn readers_see_complete_snapshots_during_refresh() {
        let client = Arc::new(StaticSettingsClient::new(UserSettings {
            enabled: true,
            api_key: "a".into(),
        }));
        let svc = Arc::new(SettingsService::new(client.clone()));
        svc.initialize().await.unwrap();

        let reader = {
            let svc = svc.clone();
            tokio::spawn(async move {
                for _ in 0..1_000 {
                    let snapshot = svc.current();
                    // enabled and api_key are always published together
                    assert_eq!(snapshot.enabled, snapshot.api_key == "a");
                    tokio::task::yield_now().await;
                }
            })
        };

        for i in 0..100 {
            if i % 2 == 0 {
                client.set(UserSettings::default());
            } else {
                client.set(UserSettings {
                    enabled: true,
                    api_key: "a".into(),
                });
            }
            svc.initialize().await.unwrap();
            tokio::task::yield_now().await;
        }

        reader.await.unwrap();
    }
}
