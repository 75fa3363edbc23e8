//! Controller: owns the services and dispatches routes to them.
//!
//! Only the handlers here know about the full set of outcomes a route can
//! produce; the services below report failures as error kinds and the
//! transport turns those kinds into statuses.

use std::sync::Arc;

use bytes::Bytes;
use reqscope_protocol::scope;
use reqscope_protocol::{ApiError, Context, HandlerResult, Reply, Route};
use reqscope_services::{
    SettingsClient, SettingsService, UserService, UserSettings, UserStore,
};
use reqscope_transport::RequestHandler;
use serde_json::json;
use tracing::{error, info};

use crate::middleware::{Middleware, MiddlewareChain};

/// The controller: owns settings and user services and routes requests.
pub struct Controller<S, U> {
    /// Settings source and the shared snapshot
    settings: SettingsService<S>,
    /// User creation
    users: UserService<U>,
    /// Middleware chain
    middleware: MiddlewareChain,
    /// Controller state
    state: ServerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Uninitialized,
    Running,
}

impl<S: SettingsClient, U: UserStore> Controller<S, U> {
    pub fn new(settings_client: S, user_store: U) -> Self {
        Self {
            settings: SettingsService::new(settings_client),
            users: UserService::new(user_store),
            middleware: MiddlewareChain::new(),
            state: ServerState::Uninitialized,
        }
    }

    /// Register a middleware with the controller.
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        info!("Registering middleware: {}", middleware.name());
        self.middleware.add(middleware);
    }

    /// Load settings for the first time. Requests are refused until this
    /// succeeds.
    pub async fn initialize(&mut self) -> Result<(), ApiError> {
        info!("Initializing controller");

        self.settings.initialize().await?;

        self.state = ServerState::Running;
        info!(middleware = ?self.middleware.names(), "Controller initialized");
        Ok(())
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<UserSettings> {
        self.settings.current()
    }

    pub fn settings_client(&self) -> &S {
        self.settings.client()
    }

    pub fn user_store(&self) -> &U {
        self.users.store()
    }

    /// `POST /v1/update-settings`: refetch settings so every later request
    /// sees them.
    async fn update_user_settings(&self, ctx: &Context) -> HandlerResult {
        let settings = match self.settings.initialize().await {
            Ok(settings) => settings,
            Err(err) => {
                error!(
                    handler = Route::UpdateSettings.name(),
                    request_id = %scope::request_id(ctx),
                    error = %err,
                    "failed to update user settings"
                );
                return Err(err);
            }
        };

        let data = serde_json::to_value(&*settings)
            .map_err(|e| ApiError::internal(format!("failed to encode settings. {e}")))?;
        Ok(Reply::ok(data))
    }

    /// `POST /v1/user`
    async fn create_user(&self, ctx: &Context, body: &[u8]) -> HandlerResult {
        if !self.settings.current().enabled {
            return Err(ApiError::not_implemented("user creation is disabled"));
        }

        let data = scope::scope(ctx);
        match self.users.create_user(ctx, body).await {
            Ok(created) => {
                info!(
                    handler = Route::CreateUser.name(),
                    request_id = %data.request_id,
                    user_id = %created.id,
                    "user created"
                );
                Ok(Reply::created(json!({ "id": created.id })))
            }
            Err(err) => {
                error!(
                    handler = Route::CreateUser.name(),
                    request_id = %data.request_id,
                    ip_address = %data.ip_address,
                    error = %err,
                    "failed to create user"
                );
                Err(err)
            }
        }
    }
}

impl<S: SettingsClient, U: UserStore> RequestHandler for Controller<S, U> {
    async fn handle_request(&self, route: Route, ctx: Context, body: Bytes) -> HandlerResult {
        if self.state != ServerState::Running {
            return Err(ApiError::unavailable("controller is not initialized"));
        }

        // Run middleware before-chain
        let mw_result = self.middleware.run_before(route, ctx).await;
        if !mw_result.allowed {
            return Err(mw_result
                .error
                .unwrap_or_else(|| ApiError::unavailable("request blocked by middleware")));
        }
        let ctx = mw_result.context;

        let result = match route {
            Route::CreateUser => self.create_user(&ctx, &body).await,
            Route::UpdateSettings => self.update_user_settings(&ctx).await,
        };

        // Run middleware after-chain on success
        if let Ok(ref reply) = result {
            self.middleware.run_after(route, &ctx, reply).await;
        }

        result
    }
}
