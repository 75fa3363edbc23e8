//! User creation: request decoding, validation, and the store seam.
//!
//! [`UserService::create_user`] never chooses a status code. Each failure is
//! tagged with an [`ErrorKind`](reqscope_protocol::ErrorKind) and the caller
//! decides how to answer the client.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqscope_protocol::scope;
use reqscope_protocol::{ApiError, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body of `POST /v1/user`.
///
/// Missing fields decode to empty values so validation can report every
/// problem at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub id: String,
}

/// Every failed check, in field order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .0.join("; "))]
pub struct ValidationError(pub Vec<&'static str>);

pub fn validate_create_user_request(req: &CreateUserRequest) -> Result<(), ValidationError> {
    let mut errs = Vec::with_capacity(5);

    if req.full_name.is_empty() {
        errs.push("full name is required");
    }
    if req.address.is_empty() {
        errs.push("address is required");
    }
    if req.city.is_empty() {
        errs.push("city is required");
    }
    if req.state.chars().count() != 2 {
        errs.push("state is required and must be 2 characters");
    }
    if req.zip_code == 0 {
        errs.push("zip code is required");
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(ValidationError(errs))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence seam for new users.
pub trait UserStore: Send + Sync + 'static {
    /// Insert `user` and return its new id.
    fn insert_user(
        &self,
        ctx: &Context,
        user: &CreateUserRequest,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;
}

impl<S: UserStore> UserStore for Arc<S> {
    fn insert_user(
        &self,
        ctx: &Context,
        user: &CreateUserRequest,
    ) -> impl Future<Output = Result<String, StoreError>> + Send {
        (**self).insert_user(ctx, user)
    }
}

/// A user as held by [`InMemoryUserStore`].
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: String,
    pub user: CreateUserRequest,
    /// Correlation id of the request that created the user.
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

/// Process-local user store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, StoredUser>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<StoredUser> {
        self.users.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for InMemoryUserStore {
    async fn insert_user(&self, ctx: &Context, user: &CreateUserRequest) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let stored = StoredUser {
            id: id.clone(),
            user: user.clone(),
            request_id: scope::request_id(ctx),
            created_at: Utc::now(),
        };
        self.users.insert(id.clone(), stored);
        debug!(user_id = %id, "User stored");
        Ok(id)
    }
}

/// Decode, validate, insert.
pub struct UserService<U> {
    store: U,
}

impl<U: UserStore> UserService<U> {
    pub fn new(store: U) -> Self {
        Self { store }
    }

    pub async fn create_user(&self, ctx: &Context, body: &[u8]) -> Result<CreateUserResponse, ApiError> {
        let request: CreateUserRequest = serde_json::from_slice(body)
            .map_err(|e| ApiError::bad_request(format!("failed to decode. {e}")))?;

        validate_create_user_request(&request).map_err(|e| {
            ApiError::bad_request(format!("failed to validate create user request. {e}"))
        })?;

        let id = self
            .store
            .insert_user(ctx, &request)
            .await
            .map_err(|e| ApiError::internal(format!("failed to insert user. {e}")))?;

        Ok(CreateUserResponse { id })
    }

    pub fn store(&self) -> &U {
        &self.store
    }
}
