//! reqscope services
//!
//! The collaborators behind the controller: the settings source with its
//! shared snapshot, and user creation with its store seam. Services report
//! failures as [`ApiError`](reqscope_protocol::ApiError) kinds and leave
//! status codes to the transport.

pub mod settings;
pub mod user;

pub use settings::{
    FileSettingsClient, SettingsClient, SettingsError, SettingsService, SettingsStore,
    StaticSettingsClient, UserSettings,
};
pub use user::{
    CreateUserRequest, CreateUserResponse, InMemoryUserStore, StoreError, StoredUser, UserService,
    UserStore, ValidationError, validate_create_user_request,
};
