//! User settings: where they come from and the shared snapshot every
//! request reads.
//!
//! The snapshot lives behind a `parking_lot::RwLock<Arc<_>>`. A refresh
//! builds the new value first and swaps the pointer, so a reader always gets
//! a complete snapshot and the last successful refresh wins. A failed
//! refresh leaves the previous snapshot in place.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use reqscope_protocol::ApiError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Settings controlling the user endpoints.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Credential for downstream calls. Never echoed back to clients.
    #[serde(default, skip_serializing)]
    pub api_key: String,
}

impl fmt::Debug for UserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSettings")
            .field("enabled", &self.enabled)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings source unavailable: {0}")]
    Unavailable(String),
}

/// A source of [`UserSettings`].
pub trait SettingsClient: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<UserSettings, SettingsError>> + Send;
}

/// Reads settings from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct FileSettingsClient {
    path: PathBuf,
}

impl FileSettingsClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsClient for FileSettingsClient {
    async fn fetch(&self) -> Result<UserSettings, SettingsError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SettingsError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// In-process settings source. The value can be swapped, or the source
/// switched into a failing state, to drive refresh scenarios.
#[derive(Debug)]
pub struct StaticSettingsClient {
    current: RwLock<Option<UserSettings>>,
}

impl StaticSettingsClient {
    pub fn new(settings: UserSettings) -> Self {
        Self {
            current: RwLock::new(Some(settings)),
        }
    }

    /// A source whose every fetch fails.
    pub fn failing() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    pub fn set(&self, settings: UserSettings) {
        *self.current.write() = Some(settings);
    }

    pub fn set_failing(&self) {
        *self.current.write() = None;
    }
}

impl SettingsClient for StaticSettingsClient {
    async fn fetch(&self) -> Result<UserSettings, SettingsError> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| SettingsError::Unavailable("static source is failing".into()))
    }
}

impl<C: SettingsClient> SettingsClient for Arc<C> {
    fn fetch(&self) -> impl Future<Output = Result<UserSettings, SettingsError>> + Send {
        (**self).fetch()
    }
}

/// Shared settings snapshot.
#[derive(Debug, Default)]
pub struct SettingsStore {
    current: RwLock<Arc<UserSettings>>,
}

impl SettingsStore {
    pub fn new(settings: UserSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    pub fn load(&self) -> Arc<UserSettings> {
        self.current.read().clone()
    }

    pub fn replace(&self, settings: UserSettings) -> Arc<UserSettings> {
        let next = Arc::new(settings);
        *self.current.write() = next.clone();
        next
    }
}

/// Loads settings from a client into the shared store.
pub struct SettingsService<C> {
    client: C,
    store: SettingsStore,
}

impl<C: SettingsClient> SettingsService<C> {
    /// Starts from default settings (disabled) until the first
    /// [`SettingsService::initialize`].
    pub fn new(client: C) -> Self {
        Self {
            client,
            store: SettingsStore::default(),
        }
    }

    /// Fetch from the client and publish the result.
    pub async fn initialize(&self) -> Result<Arc<UserSettings>, ApiError> {
        debug!("Fetching user settings");
        match self.client.fetch().await {
            Ok(settings) => {
                let settings = self.store.replace(settings);
                info!(enabled = settings.enabled, "User settings loaded");
                Ok(settings)
            }
            Err(e) => {
                warn!(error = %e, "User settings fetch failed; keeping previous snapshot");
                Err(ApiError::internal(format!("failed to get user settings. {e}")))
            }
        }
    }

    pub fn current(&self) -> Arc<UserSettings> {
        self.store.load()
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}
