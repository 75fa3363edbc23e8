//! Controller routes.
//!
//! Paths carry a version prefix so later revisions can live alongside them.

/// A route the controller serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `POST /v1/user`
    CreateUser,
    /// `POST /v1/update-settings`
    UpdateSettings,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::CreateUser, Route::UpdateSettings];

    pub fn path(&self) -> &'static str {
        match self {
            Self::CreateUser => "/v1/user",
            Self::UpdateSettings => "/v1/update-settings",
        }
    }

    /// Handler name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateUser => "CreateUser",
            Self::UpdateSettings => "UpdateUserSettings",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|route| route.path() == path)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
