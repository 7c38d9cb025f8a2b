//! Firestore connection settings
//!
//! Where the gRPC driver connects and how it authenticates. Settings are
//! plain data; [`Settings::from_env`] fills them from the environment the
//! way the Google client libraries do.

use std::env;
use std::time::Duration;

/// Host of the production Firestore backend
pub const DEFAULT_HOST: &str = "firestore.googleapis.com";

/// Database id used when none is configured
pub const DEFAULT_DATABASE_ID: &str = "(default)";

/// Token the Firestore emulator accepts as an admin credential
pub const EMULATOR_TOKEN: &str = "owner";

/// Emulator address, e.g. `localhost:8080`
pub const ENV_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";
/// Project id
pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
/// Project id, legacy name
pub const ENV_PROJECT_LEGACY: &str = "GCLOUD_PROJECT";
/// Database id
pub const ENV_DATABASE_ID: &str = "FIRESTORE_DATABASE_ID";
/// OAuth2 access token sent as a Bearer credential
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Settings for configuring a Firestore connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Google Cloud project id
    pub project_id: String,

    /// Database id within the project
    ///
    /// Default: "(default)"
    pub database_id: String,

    /// Host of the Firestore backend to connect to
    ///
    /// Default: "firestore.googleapis.com"
    pub host: String,

    /// Whether to use SSL for communication
    ///
    /// Default: true
    pub ssl_enabled: bool,

    /// Bearer token attached to every request, if any
    pub access_token: Option<String>,

    /// Per-request timeout
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Timeout for establishing the channel
    ///
    /// Default: 10 seconds
    pub connect_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            database_id: DEFAULT_DATABASE_ID.to_string(),
            host: DEFAULT_HOST.to_string(),
            ssl_enabled: true,
            access_token: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Settings for a project on production Firestore
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    /// Settings for the local emulator: plain-text transport, admin token
    pub fn emulator(project_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            host: host.into(),
            ssl_enabled: false,
            access_token: Some(EMULATOR_TOKEN.to_string()),
            ..Self::default()
        }
    }

    /// Read settings from the process environment
    ///
    /// Returns `None` when no project id is configured.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let project_id = non_empty(ENV_PROJECT).or_else(|| non_empty(ENV_PROJECT_LEGACY))?;
        let mut settings = match non_empty(ENV_EMULATOR_HOST) {
            Some(host) => Self::emulator(project_id, host),
            None => Self::new(project_id),
        };
        if let Some(database_id) = non_empty(ENV_DATABASE_ID) {
            settings.database_id = database_id;
        }
        if let Some(token) = non_empty(ENV_ACCESS_TOKEN) {
            settings.access_token = Some(token);
        }
        Some(settings)
    }

    /// Set the database id
    pub fn with_database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    /// Set the bearer token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// `projects/{project}/databases/{database}`
    pub fn database_path(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database_id)
    }

    /// Root under which document paths are resolved
    pub fn documents_root(&self) -> String {
        format!("{}/documents", self.database_path())
    }

    /// Endpoint URL including scheme
    pub fn endpoint(&self) -> String {
        let scheme = if self.ssl_enabled { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }
}
