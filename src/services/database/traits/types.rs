//! Backend selection and connection configuration.
//!
//! This module contains:
//! - `BackendKind` - The two supported store kinds
//! - `DatabaseConfig` - Process-wide configuration, resolved once at startup
//! - `TlsMode` - Transport trust settings for the networked store

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the networked store connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable overriding the embedded store file path.
pub const DB_PATH_ENV: &str = "LARDER_DB_PATH";

/// Environment variable selecting the deployment environment.
pub const ENVIRONMENT_ENV: &str = "LARDER_ENV";

/// Well-known location of the embedded store.
pub const DEFAULT_SQLITE_PATH: &str = "data/larder.db";

/// Supported store kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Single-file, in-process SQLite store
    Embedded,
    /// Client/server PostgreSQL store behind a connection pool
    Networked,
}

impl BackendKind {
    /// Get the display name for this backend kind
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded (SQLite)",
            Self::Networked => "networked (PostgreSQL)",
        }
    }

    /// Short lowercase identifier used in logs and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Networked => "networked",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport trust settings for the networked store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TlsMode {
    /// Keep whatever `sslmode` the connection string asks for
    #[default]
    FromUrl,
    /// Require TLS and validate the server certificate and hostname
    VerifyFull,
}

/// Unified database configuration.
///
/// Resolved exactly once when the process starts and then passed by
/// reference to every component that needs it. Nothing downstream reads the
/// environment again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Networked store connection string. Selects the networked backend when present.
    pub database_url: Option<String>,
    /// Embedded store file, used when no connection string is configured
    pub sqlite_path: PathBuf,
    /// Production deployments validate the networked store's certificate
    pub production: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            production: false,
        }
    }
}

impl DatabaseConfig {
    /// Create a configuration for the embedded store at `path`
    pub fn embedded(path: impl Into<PathBuf>) -> Self {
        Self {
            sqlite_path: path.into(),
            ..Self::default()
        }
    }

    /// Create a configuration for the networked store at `url`
    pub fn networked(url: impl Into<String>) -> Self {
        Self {
            database_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Mark this configuration as a production deployment
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Build a configuration from already-read settings.
    ///
    /// An empty connection string counts as absent, so `DATABASE_URL=` in an
    /// env file still selects the embedded store.
    pub fn from_settings(
        database_url: Option<String>,
        sqlite_path: Option<PathBuf>,
        environment: Option<&str>,
    ) -> Self {
        let database_url = database_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Self {
            database_url,
            sqlite_path: sqlite_path.unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH)),
            production: environment
                .map(|env| env.trim().eq_ignore_ascii_case("production"))
                .unwrap_or(false),
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        let environment = std::env::var(ENVIRONMENT_ENV).ok();
        Self::from_settings(
            std::env::var(DATABASE_URL_ENV).ok(),
            std::env::var_os(DB_PATH_ENV).map(PathBuf::from),
            environment.as_deref(),
        )
    }

    /// The backend this configuration selects
    pub fn backend_kind(&self) -> BackendKind {
        if self.database_url.is_some() {
            BackendKind::Networked
        } else {
            BackendKind::Embedded
        }
    }

    /// Transport trust settings implied by the production flag
    pub fn tls_mode(&self) -> TlsMode {
        if self.production {
            TlsMode::VerifyFull
        } else {
            TlsMode::FromUrl
        }
    }

    /// Embedded store file path
    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    /// Human-readable target for logs, never including credentials
    pub fn display_target(&self) -> String {
        match &self.database_url {
            Some(url) => redact_url(url),
            None => self.sqlite_path.display().to_string(),
        }
    }
}

/// Strip the password from a connection string for display.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable connection string>".to_string(),
    }
}
