//! # Configuration Module
//!
//! Application settings loaded from an optional YAML file and then overridden from the
//! environment.
//!
//! ## Loading order
//!
//! 1. Built-in defaults (every field has a serde default)
//! 2. The YAML file named by `--config` or `ELFARO_CONFIG`, if any
//! 3. Environment overrides
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `ELFARO_BIND_ADDR` | `bind_addr` |
//! | `ELFARO_BASE_PATH` | `base_path` |
//! | `ELFARO_WORKERS` | `workers` |
//! | `ELFARO_TEMPLATES_DIR` | `templates_dir` |
//! | `ELFARO_BACKEND` | `backend.kind` (`memory` or `remote`) |
//! | `SUPABASE_URL` | `backend.remote.url` |
//! | `SUPABASE_KEY` | `backend.remote.key` |
//! | `SUPABASE_SERVICE_KEY` | `backend.remote.service_key` |
//! | `ELFARO_BACKEND_TIMEOUT_SECS` | `backend.remote.timeout_secs` |
//! | `ELFARO_SESSION_LIFETIME_SECS` | `session.lifetime_secs` |
//!
//! ## Example
//!
//! ```yaml
//! app_name: El Faro
//! bind_addr: 0.0.0.0:8080
//! base_path: /elfaro
//! articles:
//!   per_page: 6
//! backend:
//!   kind: remote
//!   remote:
//!     url: https://project.supabase.co
//!     timeout_secs: 10
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "ELFARO_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub bind_addr: String,
    /// Deployment prefix such as `/elfaro`; empty when served at the root.
    pub base_path: String,
    pub workers: usize,
    /// Directory with `<view>.html` minijinja templates. Views without a template are
    /// answered as JSON.
    pub templates_dir: Option<PathBuf>,
    pub session: SessionConfig,
    pub articles: ArticlesConfig,
    pub backend: BackendConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "El Faro".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            base_path: String::new(),
            workers: 4,
            templates_dir: None,
            session: SessionConfig::default(),
            articles: ArticlesConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub lifetime_secs: u64,
    /// Add the `Secure` attribute to the session cookie.
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "elfaro_session".to_string(),
            lifetime_secs: 7200,
            secure: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticlesConfig {
    pub per_page: usize,
    pub recent_days: i64,
    /// Default `limite` of the recent-articles endpoint.
    pub recent_limit: usize,
}

impl Default for ArticlesConfig {
    fn default() -> Self {
        Self {
            per_page: 6,
            recent_days: 7,
            recent_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Memory => "memory",
            BackendKind::Remote => "remote",
        })
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "remote" | "supabase" => Ok(BackendKind::Remote),
            _ => Err(ConfigError::InvalidValue {
                key: "backend.kind",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Load the sample articles into the memory backend.
    pub seed: bool,
    pub remote: RemoteConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            seed: true,
            remote: RemoteConfig::default(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub key: Option<String>,
    pub service_key: Option<String>,
    pub schema: String,
    pub timeout_secs: u64,
    /// Check reachability when connecting.
    pub verify_on_start: bool,
    pub tables: TableNames,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            service_key: None,
            schema: "public".to_string(),
            timeout_secs: 30,
            verify_on_start: false,
            tables: TableNames::default(),
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("key", &redact(&self.key))
            .field("service_key", &redact(&self.service_key))
            .field("schema", &self.schema)
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_on_start", &self.verify_on_start)
            .field("tables", &self.tables)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub articles: String,
    pub users: String,
    pub contacts: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            articles: "articulos".to_string(),
            users: "usuarios".to_string(),
            contacts: "mensajes_contacto".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `path` (if given), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.normalize();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Apply overrides read through `lookup`, so tests need not touch the process env.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ELFARO_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = get("ELFARO_BASE_PATH") {
            self.base_path = v;
        }
        if let Some(v) = get("ELFARO_WORKERS") {
            self.workers = parse_number("workers", &v)?;
        }
        if let Some(v) = get("ELFARO_TEMPLATES_DIR") {
            self.templates_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("ELFARO_BACKEND") {
            self.backend.kind = v.parse()?;
        }
        if let Some(v) = get("SUPABASE_URL") {
            self.backend.remote.url = Some(v);
        }
        if let Some(v) = get("SUPABASE_KEY") {
            self.backend.remote.key = Some(v);
        }
        if let Some(v) = get("SUPABASE_SERVICE_KEY") {
            self.backend.remote.service_key = Some(v);
        }
        if let Some(v) = get("ELFARO_BACKEND_TIMEOUT_SECS") {
            self.backend.remote.timeout_secs = parse_number("backend.remote.timeout_secs", &v)?;
        }
        if let Some(v) = get("ELFARO_SESSION_LIFETIME_SECS") {
            self.session.lifetime_secs = parse_number("session.lifetime_secs", &v)?;
        }
        Ok(())
    }

    /// Canonical `base_path` (leading slash, no trailing slash) and at least one worker.
    pub fn normalize(&mut self) {
        self.base_path = normalize_base_path(&self.base_path);
        self.workers = self.workers.max(1);
        self.articles.per_page = self.articles.per_page.max(1);
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// `elfaro/` becomes `/elfaro`; `/` and blank become empty.
#[must_use]
pub fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
