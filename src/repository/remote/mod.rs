//! Hosted backend speaking the PostgREST protocol.
//!
//! One [`PostgrestClient`] is shared by the three repositories. Reads that fail are
//! logged with the table name and answered with an empty or absent result; writes
//! return [`RepositoryError`].

mod articles;
pub mod client;
mod contacts;
pub mod query;
mod users;

pub use articles::RemoteArticleRepository;
pub use client::{ClientError, PostgrestClient};
pub use contacts::RemoteContactRepository;
pub use users::RemoteUserRepository;

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{RepoResult, DEFAULT_RECENT_DAYS};
use crate::config::{RemoteConfig, TableNames};
use crate::error::RepositoryError;

/// Connected remote backend; hands out repositories bound to its tables.
#[derive(Clone)]
pub struct RemoteBackend {
    client: Arc<PostgrestClient>,
    tables: TableNames,
    recent_days: i64,
}

impl RemoteBackend {
    /// Build the client from configuration. When `verify_on_start` is set, check that the
    /// service is reachable.
    ///
    /// Fails with `BackendUnavailable` when the URL or key is missing or unusable, or
    /// when the ping does not get a successful answer.
    pub fn connect(config: &RemoteConfig) -> RepoResult<Self> {
        let url = non_empty(config.url.as_deref())
            .ok_or_else(|| RepositoryError::BackendUnavailable("backend url is not set".into()))?;
        let key = non_empty(config.key.as_deref())
            .ok_or_else(|| RepositoryError::BackendUnavailable("backend key is not set".into()))?;
        let client = PostgrestClient::new(
            url,
            key,
            non_empty(config.service_key.as_deref()),
            &config.schema,
            Duration::from_secs(config.timeout_secs.max(1)),
        )?;
        let backend = Self {
            client: Arc::new(client),
            tables: config.tables.clone(),
            recent_days: DEFAULT_RECENT_DAYS,
        };
        if config.verify_on_start {
            backend.ping()?;
        }
        info!(
            rest_url = %backend.client.rest_url(),
            schema = %config.schema,
            "Remote backend configured"
        );
        Ok(backend)
    }

    #[must_use]
    pub fn with_recent_days(mut self, days: i64) -> Self {
        self.recent_days = days;
        self
    }

    pub fn ping(&self) -> RepoResult<()> {
        self.client.ping().map_err(|e| {
            warn!(error = %e, "Remote backend ping failed");
            RepositoryError::BackendUnavailable(e.to_string())
        })
    }

    #[must_use]
    pub fn articles(&self) -> RemoteArticleRepository {
        RemoteArticleRepository::new(
            Arc::clone(&self.client),
            self.tables.articles.clone(),
            self.recent_days,
        )
    }

    #[must_use]
    pub fn users(&self) -> RemoteUserRepository {
        RemoteUserRepository::new(
            Arc::clone(&self.client),
            self.tables.users.clone(),
            self.recent_days,
        )
    }

    #[must_use]
    pub fn contacts(&self) -> RemoteContactRepository {
        RemoteContactRepository::new(
            Arc::clone(&self.client),
            self.tables.contacts.clone(),
            self.recent_days,
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Log a failed read and fall back to `default`.
pub(crate) fn degrade<T>(
    table: &str,
    operation: &'static str,
    result: Result<T, ClientError>,
    default: T,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!(table, operation, error = %e, "Remote read failed");
            default
        }
    }
}

/// Log a failed write and map it into the repository taxonomy.
pub(crate) fn write_error(
    table: &str,
    operation: &'static str,
    unique_field: Option<(&'static str, &str)>,
    e: ClientError,
) -> RepositoryError {
    error!(table, operation, error = %e, "Remote write failed");
    e.into_write_error(operation, unique_field)
}
