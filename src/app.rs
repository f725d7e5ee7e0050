//! Application assembly: repositories chosen from configuration, the route table, the
//! handler registry and the HTTP service around them.

use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, BackendKind};
use crate::controllers;
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, RepositoryError, RouteError};
use crate::middleware::AccessLogMiddleware;
use crate::repository::{
    ArticleRepository, ContactRepository, MemoryArticleRepository, MemoryContactRepository,
    MemoryUserRepository, RemoteBackend, UserRepository,
};
use crate::routes;
use crate::server::AppService;
use crate::session::SessionStore;
use crate::views::Views;

/// Everything handlers need, injected into their closures at start-up.
pub struct AppState {
    pub config: AppConfig,
    pub articles: Arc<dyn ArticleRepository>,
    pub users: Arc<dyn UserRepository>,
    pub contacts: Arc<dyn ContactRepository>,
}

impl AppState {
    /// Build the configured backend. The remote backend pings the service only when
    /// `backend.remote.verify_on_start` is set.
    pub fn from_config(config: AppConfig) -> Result<Self, RepositoryError> {
        match config.backend.kind {
            BackendKind::Memory => Self::in_memory(config),
            BackendKind::Remote => {
                let backend = RemoteBackend::connect(&config.backend.remote)?
                    .with_recent_days(config.articles.recent_days);
                info!(backend = "remote", "Repositories ready");
                Ok(Self::with_repositories(
                    config,
                    Arc::new(backend.articles()),
                    Arc::new(backend.users()),
                    Arc::new(backend.contacts()),
                ))
            }
        }
    }

    /// In-memory repositories, seeded with the sample articles when `backend.seed` is set.
    pub fn in_memory(config: AppConfig) -> Result<Self, RepositoryError> {
        let days = config.articles.recent_days;
        let articles = if config.backend.seed {
            MemoryArticleRepository::seeded()?
        } else {
            MemoryArticleRepository::new()
        };
        info!(backend = "memory", seeded = config.backend.seed, "Repositories ready");
        Ok(Self::with_repositories(
            config,
            Arc::new(articles.with_recent_days(days)),
            Arc::new(MemoryUserRepository::new().with_recent_days(days)),
            Arc::new(MemoryContactRepository::new().with_recent_days(days)),
        ))
    }

    #[must_use]
    pub fn with_repositories(
        config: AppConfig,
        articles: Arc<dyn ArticleRepository>,
        users: Arc<dyn UserRepository>,
        contacts: Arc<dyn ContactRepository>,
    ) -> Self {
        Self {
            config,
            articles,
            users,
            contacts,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("{} route(s) reference unregistered handlers: {}", .0.len(), describe(.0))]
    UnresolvedHandlers(Vec<DispatchError>),
}

fn describe(errors: &[DispatchError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Route table plus handler registry, verified so every route resolves.
pub fn build_dispatcher(state: &Arc<AppState>) -> Result<Dispatcher, BuildError> {
    let mut dispatcher = Dispatcher::new(routes::route_table()?);
    dispatcher.set_base_path(&state.config.base_path);
    controllers::register(&mut dispatcher, state);
    dispatcher.add_middleware(Arc::new(AccessLogMiddleware::new()));
    dispatcher.verify().map_err(BuildError::UnresolvedHandlers)?;
    Ok(dispatcher)
}

/// The HTTP service for `state`: dispatcher, session store and views.
pub fn build_service(state: &Arc<AppState>) -> Result<AppService, BuildError> {
    let dispatcher = build_dispatcher(state)?;
    let config = &state.config;
    let sessions = SessionStore::new(&config.session, &config.base_path);
    let views = Views::new(config.templates_dir.clone());
    Ok(AppService::new(
        Arc::new(dispatcher),
        Arc::new(sessions),
        views,
    ))
}
