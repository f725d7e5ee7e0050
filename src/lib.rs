//! # El Faro
//!
//! **El Faro** is a small news site: article listings, registration and login with
//! subscription plans, a contact form and a profile page. It is built from a regex route
//! table, a static handler dispatcher and repositories that run either in memory or
//! against a PostgREST (Supabase) service.
//!
//! ## Architecture
//!
//! - **[`router`]** - Route table with exact-path buckets and ordered `{param}` patterns
//! - **[`dispatcher`]** - Path normalization, handler registry and middleware hooks
//! - **[`repository`]** - Entity contracts with in-memory and remote implementations
//! - **[`models`]** - Articles, users and contact messages
//! - **[`controllers`]** - Page and form handlers bound to `Controller.action` references
//! - **[`session`]** - Cookie sessions carrying the login, CSRF token and flash messages
//! - **[`server`]** - `tiny_http` listener served by a fixed worker pool
//! - **[`views`]** - Optional minijinja templates, JSON view-models otherwise
//! - **[`config`]** / **[`logging`]** - YAML configuration and `tracing` setup
//! - **[`cli`]** - The `elfaro` binary's commands
//!
//! ### Request Flow
//!
//! ```text
//! tiny_http worker
//!   -> server::parse_request      (headers, cookies, form or JSON body)
//!   -> SessionStore::load         (cookie -> SessionHandle)
//!   -> Dispatcher::dispatch       (normalize, RouteTable::lookup, bind params)
//!   -> Middleware::before / handler / Middleware::after
//!   -> Views::render              (template or JSON)
//!   -> SessionStore::save + Set-Cookie (sessions holding state only)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use elfaro::app::{build_dispatcher, AppState};
//! use elfaro::config::AppConfig;
//! use elfaro::dispatcher::HandlerRequest;
//! use http::Method;
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::from_config(AppConfig::default()).unwrap());
//! let dispatcher = build_dispatcher(&state).unwrap();
//!
//! let resp = dispatcher.dispatch(HandlerRequest::new(Method::GET, "/articulos/1"));
//! assert_eq!(resp.status, 200);
//! assert_eq!(resp.view.as_deref(), Some("articulos/show"));
//! ```
//!
//! ## Backends
//!
//! `backend.kind: memory` keeps everything in process and seeds the sample articles.
//! `backend.kind: remote` talks to `SUPABASE_URL` with `SUPABASE_KEY` (or
//! `SUPABASE_SERVICE_KEY`). Remote reads degrade to empty results when the service fails;
//! writes report a [`RepositoryError`](error::RepositoryError).

pub mod app;
pub mod cli;
pub mod config;
pub mod controllers;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod router;
pub mod routes;
pub mod security;
pub mod server;
pub mod session;
pub mod validation;
pub mod views;

pub use app::{build_dispatcher, build_service, AppState};
pub use config::AppConfig;
pub use dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
pub use router::RouteTable;
