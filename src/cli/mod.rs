//! # CLI Module
//!
//! Command-line entry points for the `elfaro` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Load the configuration, build the repositories, route table and handler registry,
//! verify that every route resolves and serve until SIGINT or SIGTERM:
//!
//! ```bash
//! elfaro --config elfaro.yaml serve --addr 127.0.0.1:8080 --backend memory
//! ```
//!
//! ### `routes`
//!
//! Print the route table in registration order:
//!
//! ```bash
//! elfaro routes
//! ```
//!
//! ### `check-backend`
//!
//! Build the configured backend with the reachability check enabled:
//!
//! ```bash
//! SUPABASE_URL=https://xyz.supabase.co SUPABASE_KEY=... elfaro check-backend
//! ```
//!
//! The configuration file can also be given through `ELFARO_CONFIG`. Environment
//! overrides (`ELFARO_BIND_ADDR`, `ELFARO_BACKEND`, ...) apply after the file.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{check_backend, run, run_cli, write_routes, Cli, Commands};
