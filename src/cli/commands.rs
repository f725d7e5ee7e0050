use crate::app::{self, AppState};
use crate::config::{AppConfig, BackendKind, CONFIG_ENV};
use crate::router::RouteTable;
use crate::routes;
use crate::server::{HttpServer, ServerHandle};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line interface for the El Faro server
#[derive(Debug, Parser)]
#[command(name = "elfaro", version)]
#[command(about = "El Faro news site", long_about = None)]
pub struct Cli {
    /// YAML configuration file; every section is optional
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the site until SIGINT or SIGTERM
    Serve {
        /// Address and port to bind, overriding `bind_addr`
        #[arg(long)]
        addr: Option<String>,

        /// Repository backend: memory or remote
        #[arg(long)]
        backend: Option<BackendKind>,
    },
    /// Print the route table in registration order
    Routes,
    /// Connect to the configured backend with the reachability check enabled
    CheckBackend,
}

/// Parse the process arguments and run the selected command.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded, the backend cannot be built, a
/// route reference is unresolved, or the listener cannot bind.
pub fn run_cli() -> anyhow::Result<()> {
    run(Cli::parse())
}

/// Run an already parsed command line.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    match cli.command {
        Commands::Serve { addr, backend } => serve(config, addr, backend),
        Commands::Routes => {
            let table = routes::route_table()?;
            write_routes(&table, &mut io::stdout().lock())?;
            Ok(())
        }
        Commands::CheckBackend => {
            let report = check_backend(config)?;
            println!("{report}");
            Ok(())
        }
    }
}

fn serve(
    mut config: AppConfig,
    addr: Option<String>,
    backend: Option<BackendKind>,
) -> anyhow::Result<()> {
    if let Some(addr) = addr {
        config.bind_addr = addr;
    }
    if let Some(kind) = backend {
        config.backend.kind = kind;
    }

    let state = Arc::new(AppState::from_config(config).context("failed to build repositories")?);
    let service = app::build_service(&state)?;
    service.dispatcher.routes().log_summary();

    let config = &state.config;
    let handle = HttpServer(service)
        .start(config.bind_addr.as_str(), config.workers)
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    install_signal_handlers(&handle)?;
    handle.join();
    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
fn install_signal_handlers(handle: &ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, handle.stop_flag())
            .with_context(|| format!("failed to register handler for signal {signal}"))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers(_handle: &ServerHandle) -> anyhow::Result<()> {
    Ok(())
}

/// One line per binding: method, pattern, handler reference.
pub fn write_routes(table: &RouteTable, out: &mut impl Write) -> io::Result<()> {
    for route in table.routes() {
        writeln!(
            out,
            "{:<5} {:<36} {}",
            route.method.as_str(),
            route.pattern,
            route.handler_name
        )?;
    }
    Ok(())
}

/// Build the configured repositories with the reachability check forced on and describe the result.
pub fn check_backend(mut config: AppConfig) -> anyhow::Result<String> {
    config.backend.remote.verify_on_start = true;
    let kind = config.backend.kind;
    let state = AppState::from_config(config)
        .with_context(|| format!("{kind} backend is not reachable"))?;
    Ok(format!(
        "{kind} backend reachable: {} articles, {} users, {} contact messages",
        state.articles.count(),
        state.users.count(),
        state.contacts.count()
    ))
}
