//! Unit tests for CLI commands

use crate::cli::{check_backend, write_routes, Cli, Commands};
use crate::config::{AppConfig, BackendKind};
use crate::routes::route_table;
use clap::Parser;

#[test]
fn test_serve_command_with_flags() {
    let cli = Cli::try_parse_from([
        "elfaro",
        "serve",
        "--addr",
        "127.0.0.1:9000",
        "--backend",
        "remote",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve { addr, backend } => {
            assert_eq!(addr.as_deref(), Some("127.0.0.1:9000"));
            assert_eq!(backend, Some(BackendKind::Remote));
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_config_flag_is_global() {
    let cli = Cli::try_parse_from(["elfaro", "routes", "--config", "elfaro.yaml"]).unwrap();
    assert!(matches!(cli.command, Commands::Routes));
    assert_eq!(cli.config.unwrap().to_string_lossy(), "elfaro.yaml");
}

#[test]
fn test_rejects_unknown_backend() {
    assert!(Cli::try_parse_from(["elfaro", "serve", "--backend", "mysql"]).is_err());
}

#[test]
fn test_all_commands_parse() {
    let commands = vec![
        vec!["elfaro", "serve"],
        vec!["elfaro", "routes"],
        vec!["elfaro", "check-backend"],
    ];

    for args in commands {
        let cli = Cli::try_parse_from(&args);
        assert!(cli.is_ok(), "Failed to parse command: {:?}", args);
    }
}

#[test]
fn test_routes_listing_keeps_registration_order() {
    let mut out = Vec::new();
    write_routes(&route_table().unwrap(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 19);
    assert!(lines[0].starts_with("GET   / "));
    assert!(lines[0].ends_with("Home.index"));
    assert!(text.contains("POST  /perfil/actualizar"));
}

#[test]
fn test_check_backend_memory() {
    let report = check_backend(AppConfig::default()).unwrap();
    assert_eq!(
        report,
        "memory backend reachable: 9 articles, 0 users, 0 contact messages"
    );
}

#[test]
fn test_check_backend_remote_without_credentials() {
    let mut config = AppConfig::default();
    config.backend.kind = BackendKind::Remote;
    let err = check_backend(config).unwrap_err();
    assert_eq!(err.to_string(), "remote backend is not reachable");
}
