use std::path::PathBuf;

use clap::Parser;
use regols::{Backend, Config};
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

/// Language server for Rego policies, speaking LSP over stdin/stdout.
#[derive(Debug, Parser)]
#[command(name = "regols", version, about)]
struct Cli {
    /// Log filter, e.g. `info` or `regols=debug`.  Overrides `REGOLS_LOG`
    /// and the configuration file.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Configuration file to use instead of `.regols.toml` or the user
    /// configuration.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), None);

    let filter = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("REGOLS_LOG").ok())
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "warn".to_string());
    // stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting regols");

    let (service, socket) = LspService::new(|client| Backend::with_config(client, cli.config.clone(), config.clone()));
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;
}
