//! lineframe: a line-framed TCP server
//!
//! Clients send newline-terminated lines; the server answers with one JSON
//! envelope line (`message`, `code`, `data`) per request.
//!
//! Protocols:
//! - `head`: an HTTP/1.1 request head ended by a blank line, echoed back parsed
//! - `verbatim`: each line echoed back as soon as it arrives
//!
//! Configuration via CLI arguments or TOML file.

mod config;
mod envelope;
mod error;
mod protocols;
mod reader;
mod server;

use config::Config;
use error::ServerError;
use server::Server;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Load configuration; logging is not set up yet
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        protocol = ?config.protocol,
        accept_errors = ?config.accept_errors,
        read_timeout = ?config.connection.read_timeout,
        max_line_length = ?config.connection.max_line_length,
        workers = ?config.workers,
        "Starting lineframe server"
    );

    // Bind and accept failures are reported here and nowhere else
    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server stopped");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), ServerError> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers.filter(|&n| n > 0) {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(async {
        let server = Server::bind(config).await?;
        server.run().await
    })
}
