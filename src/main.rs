//! kettle server binary.
//!
//! Run with:
//!   DEBUG=true cargo run
//!
//! Try:
//!   curl -i http://127.0.0.1:8080/app-info -H 'Origin: http://localhost:3000'
//!   curl -i -X OPTIONS http://127.0.0.1:8080/app-info -H 'Origin: https://evil.example'
//!   curl -i http://127.0.0.1:8080/teapot

use std::process::ExitCode;

use clap::Parser;
use kettle::{App, Args, Server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Args::parse().into_config();

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!(
        app = %config.app_name,
        version = %config.app_version,
        environment = config.environment(),
        error_format = ?config.error_format,
        "starting",
    );

    let addr = config.public_addr();
    match Server::bind(addr).serve(App::new(config)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}
