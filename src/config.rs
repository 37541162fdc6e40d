//! Application configuration.
//!
//! Everything is read once at startup, from command-line flags or the
//! environment variables backing them, and frozen into an [`AppConfig`].
//!
//! | Flag | Environment | Default |
//! |---|---|---|
//! | `--app-name` | `APP_NAME` | `kettle` |
//! | `--app-version` | `APP_VERSION` | crate version |
//! | `--production` | `PRODUCTION` | `false` |
//! | `--debug` | `DEBUG` | `false` |
//! | `--host` | `HOST` | `127.0.0.1` |
//! | `--public-port` | `PUBLIC_PORT` | `8080` |
//! | `--private-port` | `PRIVATE_PORT` | `8000` |
//! | `--error-format` | `ERROR_FORMAT` | `html` |
//! | `--static-dir` | `STATIC_DIR` | `static` |
//! | `--cors-origins` | `CORS_ORIGINS` | the three demo app origins |
//! | `--max-content-length` | `MAX_CONTENT_LENGTH` | `8388608` (8 MiB) |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::cors::{CorsPolicy, DEFAULT_ORIGINS};
use crate::error_handler::ErrorFormat;

/// Largest request body accepted by default.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 8 * 1024 * 1024;

/// Immutable, process-wide settings shared by every request.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub app_name: String,
    pub app_version: String,
    pub production: bool,
    pub debug: bool,
    pub host: IpAddr,
    pub public_port: u16,
    pub private_port: u16,
    pub error_format: ErrorFormat,
    pub static_dir: PathBuf,
    pub cors: CorsPolicy,
    /// Request bodies above this many bytes are answered with `413`.
    pub max_content_length: usize,
}

impl AppConfig {
    /// `"production"` or `"development"`.
    pub fn environment(&self) -> &'static str {
        if self.production { "production" } else { "development" }
    }

    /// Address the public listener binds to.
    pub fn public_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.public_port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_owned(),
            app_version: env!("CARGO_PKG_VERSION").to_owned(),
            production: false,
            debug: false,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            public_port: 8080,
            private_port: 8000,
            error_format: ErrorFormat::Html,
            static_dir: PathBuf::from("static"),
            cors: CorsPolicy::default(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

/// Command-line arguments. Each one falls back to an environment variable.
#[derive(Debug, Parser)]
#[command(name = "kettle", version, about)]
pub struct Args {
    /// Application name reported by /app-info.
    #[arg(long, env = "APP_NAME", default_value = env!("CARGO_PKG_NAME"))]
    pub app_name: String,

    /// Application version reported by /app-info.
    #[arg(long, env = "APP_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub app_version: String,

    /// Run in production mode.
    #[arg(
        long, env = "PRODUCTION", action = ArgAction::Set, num_args = 0..=1,
        default_value_t = false, default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new(),
    )]
    pub production: bool,

    /// Log error backtraces and lower the log level to debug.
    #[arg(
        long, env = "DEBUG", action = ArgAction::Set, num_args = 0..=1,
        default_value_t = false, default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new(),
    )]
    pub debug: bool,

    /// Interface to listen on.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port the HTTP server listens on.
    #[arg(long, env = "PUBLIC_PORT", default_value_t = 8080)]
    pub public_port: u16,

    /// Port of the private (upstream) listener, shown on the index page.
    #[arg(long, env = "PRIVATE_PORT", default_value_t = 8000)]
    pub private_port: u16,

    /// How errors are rendered to clients.
    #[arg(long, env = "ERROR_FORMAT", value_enum, default_value_t = ErrorFormat::Html)]
    pub error_format: ErrorFormat,

    /// Directory served for paths without a dedicated route.
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Comma-separated list of exactly-matched CORS origins.
    #[arg(
        long, env = "CORS_ORIGINS", value_delimiter = ',',
        default_values_t = DEFAULT_ORIGINS.map(String::from),
    )]
    pub cors_origins: Vec<String>,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "MAX_CONTENT_LENGTH", default_value_t = DEFAULT_MAX_CONTENT_LENGTH)]
    pub max_content_length: usize,
}

impl Args {
    pub fn into_config(self) -> AppConfig {
        AppConfig {
            app_name: self.app_name,
            app_version: self.app_version,
            production: self.production,
            debug: self.debug,
            host: self.host,
            public_port: self.public_port,
            private_port: self.private_port,
            error_format: self.error_format,
            static_dir: self.static_dir,
            cors: CorsPolicy::new(self.cors_origins.into_iter().map(|o| o.trim().to_owned())),
            max_content_length: self.max_content_length,
        }
    }
}
