//! # kettle
//!
//! A minimal web-application skeleton: a few informational endpoints, a few
//! deliberately failing ones, origin-restricted CORS, datetime-aware JSON
//! and templated error pages.
//!
//! ## The pieces
//!
//! - [`json`] — encode any `Serialize` value, decode objects with
//!   ISO-8601 strings turned into date-times
//! - [`CorsPolicy`] — whitelist check, CORS headers, preflight answers
//! - [`json_response`] — payload + headers + status in one response
//! - [`ErrorHandler`] — every handler error logged once and answered as an
//!   HTML page or a JSON object
//! - [`routes`] — the endpoints themselves
//!
//! Underneath sits a small framework: a radix-tree [`Router`], async
//! handlers returning `Result<impl IntoResponse, HandlerError>`, and a
//! hyper [`Server`] with graceful shutdown.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kettle::{App, AppConfig, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let addr = config.public_addr();
//!     Server::bind(addr).serve(App::new(config)).await.unwrap();
//! }
//! ```
//!
//! ## Writing a handler
//!
//! ```rust
//! use http::StatusCode;
//! use kettle::{HandlerError, HttpError, Request, Response, json_response};
//!
//! async fn whoami(req: Request) -> Result<Response, HandlerError> {
//!     let user = req.header("x-user").ok_or_else(HttpError::unauthorized)?;
//!     let cors = req.config().cors.headers(req.headers());
//!     Ok(json_response(&serde_json::json!({ "user": user }), StatusCode::OK, cors)?)
//! }
//! ```

mod app;
mod config;
mod error;
mod error_handler;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod templates;

pub mod cors;
pub mod json;
pub mod routes;

pub use app::App;
pub use config::{AppConfig, Args};
pub use cors::CorsPolicy;
pub use error::{Error, HandlerError, HttpError, InternalError};
pub use error_handler::{ErrorFormat, ErrorHandler};
pub use handler::{Handler, HandlerResult};
pub use request::{Request, RequestBuilder, Unrouted};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder, json_response};
pub use router::Router;
pub use server::Server;
