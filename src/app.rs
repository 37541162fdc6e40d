//! The application: routing, configuration and error translation in one place.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use http::header::ORIGIN;
use http::HeaderMap;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{HandlerError, HttpError, InternalError};
use crate::error_handler::ErrorHandler;
use crate::request::Unrouted;
use crate::response::Response;
use crate::router::{Lookup, Router};
use crate::routes;

/// A fully wired application, ready for [`Server::serve`](crate::Server::serve).
///
/// [`App::handle`] never fails: handler errors, unknown paths, wrong
/// methods and panicking handlers all end up as responses built by the
/// [`ErrorHandler`].
pub struct App {
    router: Router,
    config: Arc<AppConfig>,
    errors: ErrorHandler,
}

impl App {
    /// The standard application with every route of [`routes`] registered.
    pub fn new(config: AppConfig) -> Self {
        Self::with_router(config, routes::router())
    }

    pub fn with_router(config: AppConfig, router: Router) -> Self {
        let errors = ErrorHandler::from_config(&config);
        Self { router, config: Arc::new(config), errors }
    }

    pub fn config(&self) -> &AppConfig { &self.config }

    /// Routes one request and produces one response.
    pub async fn handle(&self, req: Unrouted) -> Response {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_owned();

        // Keep the origin around; the request itself moves into the handler.
        let mut origin = HeaderMap::new();
        if let Some(value) = req.headers().get(ORIGIN) {
            origin.insert(ORIGIN, value.clone());
        }

        let result = match self.router.lookup(&method, &path) {
            Lookup::Found(handler, params) => {
                let fut = handler.call(req.route(params, Arc::clone(&self.config)));
                match tokio::spawn(fut).await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(panicked(e.into_panic()).into()),
                    Err(e) => Err(InternalError::from_error(e).into()),
                }
            }
            Lookup::MethodNotAllowed => Err(HttpError::method_not_allowed().into()),
            Lookup::NotFound => Err(HttpError::not_found().into()),
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => self.error_response(&err, &origin),
        };

        debug!(
            method = %method,
            path = %path,
            status = response.status_code().as_u16(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "request",
        );
        response
    }

    /// Answers a failed request through the error handler.
    pub(crate) fn error_response(&self, err: &HandlerError, request: &HeaderMap) -> Response {
        self.errors.handle(err, &self.config.cors, request)
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> InternalError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    };
    InternalError::new("Panic", message)
}
