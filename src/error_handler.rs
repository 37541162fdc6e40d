//! Turns handler errors into responses.
//!
//! Every [`HandlerError`] that reaches the top of a request is logged once
//! and answered in the deployment's [`ErrorFormat`]:
//!
//! | Error | `html` | `json` |
//! |---|---|---|
//! | 401, 403, 404, 408, 418 | dedicated page, same status | `{"error": "HTTP error <code>"}` |
//! | other HTTP error | `error_http.html`, same status | `{"error": "HTTP error <code>"}` |
//! | internal error | `error_internal.html`, 500 | `{"error": "An internal error occurred."}`, 500 |
//!
//! JSON answers carry the CORS headers of the request. Backtraces go to the
//! log in debug mode and never into a response body.

use clap::ValueEnum;
use http::{HeaderMap, StatusCode};
use minijinja::context;
use serde::Serialize;
use tracing::error;

use crate::config::AppConfig;
use crate::cors::CorsPolicy;
use crate::error::HandlerError;
use crate::response::{Response, json_response};
use crate::templates;

/// Response format for errors, fixed per deployment.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum ErrorFormat {
    /// Templated HTML pages.
    #[default]
    Html,
    /// Small JSON objects with CORS headers attached.
    Json,
}

/// Central error-to-response translation.
#[derive(Clone, Debug)]
pub struct ErrorHandler {
    format: ErrorFormat,
    debug: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ErrorHandler {
    pub fn new(format: ErrorFormat, debug: bool) -> Self {
        Self { format, debug }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.error_format, config.debug)
    }

    pub fn format(&self) -> ErrorFormat { self.format }

    /// Logs `err` and builds the response for it.
    ///
    /// `request` holds the headers of the failed request; they decide the
    /// CORS headers of JSON answers.
    pub fn handle(&self, err: &HandlerError, cors: &CorsPolicy, request: &HeaderMap) -> Response {
        self.log(err);
        match self.format {
            ErrorFormat::Html => self.html(err),
            ErrorFormat::Json => self.json(err, cors.headers(request)),
        }
    }

    /// The line logged for `err`.
    ///
    /// `"<code> <Type> - <description>"` for HTTP errors,
    /// `"<Type> - <description>"` otherwise; in debug mode the error's
    /// backtrace follows on the next lines.
    pub fn log_message(&self, err: &HandlerError) -> String {
        let mut message = match err {
            HandlerError::Http(e) => {
                format!("{} {} - {}", e.status().as_u16(), e.type_name(), e.description())
            }
            HandlerError::Internal(e) => format!("{} - {}", e.type_name(), e.description()),
        };
        if self.debug {
            message.push('\n');
            message.push_str(&err.backtrace().to_string());
        }
        message
    }

    fn log(&self, err: &HandlerError) {
        let message = self.log_message(err);
        error!(status = err.status().as_u16(), "{message}");
    }

    fn html(&self, err: &HandlerError) -> Response {
        let status = err.status();
        let page = match err {
            HandlerError::Http(e) => {
                let dedicated = format!("{}.html", e.status().as_u16());
                let name = if templates::exists(&dedicated) { dedicated.as_str() } else { "error_http.html" };
                templates::render(
                    name,
                    context! {
                        code => status.as_u16(),
                        error_type => e.type_name(),
                        description => e.description(),
                    },
                )
            }
            HandlerError::Internal(e) => templates::render(
                "error_internal.html",
                context! {
                    code => status.as_u16(),
                    error_type => e.type_name(),
                    description => e.description(),
                },
            ),
        };

        match page {
            Ok(html) => Response::builder().status(status).html(html),
            Err(e) => {
                error!("error page for {status} failed to render: {e}");
                Response::builder()
                    .status(status)
                    .text(status.canonical_reason().unwrap_or("Error"))
            }
        }
    }

    fn json(&self, err: &HandlerError, headers: HeaderMap) -> Response {
        let (status, message) = match err {
            HandlerError::Http(e) => (e.status(), format!("HTTP error {}", e.status().as_u16())),
            HandlerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred.".to_owned())
            }
        };
        match json_response(&ErrorBody { error: message }, status, headers) {
            Ok(res) => res,
            Err(e) => {
                error!("error body for {status} failed to encode: {e}");
                Response::status(status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, ORIGIN};
    use http::HeaderValue;

    use super::*;
    use crate::error::{HttpError, InternalError};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Runs `f` with a subscriber writing into the returned buffer.
    fn capture_logs<F: FnOnce()>(f: F) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.text()
    }

    fn body(res: &Response) -> String {
        String::from_utf8_lossy(res.body()).into_owned()
    }

    fn origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    #[test]
    fn html_uses_dedicated_pages() {
        let handler = ErrorHandler::new(ErrorFormat::Html, false);
        let cors = CorsPolicy::default();

        let res = handler.handle(&HttpError::im_a_teapot().into(), &cors, &HeaderMap::new());
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
        assert_eq!(res.header(CONTENT_TYPE), Some("text/html; charset=utf-8"));
        assert!(body(&res).contains("teapot"));

        let res = handler.handle(&HttpError::unauthorized().into(), &cors, &HeaderMap::new());
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert!(body(&res).contains("401 Unauthorized"));
    }

    #[test]
    fn html_falls_back_to_generic_pages() {
        let handler = ErrorHandler::new(ErrorFormat::Html, false);
        let cors = CorsPolicy::default();

        let res = handler.handle(&HttpError::method_not_allowed().into(), &cors, &HeaderMap::new());
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(body(&res).contains("405 MethodNotAllowed"));

        let err = InternalError::new("ValueError", "testing exception handling");
        let res = handler.handle(&err.into(), &cors, &HeaderMap::new());
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(&res).contains("ValueError"));
        assert!(body(&res).contains("testing exception handling"));
    }

    #[test]
    fn json_bodies_and_cors_headers() {
        let handler = ErrorHandler::new(ErrorFormat::Json, false);
        let cors = CorsPolicy::default();
        let request = origin("http://localhost:3000");

        let res = handler.handle(&HttpError::im_a_teapot().into(), &cors, &request);
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body(&res), r#"{"error":"HTTP error 418"}"#);
        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_ORIGIN), Some("http://localhost:3000"));

        let err = InternalError::new("ValueError", "secret detail");
        let res = handler.handle(&err.into(), &cors, &request);
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&res), r#"{"error":"An internal error occurred."}"#);
        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_ORIGIN), Some("http://localhost:3000"));
    }

    #[test]
    fn log_message_layout() {
        let handler = ErrorHandler::new(ErrorFormat::Html, false);
        assert_eq!(
            handler.log_message(&HttpError::im_a_teapot().into()),
            "418 ImATeapot - This server is a teapot, not a coffee machine"
        );
        assert_eq!(
            handler.log_message(&InternalError::new("ValueError", "bad").into()),
            "ValueError - bad"
        );
    }

    #[test]
    fn debug_mode_appends_backtrace_to_log_only() {
        let handler = ErrorHandler::new(ErrorFormat::Html, true);
        let err: HandlerError = InternalError::new("ValueError", "bad").into();

        let message = handler.log_message(&err);
        assert!(message.starts_with("ValueError - bad\n"));
        assert!(message.len() > "ValueError - bad\n".len());

        let res = handler.handle(&err, &CorsPolicy::default(), &HeaderMap::new());
        assert!(!body(&res).contains(&err.backtrace().to_string()));
    }

    #[test]
    fn debug_mode_traces_http_errors_too() {
        let handler = ErrorHandler::new(ErrorFormat::Html, true);
        let err: HandlerError = HttpError::im_a_teapot().into();

        let head = "418 ImATeapot - This server is a teapot, not a coffee machine\n";
        let message = handler.log_message(&err);
        assert!(message.starts_with(head), "{message}");
        assert!(message.ends_with(&err.backtrace().to_string()), "{message}");
        assert!(message.len() > head.len());

        let quiet = ErrorHandler::new(ErrorFormat::Html, false);
        assert_eq!(quiet.log_message(&err), head.trim_end());
    }

    #[test]
    fn each_error_is_logged_once() {
        let handler = ErrorHandler::new(ErrorFormat::Json, false);
        let cors = CorsPolicy::default();

        let logs = capture_logs(|| {
            handler.handle(&HttpError::im_a_teapot().into(), &cors, &HeaderMap::new());
            handler.handle(&HttpError::unauthorized().into(), &cors, &HeaderMap::new());
            handler.handle(&InternalError::new("ValueError", "x").into(), &cors, &HeaderMap::new());
        });

        assert_eq!(logs.matches("418 ImATeapot").count(), 1, "{logs}");
        assert_eq!(logs.matches("401 Unauthorized").count(), 1, "{logs}");
        assert_eq!(logs.matches("ValueError - x").count(), 1, "{logs}");
        assert_eq!(logs.lines().filter(|l| l.contains("ERROR")).count(), 3, "{logs}");
    }
}
