//! Error types.
//!
//! Two families live here. [`Error`] surfaces infrastructure failures:
//! binding to a port or accepting a connection. [`HandlerError`] is what a
//! route handler returns when it cannot produce a response; the
//! [`ErrorHandler`](crate::ErrorHandler) turns it into one.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;

use crate::json::SerializationError;

// ── Error ─────────────────────────────────────────────────────────────────────

/// The error type returned by kettle's server operations.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// An error that maps onto a specific HTTP status code.
///
/// Like [`InternalError`] it captures a backtrace where it is created,
/// logged in debug mode only.
#[derive(Clone, Debug)]
pub struct HttpError {
    status: StatusCode,
    description: Cow<'static, str>,
    backtrace: Arc<Backtrace>,
}

impl HttpError {
    /// Creates an error for `status` with the stock description for that code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            description: Cow::Borrowed(default_description(status)),
            backtrace: Arc::new(Backtrace::force_capture()),
        }
    }

    /// Replaces the description shown in logs and error pages.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = description.into();
        self
    }

    pub fn bad_request() -> Self { Self::new(StatusCode::BAD_REQUEST) }
    pub fn unauthorized() -> Self { Self::new(StatusCode::UNAUTHORIZED) }
    pub fn forbidden() -> Self { Self::new(StatusCode::FORBIDDEN) }
    pub fn not_found() -> Self { Self::new(StatusCode::NOT_FOUND) }
    pub fn method_not_allowed() -> Self { Self::new(StatusCode::METHOD_NOT_ALLOWED) }
    pub fn request_timeout() -> Self { Self::new(StatusCode::REQUEST_TIMEOUT) }
    pub fn payload_too_large() -> Self { Self::new(StatusCode::PAYLOAD_TOO_LARGE) }
    pub fn im_a_teapot() -> Self { Self::new(StatusCode::IM_A_TEAPOT) }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn description(&self) -> &str { &self.description }
    pub fn backtrace(&self) -> &Backtrace { &self.backtrace }

    /// The error's class name, e.g. `Unauthorized` or `ImATeapot`.
    ///
    /// Derived from the canonical reason phrase with spaces and punctuation
    /// removed, so `418 I'm a teapot` becomes `ImATeapot`.
    pub fn type_name(&self) -> String {
        let reason = self.status.canonical_reason().unwrap_or("HTTP Exception");
        reason
            .replace('\'', "")
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status.as_u16(), self.type_name(), self.description)
    }
}

impl std::error::Error for HttpError {}

fn default_description(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "The browser (or proxy) sent a request that this server could not understand.",
        401 => "The server could not verify that you are authorized to access the URL \
                requested. You either supplied the wrong credentials (e.g. a bad password), \
                or your browser doesn't understand how to supply the credentials required.",
        403 => "You don't have the permission to access the requested resource. It is \
                either read-protected or not readable by the server.",
        404 => "The requested URL was not found on the server. If you entered the URL \
                manually please check your spelling and try again.",
        405 => "The method is not allowed for the requested URL.",
        408 => "The server closed the network connection because the browser didn't \
                finish the request within the specified time.",
        413 => "The data value transmitted exceeds the capacity limit.",
        418 => "This server is a teapot, not a coffee machine",
        500 => "The server encountered an internal error and was unable to complete your \
                request. Either the server is overloaded or there is an error in the \
                application.",
        _   => "",
    }
}

// ── InternalError ─────────────────────────────────────────────────────────────

/// A failure with no dedicated status code. Always answered with `500`.
///
/// A backtrace is captured at construction; it is logged in debug mode and
/// never sent to the client.
#[derive(Debug)]
pub struct InternalError {
    type_name: Cow<'static, str>,
    description: String,
    backtrace: Backtrace,
}

impl InternalError {
    pub fn new(type_name: impl Into<Cow<'static, str>>, description: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            description: description.into(),
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Wraps any error value, using the last path segment of its Rust type
    /// as the type name and its `Display` output as the description.
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }

    pub fn type_name(&self) -> &str { &self.type_name }
    pub fn description(&self) -> &str { &self.description }
    pub fn backtrace(&self) -> &Backtrace { &self.backtrace }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.description)
    }
}

impl std::error::Error for InternalError {}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ── HandlerError ──────────────────────────────────────────────────────────────

/// The error half of a handler's return type.
///
/// ```rust,no_run
/// use kettle::{HandlerError, HttpError, Request, Response};
///
/// async fn secret(_req: Request) -> Result<Response, HandlerError> {
///     Err(HttpError::unauthorized().into())
/// }
/// ```
#[derive(Debug)]
pub enum HandlerError {
    Http(HttpError),
    Internal(InternalError),
}

impl HandlerError {
    /// Status code the error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http(e) => e.status(),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Http(e) => e.type_name(),
            Self::Internal(e) => e.type_name().to_owned(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Http(e) => e.description(),
            Self::Internal(e) => e.description(),
        }
    }

    /// Where the error was created.
    pub fn backtrace(&self) -> &Backtrace {
        match self {
            Self::Http(e) => e.backtrace(),
            Self::Internal(e) => e.backtrace(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => fmt::Display::fmt(e, f),
            Self::Internal(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Internal(e) => Some(e),
        }
    }
}

impl From<HttpError> for HandlerError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

impl From<InternalError> for HandlerError {
    fn from(e: InternalError) -> Self {
        Self::Internal(e)
    }
}

impl From<SerializationError> for HandlerError {
    fn from(e: SerializationError) -> Self {
        Self::Internal(InternalError::from_error(e))
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(InternalError::from_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_follow_reason_phrases() {
        assert_eq!(HttpError::im_a_teapot().type_name(), "ImATeapot");
        assert_eq!(HttpError::unauthorized().type_name(), "Unauthorized");
        assert_eq!(HttpError::not_found().type_name(), "NotFound");
        assert_eq!(HttpError::request_timeout().type_name(), "RequestTimeout");
        assert_eq!(HttpError::method_not_allowed().type_name(), "MethodNotAllowed");
        assert_eq!(HttpError::payload_too_large().type_name(), "PayloadTooLarge");
    }

    #[test]
    fn stock_descriptions() {
        assert_eq!(
            HttpError::im_a_teapot().description(),
            "This server is a teapot, not a coffee machine"
        );
        let custom = HttpError::forbidden().with_description("nope");
        assert_eq!(custom.description(), "nope");
        assert_eq!(custom.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn internal_error_takes_short_type_name() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = InternalError::from_error(io);
        assert_eq!(err.type_name(), "Error");
        assert_eq!(err.description(), "disk on fire");

        let err = HandlerError::from(InternalError::new("ValueError", "bad value"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.type_name(), "ValueError");
    }
}
