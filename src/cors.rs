//! Origin-restricted Cross-Origin Resource Sharing.
//!
//! Credentials are always allowed, so the allowed origin is reflected back
//! verbatim rather than answered with `*`. An origin passes when it equals
//! one of the configured origins, or when it contains `//localhost:` or
//! `//127.0.0.1:` anywhere. The loopback rules are substring searches, not
//! full matches: `https://evil.example//localhost:1` passes as well.

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY, X_CONTENT_TYPE_OPTIONS,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::json::SerializationError;
use crate::response::{ContentType, Response, json_response};

/// Origins accepted when none are configured.
pub const DEFAULT_ORIGINS: [&str; 3] = [
    "https://my-first-app.com",
    "https://my-second-app.com",
    "https://my-third-app.com",
];

/// Methods advertised to preflight requests.
pub const ALLOWED_METHODS: [Method; 7] = [
    Method::DELETE,
    Method::GET,
    Method::HEAD,
    Method::OPTIONS,
    Method::PATCH,
    Method::POST,
    Method::PUT,
];

/// Request headers advertised to preflight requests.
pub const ALLOWED_HEADERS: &str =
    "Accept, Content-Type, Origin, Access-Control-Request-Method, Access-Control-Request-Headers";

const LOOPBACK_PATTERNS: [&str; 2] = [r"//localhost:", r"//127\.0\.0\.1:"];

/// Stand-in for a request that declares no origin.
const UNKNOWN_ORIGIN: &str = "unknown";

/// The process-wide origin whitelist.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    origins: Vec<String>,
    patterns: Vec<Regex>,
}

impl CorsPolicy {
    /// Whitelists `origins` exactly, plus any loopback origin with a port.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = LOOPBACK_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("loopback pattern compiles"))
            .collect();
        Self { origins: origins.into_iter().map(Into::into).collect(), patterns }
    }

    pub fn origins(&self) -> &[String] { &self.origins }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
            || self.patterns.iter().any(|re| re.is_match(origin))
    }

    /// Headers every cross-origin response carries.
    pub fn headers(&self, request: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));

        let origin = declared_origin(request);
        if self.is_origin_allowed(origin) {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
        }

        headers.insert(VARY, HeaderValue::from_static("Origin"));
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers
    }

    /// [`headers`](Self::headers) plus the allowed request headers and methods.
    pub fn preflight_headers(&self, request: &HeaderMap) -> HeaderMap {
        let mut headers = self.headers(request);
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
        let methods = ALLOWED_METHODS.iter().map(Method::as_str).collect::<Vec<_>>().join(",");
        if let Ok(value) = HeaderValue::from_str(&methods) {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        headers
    }

    /// Answers an `OPTIONS` preflight request.
    ///
    /// A rejected origin gets `500` with a JSON explanation. The preflight
    /// headers are attached either way.
    pub fn preflight(&self, request: &HeaderMap) -> Result<Response, SerializationError> {
        let headers = self.preflight_headers(request);
        let origin = declared_origin(request);

        if !self.is_origin_allowed(origin) {
            debug!(origin, "preflight rejected");
            let body = PreflightRejection {
                status: "error",
                message: format!("Origin {origin} not allowed."),
            };
            return json_response(&body, StatusCode::INTERNAL_SERVER_ERROR, headers);
        }

        Ok(Response::builder().headers(headers).bytes(ContentType::Html, Vec::new()))
    }
}

impl Default for CorsPolicy {
    fn default() -> Self { Self::new(DEFAULT_ORIGINS) }
}

#[derive(Serialize)]
struct PreflightRejection {
    status: &'static str,
    message: String,
}

fn declared_origin(request: &HeaderMap) -> &str {
    request
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN_ORIGIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    #[test]
    fn whitelisted_origins_pass() {
        let policy = CorsPolicy::default();
        for origin in DEFAULT_ORIGINS {
            assert!(policy.is_origin_allowed(origin), "{origin}");
        }
    }

    #[test]
    fn loopback_origins_pass_on_any_port() {
        let policy = CorsPolicy::default();
        for origin in [
            "http://localhost:3000",
            "http://localhost:1",
            "https://localhost:8443",
            "http://127.0.0.1:5000",
            "http://127.0.0.1:65535",
        ] {
            assert!(policy.is_origin_allowed(origin), "{origin}");
        }
    }

    #[test]
    fn unrelated_origins_fail() {
        let policy = CorsPolicy::default();
        for origin in [
            "https://evil.example",
            "http://localhost",
            "http://127.0.0.2:80",
            "https://my-first-app.com.evil.example",
            "unknown",
            "",
        ] {
            assert!(!policy.is_origin_allowed(origin), "{origin}");
        }
    }

    #[test]
    fn loopback_rule_is_a_substring_search() {
        let policy = CorsPolicy::default();
        assert!(policy.is_origin_allowed("https://evil.example//localhost:1"));
    }

    #[test]
    fn configured_origins_replace_defaults() {
        let policy = CorsPolicy::new(["https://app.example"]);
        assert!(policy.is_origin_allowed("https://app.example"));
        assert!(!policy.is_origin_allowed("https://my-first-app.com"));
        assert!(policy.is_origin_allowed("http://localhost:8080"));
    }

    #[test]
    fn allowed_origin_is_reflected() {
        let headers = CorsPolicy::default().headers(&with_origin("http://localhost:3000"));
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[VARY], "Origin");
        assert_eq!(headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[test]
    fn rejected_or_missing_origin_is_not_reflected() {
        let policy = CorsPolicy::default();
        for request in [with_origin("https://evil.example"), HeaderMap::new()] {
            let headers = policy.headers(&request);
            assert!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
            assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
            assert_eq!(headers[VARY], "Origin");
        }
    }

    #[test]
    fn preflight_headers_list_methods_and_headers() {
        let headers = CorsPolicy::default().preflight_headers(&with_origin("https://my-second-app.com"));
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "DELETE,GET,HEAD,OPTIONS,PATCH,POST,PUT");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], ALLOWED_HEADERS);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://my-second-app.com");
    }

    #[test]
    fn preflight_from_allowed_origin() {
        let res = CorsPolicy::default()
            .preflight(&with_origin("http://127.0.0.1:8080"))
            .unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_ORIGIN), Some("http://127.0.0.1:8080"));
        assert!(res.header(ACCESS_CONTROL_ALLOW_METHODS).is_some());
    }

    #[test]
    fn preflight_from_rejected_origin() {
        let res = CorsPolicy::default()
            .preflight(&with_origin("https://evil.example"))
            .unwrap();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            res.body(),
            br#"{"status":"error","message":"Origin https://evil.example not allowed."}"#
        );
        assert!(res.header(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_HEADERS), Some(ALLOWED_HEADERS));
    }

    #[test]
    fn preflight_without_origin_names_unknown() {
        let res = CorsPolicy::default().preflight(&HeaderMap::new()).unwrap();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(String::from_utf8_lossy(res.body()).contains("Origin unknown not allowed."));
    }
}
