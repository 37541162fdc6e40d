//! The application's endpoints.
//!
//! | Method | Path | Answer |
//! |---|---|---|
//! | `GET` | `/` | HTML info page |
//! | `GET`, `OPTIONS` | `/app-info` | app name, version and flags as JSON |
//! | `GET`, `OPTIONS` | `/exception` | always an internal error |
//! | `GET`, `OPTIONS` | `/teapot` | always `418` |
//! | `GET`, `OPTIONS` | `/secret` | always `401` |
//! | `GET` | `/{*path}` | file from the static directory |
//!
//! The three failing endpoints exist to exercise the error pages.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use http::{Method, StatusCode};
use minijinja::context;
use serde::Serialize;

use crate::error::{HandlerError, HttpError, InternalError};
use crate::request::Request;
use crate::response::{ContentType, Response, json_response};
use crate::router::Router;
use crate::templates;

const GET_OPTIONS: [Method; 2] = [Method::GET, Method::OPTIONS];

/// Builds the router with every endpoint registered.
pub fn router() -> Router {
    Router::new()
        .on(Method::GET, "/", index)
        .on_many(&GET_OPTIONS, "/app-info", app_info)
        .on_many(&GET_OPTIONS, "/exception", exception)
        .on_many(&GET_OPTIONS, "/teapot", teapot)
        .on_many(&GET_OPTIONS, "/secret", secret)
        .on(Method::GET, "/{*path}", static_file)
}

// GET /
pub async fn index(req: Request) -> Result<Response, HandlerError> {
    let config = req.config();
    let html = templates::render(
        "index.html",
        context! {
            app_name => &config.app_name,
            version => &config.app_version,
            environment => config.environment(),
            private_port => config.private_port,
            public_port => config.public_port,
            debug => config.debug,
        },
    )
    .map_err(InternalError::from_error)?;
    Ok(Response::html(html))
}

#[derive(Serialize)]
struct AppInfo<'a> {
    #[serde(rename = "app-name")]
    app_name: &'a str,
    version: &'a str,
    production: bool,
    debug: bool,
}

// GET|OPTIONS /app-info
pub async fn app_info(req: Request) -> Result<Response, HandlerError> {
    let config = req.config();
    if *req.method() == Method::OPTIONS {
        return Ok(config.cors.preflight(req.headers())?);
    }

    let info = AppInfo {
        app_name: &config.app_name,
        version: &config.app_version,
        production: config.production,
        debug: config.debug,
    };
    Ok(json_response(&info, StatusCode::OK, config.cors.headers(req.headers()))?)
}

/// The failure raised by `/exception`.
#[derive(Debug)]
struct TestFailure;

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("testing exception handling")
    }
}

impl std::error::Error for TestFailure {}

// GET|OPTIONS /exception
pub async fn exception(_req: Request) -> Result<Response, HandlerError> {
    Err(InternalError::from_error(TestFailure).into())
}

// GET|OPTIONS /teapot
pub async fn teapot(_req: Request) -> Result<Response, HandlerError> {
    Err(HttpError::im_a_teapot().into())
}

// GET|OPTIONS /secret
pub async fn secret(_req: Request) -> Result<Response, HandlerError> {
    Err(HttpError::unauthorized().into())
}

// GET /{*path}
pub async fn static_file(req: Request) -> Result<Response, HandlerError> {
    let requested = req.param("path").unwrap_or_default();
    let path = map_path(&req.config().static_dir, requested).ok_or_else(HttpError::not_found)?;

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(HttpError::not_found().into()),
    }

    let bytes = tokio::fs::read(&path).await?;
    let content_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(ContentType::OctetStream, ContentType::from_extension);
    Ok(Response::builder().bytes(content_type, bytes))
}

/// Maps a URL path below `base`, refusing anything but plain segments.
fn map_path(base: &Path, url_path: &str) -> Option<PathBuf> {
    let mut path = base.to_path_buf();
    for comp in Path::new(url_path.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(segment) => path.push(segment),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}
