//! Request dispatcher: redirect table, file engine delegation, header
//! injection.
//!
//! File resolution (path mapping, MIME typing, index files, 404s) is the
//! job of tower-http's `ServeDir`; this module only builds the engine
//! options from the resolved [`SiteConfig`], consults the redirect table
//! first, and decorates matching responses with the configured headers.

use std::{convert::Infallible, io};

use bytes::Bytes;
use http::{
    HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode,
    header::{self, CONTENT_TYPE},
};
use http_body_util::{BodyExt, Empty, Full, combinators::UnsyncBoxBody};
use hyper::body::Incoming;
use tower_http::services::ServeDir;
use tracing::{debug, warn};

use kiosk_config::SiteConfig;

// The engine's response body is not `Sync`, so the unsync boxed form is
// the common denominator for engine, redirect, and error bodies.
pub(crate) type HttpBody = UnsyncBoxBody<Bytes, io::Error>;

/// Immutable per-site request-handling state, built once at startup and
/// shared by every connection. Holds no mutable state, so concurrent
/// requests need no coordination.
pub(crate) struct Site {
    config: SiteConfig,
    files: ServeDir,
}

impl Site {
    pub(crate) fn new(config: SiteConfig) -> Self {
        let files = ServeDir::new(&config.document_root).append_index_html_on_directories(true);
        if config.list_directories {
            // ServeDir renders no listings; directories resolve through
            // their index file or fall through to the engine's 404.
            debug!("directory listing requested; file engine serves index files only");
        }
        Self { config, files }
    }

    /// Answer one request. Infallible by contract: engine-level failures
    /// are translated into a best-effort error response and must never
    /// tear down the connection, let alone the listener.
    pub(crate) async fn handle(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<HttpBody>, Infallible> {
        let target = match req.uri().query() {
            Some(query) => format!("{}?{query}", req.uri().path()),
            None => req.uri().path().to_string(),
        };
        if let Some(destination) = self.redirect_for(&target) {
            debug!(%target, %destination, "redirect table hit");
            return Ok(redirect(destination));
        }

        let path = req.uri().path().to_string();
        let mut files = self.files.clone();
        let mut response = match files.try_call(req).await {
            Ok(response) => response.map(|body| body.boxed_unsync()),
            Err(err) => {
                warn!(%path, error = %err, "static file engine failed");
                plain(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };
        self.inject_headers(&path, response.headers_mut());
        Ok(response)
    }

    /// First redirect entry whose source matches the request target
    /// exactly (path plus query string when one is present).
    fn redirect_for(&self, target: &str) -> Option<&str> {
        self.config
            .redirects
            .iter()
            .find(|r| r.source == target)
            .map(|r| r.destination.as_str())
    }

    fn inject_headers(&self, path: &str, headers: &mut HeaderMap) {
        for (pattern, extra) in &self.config.headers {
            if !pattern_matches(pattern, path) {
                continue;
            }
            for (name, value) in extra {
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => warn!(%pattern, %name, "skipping invalid configured header"),
                }
            }
        }
    }
}

/// Exact match, or prefix match when the pattern ends in `*`.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => pattern == path,
    }
}

fn redirect(destination: &str) -> Response<HttpBody> {
    let built = Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, destination)
        .body(empty());
    match built {
        Ok(response) => response,
        Err(err) => {
            warn!(%destination, error = %err, "redirect destination is not a valid header value");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<HttpBody> {
    let mut response = Response::new(
        Full::new(Bytes::from_static(message.as_bytes()))
            .map_err(|never| match never {})
            .boxed_unsync(),
    );
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn empty() -> HttpBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}
