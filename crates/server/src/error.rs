use std::io;

use thiserror::Error;

use kiosk_config::ConfigError;

/// Lifecycle-level failures surfaced to the embedding host.
///
/// Per-request failures never show up here: they are recovered at the
/// dispatcher boundary and answered as HTTP error responses.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listen address could not be bound (already in use, or
    /// insufficient privilege for the port). Fatal: the server never
    /// reports readiness.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// `shutdown` requires a prior successful `start`.
    #[error("shutdown called before start")]
    NotStarted,

    #[error(transparent)]
    Config(#[from] ConfigError),
}
