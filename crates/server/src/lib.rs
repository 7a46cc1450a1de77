//! Embeddable static-file server with a controlled lifecycle.
//!
//! Lifecycle:
//! 1. The host builds a [`ServeConfig`] and constructs a [`StaticServer`]
//!    (typically shared as an `Arc` singleton).
//! 2. [`StaticServer::start`] resolves the document root, binds the
//!    listener, and reports readiness. Starting an already-started server
//!    is a silent no-op that still reports readiness.
//! 3. Every accepted connection is tracked in the [`ConnectionRegistry`];
//!    requests are answered by delegating file resolution to tower-http's
//!    `ServeDir`, with the configured redirect table and header rules
//!    applied around it.
//! 4. [`StaticServer::shutdown`] forcibly severs every live connection
//!    (in-flight responses are abandoned), releases the listen port, and
//!    leaves the registry empty.
//!
//! This is a library component only: no CLI, no environment variables, no
//! persisted state. Hosts bring their own `tracing` subscriber.

mod dispatch;
mod error;
pub mod registry;
pub mod server;

pub use error::ServeError;
pub use kiosk_config::{Redirect, ServeConfig, SiteConfig, defaults};
pub use registry::ConnectionRegistry;
pub use server::{IDLE_TIMEOUT, ServerState, StaticServer};
