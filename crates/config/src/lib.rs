//! Configuration for the kiosk static-file server.
//!
//! [`ServeConfig`] is the host-facing form: every field is optional (or has
//! an obvious empty value) so an embedding orchestrator can fill in only
//! what it cares about. [`ServeConfig::resolve`] applies the documented
//! defaults exactly once and produces the immutable [`SiteConfig`] the
//! server runs on. Defaulting is explicit per field — an intentionally
//! empty headers map or redirect table stays empty.

pub mod resolve;
pub mod schema;

pub use resolve::{ConfigError, SiteConfig};
pub use schema::{Redirect, ServeConfig, defaults};
