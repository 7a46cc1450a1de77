//! Host-facing configuration schema.

use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Read-only view of the default configuration values, applied by
/// [`ServeConfig::resolve`] when the corresponding field is unset.
pub mod defaults {
    /// TCP port the server binds when none is configured.
    pub const PORT: u16 = 8080;
    /// Bind host when none is configured.
    pub const HOST: &str = "localhost";
    /// Directory listings are off unless explicitly requested.
    pub const LIST_DIRECTORIES: bool = false;
}

/// Server configuration as provided by the embedding host.
///
/// Unset fields take the values in [`defaults`]; an unset `document_root`
/// falls back to the destination directory the host passes at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Listen port, 1–65535.
    pub port: Option<u16>,

    /// Hostname or IP literal to bind.
    pub host: Option<String>,

    /// Directory to serve. Resolved to an absolute path before the server
    /// becomes reachable.
    pub document_root: Option<PathBuf>,

    /// Carried for hosts that configure it, but the file engine renders
    /// no listings: directory URLs resolve through their `index.html` or
    /// fall through to a 404 regardless of this flag.
    pub list_directories: bool,

    /// Extra response headers: path pattern → header name → value.
    /// A pattern is matched exactly, or as a prefix when it ends in `*`.
    pub headers: HashMap<String, HashMap<String, String>>,

    /// Redirect table, evaluated in order; the first matching entry wins.
    pub redirects: Vec<Redirect>,
}

/// One redirect rule. `source` is matched as an exact string against the
/// request path (including the query string when one is present) and a hit
/// answers `301 Moved Permanently` with `destination` as the location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub source: String,
    pub destination: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ServeConfig {
        serde_json::from_str(raw).unwrap_or_else(|e| panic!("bad config json: {e}"))
    }

    #[test]
    fn deserializes_partial_config() {
        let cfg = parse(
            r#"{
                "port": 9000,
                "redirects": [{ "source": "/a", "destination": "/b" }]
            }"#,
        );

        assert_eq!(cfg.port, Some(9000));
        assert_eq!(cfg.host, None);
        assert_eq!(
            cfg.redirects,
            vec![Redirect {
                source: "/a".into(),
                destination: "/b".into(),
            }]
        );
        assert!(cfg.headers.is_empty());
    }

    #[test]
    fn empty_object_is_all_defaults() {
        let cfg = parse("{}");
        assert_eq!(cfg.port, None);
        assert_eq!(cfg.document_root, None);
        assert!(!cfg.list_directories);
        assert!(cfg.redirects.is_empty());
    }
}
