//! Explicit defaulting and validation of [`ServeConfig`].

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::schema::{Redirect, ServeConfig, defaults};

/// Configuration that cannot be resolved into a servable site.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port 0 is not a valid listen port")]
    ZeroPort,

    #[error("cannot resolve document root {path}: {source}")]
    DocumentRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fully resolved, immutable site configuration.
///
/// Produced once by [`ServeConfig::resolve`] before the server binds its
/// listener; never mutated afterwards. `document_root` is absolute.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub port: u16,
    pub host: String,
    pub document_root: PathBuf,
    pub list_directories: bool,
    pub headers: HashMap<String, HashMap<String, String>>,
    pub redirects: Vec<Redirect>,
}

impl ServeConfig {
    /// Apply defaults and validate, resolving the document root against
    /// `fallback_root` (the host's destination directory) when none is
    /// configured.
    pub fn resolve(&self, fallback_root: &Path) -> Result<SiteConfig, ConfigError> {
        let port = match self.port {
            Some(0) => return Err(ConfigError::ZeroPort),
            Some(port) => port,
            None => defaults::PORT,
        };
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| defaults::HOST.to_string());

        let root = self.document_root.as_deref().unwrap_or(fallback_root);
        let document_root =
            std::path::absolute(root).map_err(|source| ConfigError::DocumentRoot {
                path: root.to_path_buf(),
                source,
            })?;

        Ok(SiteConfig {
            port,
            host,
            document_root,
            list_directories: self.list_directories,
            headers: self.headers.clone(),
            redirects: self.redirects.clone(),
        })
    }
}
