//! Service-specific error types

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Startup and serving errors.
///
/// Per-request failures are `pkce_auth::Error` and are turned into HTTP
/// responses by the route handlers; they never propagate as these.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load TLS key {key} / certificate {cert}: {source}")]
    Tls {
        key: PathBuf,
        cert: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
