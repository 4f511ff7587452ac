//! Error types for registry-client

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Registry client errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Package not found: {name}#{version}")]
    PackageNotFound { name: String, version: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Package error: {0}")]
    Package(#[from] mapbuilder_package::PackageError),
}
