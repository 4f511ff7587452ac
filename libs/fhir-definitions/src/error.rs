//! Error types for the definition index

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Package cache root {path} is not accessible: {source}")]
    CacheRootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid IG configuration: {0}")]
    IgConfig(String),

    #[error("Invalid StructureDefinition: {0}")]
    InvalidStructureDefinition(String),

    #[error("Registry error: {0}")]
    Registry(#[from] mapbuilder_registry_client::Error),

    #[error("Package error: {0}")]
    Package(#[from] mapbuilder_package::PackageError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
