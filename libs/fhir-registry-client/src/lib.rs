//! FHIR Package Registry Client
//!
//! Resolves dependency versions against the local package cache and installs missing
//! packages from an ordered list of registries.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mapbuilder_registry_client::{registries, RegistryClient, DEFAULT_REGISTRIES};
//! use mapbuilder_package::FileSystemCache;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let defaults: Vec<String> = DEFAULT_REGISTRIES.iter().map(|s| s.to_string()).collect();
//! let urls = registries(&defaults, Path::new("/home/me/.fhir/fhir-settings.json"));
//! let client = RegistryClient::new(
//!     FileSystemCache::new("/home/me/.fhir/packages"),
//!     "/home/me/.fhir".into(),
//!     urls,
//! )?;
//! let version = client.resolve_version("hl7.fhir.us.core", "6.1.x").await?;
//! let installed = client.ensure_package("hl7.fhir.us.core", &version).await?;
//! # Ok(())
//! # }
//! ```
pub mod async_client;
pub mod error;
pub mod settings;
pub mod version_resolver;

pub use async_client::RegistryClient;
pub use error::{Error, Result};
pub use settings::{registries, FhirSettings, DEFAULT_REGISTRIES};
pub use version_resolver::{is_patch_range, resolve_patch_version, select_patch_version};

pub use mapbuilder_package::FileSystemCache;
