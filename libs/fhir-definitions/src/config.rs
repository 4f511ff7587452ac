//! Explicit configuration for the definition index.

use mapbuilder_registry_client::DEFAULT_REGISTRIES;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where packages live and how they are fetched. Built once per process and handed to
/// [`crate::DefinitionIndex::from_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// FHIR tooling home (`~/.fhir`); downloaded archives are staged here.
    pub fhir_home: PathBuf,
    /// Package cache root (`<fhir_home>/packages`).
    pub cache_root: PathBuf,
    /// Optional settings file listing extra registries (`<fhir_home>/fhir-settings.json`).
    pub settings_path: PathBuf,
    pub default_registries: Vec<String>,
    pub fetch_timeout: Duration,
}

impl IndexConfig {
    /// Standard layout below `fhir_home`.
    pub fn from_fhir_home(fhir_home: impl Into<PathBuf>) -> Self {
        let fhir_home = fhir_home.into();
        Self {
            cache_root: fhir_home.join("packages"),
            settings_path: fhir_home.join("fhir-settings.json"),
            fhir_home,
            default_registries: DEFAULT_REGISTRIES.iter().map(|s| s.to_string()).collect(),
            fetch_timeout: Duration::from_secs(30),
        }
    }

    /// `~/.fhir`, falling back to `./.fhir` when no home directory is known.
    pub fn default_fhir_home() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fhir")
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::from_fhir_home(Self::default_fhir_home())
    }
}
