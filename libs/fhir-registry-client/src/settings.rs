//! Registry list assembly from the local FHIR settings file.
//!
//! The settings file (`~/.fhir/fhir-settings.json` by default) is shared with other FHIR
//! tooling. Only its `servers[].url` entries matter here; they are appended after the
//! public registries.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Public package registries, tried in this order before any configured server.
pub const DEFAULT_REGISTRIES: [&str; 2] = ["http://packages.fhir.org", "http://packages2.fhir.org"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FhirSettings {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    pub url: String,
    #[serde(default)]
    pub authentication_type: Option<String>,
    #[serde(default)]
    pub server_type: Option<String>,
}

impl FhirSettings {
    /// Parse settings content. JSON is accepted since it is read as YAML.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::Settings(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Build the ordered registry list: `defaults`, then servers from `settings_path`.
///
/// A missing or unparsable settings file degrades silently to `defaults`. Duplicates are
/// dropped, keeping the first occurrence.
pub fn registries(defaults: &[String], settings_path: &Path) -> Vec<String> {
    let mut registries: Vec<String> = Vec::with_capacity(defaults.len());
    let mut push = |url: &str| {
        let url = url.trim().trim_end_matches('/');
        if !url.is_empty() && !registries.iter().any(|existing| existing == url) {
            registries.push(url.to_string());
        }
    };

    for url in defaults {
        push(url);
    }

    if settings_path.exists() {
        match FhirSettings::load(settings_path) {
            Ok(settings) => {
                for server in &settings.servers {
                    push(&server.url);
                }
            }
            Err(e) => {
                tracing::debug!(
                    path = %settings_path.display(),
                    error = %e,
                    "Ignoring unreadable FHIR settings file"
                );
            }
        }
    }

    registries
}
