//! Canonical-URL index of the StructureDefinitions an IG can reference.
//!
//! A refresh resolves the IG's dependencies, installs what is missing, parses every
//! `StructureDefinition*.json` of every package and publishes the result as one immutable
//! [`DefinitionSet`]. Readers hold an `Arc` to whichever set was current when they asked, so
//! they never observe a half-built index.

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::ig_config::{find_ig_config, IgConfig, PackageDependency};
use crate::loader::PackageInstaller;
use crate::snapshot::{build_tree, ElementNode, FlatElement};
use futures::future::join_all;
use mapbuilder_package::{package_key, parse_json, FileSystemCache};
use mapbuilder_registry_client::{registries, RegistryClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// One StructureDefinition, reduced to its element tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinitionEntity {
    pub canonical_url: String,
    pub source_package_id: String,
    pub source_version: String,
    pub fhir_type: String,
    /// Root-level elements (children of the root type).
    pub elements: Vec<ElementNode>,
}

/// An immutable, fully built index generation.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    pub canonical: String,
    pub ig_id: String,
    pub fhir_version: String,
    entities: HashMap<String, DefinitionEntity>,
}

impl DefinitionSet {
    pub fn new(ig: &IgConfig, entities: HashMap<String, DefinitionEntity>) -> Self {
        Self {
            canonical: ig.canonical.clone(),
            ig_id: ig.id.clone(),
            fhir_version: ig.fhir_version.clone(),
            entities,
        }
    }

    pub fn get(&self, canonical_url: &str) -> Option<&DefinitionEntity> {
        self.entities.get(canonical_url)
    }

    pub fn contains(&self, canonical_url: &str) -> bool {
        self.entities.contains_key(canonical_url)
    }

    pub fn entities(&self) -> impl Iterator<Item = &DefinitionEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether `url` lives under the IG's own canonical base. An IG without a canonical owns
    /// nothing.
    pub fn in_ig_namespace(&self, url: &str) -> bool {
        !self.canonical.is_empty() && url.contains(self.canonical.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct StructureDefinitionSummary {
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "type", default)]
    fhir_type: Option<String>,
    #[serde(default)]
    snapshot: Option<SnapshotSummary>,
}

#[derive(Debug, Deserialize)]
struct SnapshotSummary {
    #[serde(default)]
    element: Option<Vec<FlatElement>>,
}

/// Parse one StructureDefinition file body into an entity.
pub fn parse_definition(bytes: &[u8], package_id: &str, version: &str) -> Result<DefinitionEntity> {
    let summary: StructureDefinitionSummary = parse_json(bytes)?;
    let canonical_url = summary
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| Error::InvalidStructureDefinition("missing url".into()))?;
    let elements = summary
        .snapshot
        .and_then(|snapshot| snapshot.element)
        .ok_or_else(|| {
            Error::InvalidStructureDefinition(format!("{} has no snapshot", canonical_url))
        })?;

    Ok(DefinitionEntity {
        canonical_url,
        source_package_id: package_id.to_string(),
        source_version: version.to_string(),
        fhir_type: summary.fhir_type.unwrap_or_default(),
        elements: build_tree(&elements),
    })
}

/// Read every StructureDefinition of an installed package; unreadable or malformed files are
/// skipped.
pub fn load_package_definitions(
    cache: &FileSystemCache,
    package_id: &str,
    version: &str,
) -> Result<Vec<DefinitionEntity>> {
    let files = cache.structure_definition_files(package_id, version)?;
    let mut entities = Vec::with_capacity(files.len());

    for file in files {
        let parsed = std::fs::read(&file)
            .map_err(Error::from)
            .and_then(|bytes| parse_definition(&bytes, package_id, version));
        match parsed {
            Ok(entity) => entities.push(entity),
            Err(e) => {
                tracing::debug!(file = %file.display(), error = %e, "Skipping definition file");
            }
        }
    }

    Ok(entities)
}

/// Owner of the published [`DefinitionSet`].
pub struct DefinitionIndex {
    installer: Arc<dyn PackageInstaller>,
    current: RwLock<Arc<DefinitionSet>>,
}

impl DefinitionIndex {
    pub fn new(installer: Arc<dyn PackageInstaller>) -> Self {
        Self {
            installer,
            current: RwLock::new(Arc::new(DefinitionSet::default())),
        }
    }

    /// Wire a registry-backed index from explicit configuration.
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let urls = registries(&config.default_registries, &config.settings_path);
        tracing::debug!(registries = ?urls, "Package registries");
        let client = RegistryClient::with_timeout(
            FileSystemCache::new(&config.cache_root),
            config.fhir_home.clone(),
            urls,
            config.fetch_timeout,
        )?;
        Ok(Self::new(Arc::new(client)))
    }

    /// The most recently published generation.
    pub fn current(&self) -> Arc<DefinitionSet> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Rebuild from the IG configuration found in `project_root`, if any.
    pub async fn refresh_project(&self, project_root: &Path) -> Result<Arc<DefinitionSet>> {
        let content = match find_ig_config(project_root) {
            Some(path) => match tokio::fs::read_to_string(&path).await {
                Ok(content) => Some(content),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not read IG configuration");
                    None
                }
            },
            None => {
                tracing::info!(root = %project_root.display(), "No IG configuration found, indexing FHIR core only");
                None
            }
        };
        self.refresh(content.as_deref()).await
    }

    /// Rebuild the index for `ig_config` (YAML content) and publish it.
    ///
    /// Configuration problems and per-package failures degrade the result; only an
    /// inaccessible cache root fails the pass, in which case the previous generation stays
    /// published.
    pub async fn refresh(&self, ig_config: Option<&str>) -> Result<Arc<DefinitionSet>> {
        let cache_root = self.installer.cache().cache_root().to_path_buf();
        ensure_cache_root(&cache_root).await?;

        let ig = match ig_config.map(IgConfig::parse) {
            Some(Ok(ig)) => ig,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "There was a problem parsing the IG configuration, using defaults");
                IgConfig::default()
            }
            None => IgConfig::default(),
        };

        let dependencies = ig.dependency_list();
        tracing::info!(
            dependencies = dependencies.len(),
            fhir_version = %ig.fhir_version,
            "Refreshing FHIR definitions"
        );

        let loaded = join_all(dependencies.iter().map(|dep| self.load_dependency(dep))).await;

        let mut entities = HashMap::new();
        for entity in loaded.into_iter().flatten() {
            entities.entry(entity.canonical_url.clone()).or_insert(entity);
        }

        let set = Arc::new(DefinitionSet::new(&ig, entities));
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = set.clone();

        tracing::info!(definitions = set.len(), "FHIR definitions published");
        Ok(set)
    }

    async fn load_dependency(&self, dependency: &PackageDependency) -> Vec<DefinitionEntity> {
        let package_id = dependency.package_id.as_str();

        let version = match self
            .installer
            .resolve_version(package_id, &dependency.version_spec)
            .await
        {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!(
                    package = %package_id,
                    range = %dependency.version_spec,
                    error = %e,
                    "Could not resolve package version"
                );
                return Vec::new();
            }
        };
        let key = package_key(package_id, &version);

        match self.installer.ensure_package(package_id, &version).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(package = %key, "Could not load definition information for package");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(package = %key, error = %e, "Could not load definition information for package");
                return Vec::new();
            }
        }

        let cache = self.installer.cache().clone();
        let package = package_id.to_string();
        let loaded = tokio::task::spawn_blocking(move || {
            load_package_definitions(&cache, &package, &version)
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))
        .and_then(|result| result);

        match loaded {
            Ok(entities) => {
                tracing::debug!(package = %key, definitions = entities.len(), "Loaded package definitions");
                entities
            }
            Err(e) => {
                tracing::warn!(package = %key, error = %e, "Could not load definition information for package");
                Vec::new()
            }
        }
    }
}

async fn ensure_cache_root(cache_root: &Path) -> Result<()> {
    let unavailable = |source| Error::CacheRootUnavailable {
        path: cache_root.to_path_buf(),
        source,
    };
    tokio::fs::create_dir_all(cache_root).await.map_err(unavailable)?;
    let _entries = tokio::fs::read_dir(cache_root).await.map_err(unavailable)?;
    Ok(())
}
