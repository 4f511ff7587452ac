//! Registry client for installing FHIR packages into the local cache.
//!
//! Registries are tried in order: the first one that answers `200` with an archive that
//! unpacks cleanly wins, later ones are never contacted. Cache I/O and extraction are
//! offloaded to `tokio::task::spawn_blocking`.

use crate::error::{Error, Result};
use crate::version_resolver::resolve_patch_version;
use mapbuilder_package::{install_archive, FileSystemCache};
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry client for loading FHIR packages.
pub struct RegistryClient {
    client: Client,
    cache: FileSystemCache,
    registries: Vec<String>,
    download_dir: PathBuf,
}

impl RegistryClient {
    /// Create a client for `registries` with the default request timeout.
    ///
    /// Archives are downloaded into `download_dir` and removed after extraction.
    pub fn new(cache: FileSystemCache, download_dir: PathBuf, registries: Vec<String>) -> Result<Self> {
        Self::with_timeout(cache, download_dir, registries, DEFAULT_TIMEOUT)
    }

    /// Create a client whose per-request timeout is `timeout`. A registry that does not
    /// answer in time counts as failed and the next one is tried.
    pub fn with_timeout(
        cache: FileSystemCache,
        download_dir: PathBuf,
        registries: Vec<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            cache,
            registries,
            download_dir,
        })
    }

    pub fn cache(&self) -> &FileSystemCache {
        &self.cache
    }

    pub fn registries(&self) -> &[String] {
        &self.registries
    }

    /// Resolve a `M.m.x` range against the cache; see [`resolve_patch_version`].
    pub async fn resolve_version(&self, name: &str, spec: &str) -> Result<String> {
        let cache = self.cache.clone();
        let name = name.to_string();
        let spec = spec.to_string();
        tokio::task::spawn_blocking(move || resolve_patch_version(&cache, &name, &spec))
            .await
            .map_err(|e| Error::Registry(format!("Cache task failed: {e}")))?
    }

    /// Make sure `name#version` is unpacked in the cache.
    ///
    /// Returns `Ok(true)` when the package directory already exists (no network access) or
    /// was installed from one of the registries, `Ok(false)` when every registry failed.
    pub async fn ensure_package(&self, name: &str, version: &str) -> Result<bool> {
        if self.cache.has_package(name, version) {
            tracing::debug!("Cache hit: {}#{}", name, version);
            return Ok(true);
        }
        tracing::debug!("Cache miss: {}#{}", name, version);

        for registry in &self.registries {
            match self.download_from(registry, name, version).await {
                Ok(()) => {
                    tracing::info!(registry = %registry, "Installed {}#{}", name, version);
                    return Ok(true);
                }
                Err(e) => {
                    tracing::warn!(
                        registry = %registry,
                        error = %e,
                        "Failed to fetch {}#{}",
                        name,
                        version
                    );
                }
            }
        }

        Ok(false)
    }

    async fn download_from(&self, registry: &str, name: &str, version: &str) -> Result<()> {
        let url = format!("{}/{}/{}", registry.trim_end_matches('/'), name, version);
        let response = self.client.get(&url).send().await?;

        if response.status() != StatusCode::OK {
            return Err(Error::PackageNotFound {
                name: name.to_string(),
                version: format!("{} (status {})", version, response.status()),
            });
        }

        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let archive_path = self.download_dir.join(format!(
            "{}-{}.{}.tgz",
            name,
            version,
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&archive_path, &bytes).await?;

        let dest = self.cache.package_directory(name, version);
        let archive_for_task = archive_path.clone();
        let installed = tokio::task::spawn_blocking(move || install_archive(&archive_for_task, &dest))
            .await
            .map_err(|e| Error::Registry(format!("Extraction task failed: {e}")));

        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            tracing::debug!(path = %archive_path.display(), error = %e, "Could not remove downloaded archive");
        }

        installed??;
        Ok(())
    }
}
