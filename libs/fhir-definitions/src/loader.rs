use crate::error::Result;
use async_trait::async_trait;
use mapbuilder_package::FileSystemCache;
use mapbuilder_registry_client::RegistryClient;

/// Source of installed packages for the definition index.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Cache the installed packages are read from.
    fn cache(&self) -> &FileSystemCache;

    /// Turn a version reference into a concrete version (patch ranges resolved, others verbatim).
    async fn resolve_version(&self, package_name: &str, version_spec: &str) -> Result<String>;

    /// `Ok(false)` means the package could not be installed from any source.
    async fn ensure_package(&self, package_name: &str, version: &str) -> Result<bool>;
}

#[async_trait]
impl PackageInstaller for RegistryClient {
    fn cache(&self) -> &FileSystemCache {
        RegistryClient::cache(self)
    }

    async fn resolve_version(&self, package_name: &str, version_spec: &str) -> Result<String> {
        Ok(RegistryClient::resolve_version(self, package_name, version_spec).await?)
    }

    async fn ensure_package(&self, package_name: &str, version: &str) -> Result<bool> {
        Ok(RegistryClient::ensure_package(self, package_name, version).await?)
    }
}
