//! File system package cache following the FHIR package cache layout.

use crate::{package_key, parse_package_key, PackageResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Read-mostly view of `<cacheRoot>/<name>#<version>/package/...`.
///
/// The cache directory is shared with other FHIR tooling (SUSHI, the IG publisher), so this
/// type never deletes anything it did not create.
#[derive(Debug, Clone)]
pub struct FileSystemCache {
    cache_root: PathBuf,
}

impl FileSystemCache {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Get package directory path (`<cacheRoot>/<name>#<version>`).
    pub fn package_directory(&self, name: &str, version: &str) -> PathBuf {
        self.cache_root.join(package_key(name, version))
    }

    /// Directory holding the package's resources (`.../package`).
    pub fn package_contents(&self, name: &str, version: &str) -> PathBuf {
        self.package_directory(name, version).join("package")
    }

    pub fn has_package(&self, name: &str, version: &str) -> bool {
        self.package_directory(name, version).exists()
    }

    /// Versions of `name` present in the cache, taken from directory names `name#<version>`.
    ///
    /// Fails only when the cache root itself cannot be listed. Plain files that happen to
    /// match the naming scheme are ignored.
    pub fn installed_versions(&self, name: &str) -> PackageResult<Vec<String>> {
        let mut versions = Vec::new();

        for entry in fs::read_dir(&self.cache_root)? {
            let entry = entry?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let dir_name = entry.file_name();
            if let Some((package, version)) = dir_name.to_str().and_then(parse_package_key) {
                if package == name {
                    versions.push(version.to_string());
                }
            }
        }

        versions.sort();
        Ok(versions)
    }

    /// `StructureDefinition*.json` files shipped in an installed package, sorted by name.
    pub fn structure_definition_files(&self, name: &str, version: &str) -> PackageResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.package_contents(name, version))? {
            let entry = entry?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with("StructureDefinition") && file_name.ends_with(".json") {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}
