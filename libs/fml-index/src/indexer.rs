//! Per-file alias bindings for FML sources, cached by content hash.

use crate::error::{Error, Result};
use crate::grammar::{DeclarationSyntax, Declarations, LineTokenSyntax};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

pub const FML_EXTENSION: &str = "fml";

/// Role of a `uses` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Source,
    Target,
    Other(String),
}

impl Role {
    pub fn parse(role: &str) -> Self {
        match role {
            "source" => Role::Source,
            "target" => Role::Target,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Source => "source",
            Role::Target => "target",
            Role::Other(other) => other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structure declared with `uses`, and the group parameter name bound to it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBinding {
    pub url: String,
    pub alias: String,
    pub role: Role,
    pub bound_name: Option<String>,
}

impl AliasBinding {
    pub fn fhir_type(&self) -> &str {
        fhir_type_of(&self.url)
    }
}

/// Last `/` segment of a canonical URL.
pub fn fhir_type_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Cached state of one source file. Hash and bindings are always replaced together.
#[derive(Debug, Clone)]
pub struct FileIndexEntry {
    pub path: PathBuf,
    pub content_hash: String,
    pub bindings: Arc<Vec<AliasBinding>>,
}

/// Hex SHA-256 of raw file bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Build bindings from a file's declarations: one per `uses`, then group names matched on
/// `(role, alias)`.
pub fn bind_declarations(declarations: &Declarations) -> Vec<AliasBinding> {
    let mut bindings: Vec<AliasBinding> = declarations
        .uses
        .iter()
        .map(|decl| AliasBinding {
            alias: decl
                .alias
                .clone()
                .unwrap_or_else(|| fhir_type_of(&decl.url).to_string()),
            url: decl.url.clone(),
            role: Role::parse(&decl.role),
            bound_name: None,
        })
        .collect();

    for param in &declarations.group {
        let role = Role::parse(&param.role);
        match bindings
            .iter_mut()
            .find(|binding| binding.role == role && binding.alias == param.alias)
        {
            Some(binding) => binding.bound_name = Some(param.name.clone()),
            None => {
                tracing::debug!(name = %param.name, alias = %param.alias, "Group parameter has no matching uses declaration");
            }
        }
    }

    bindings
}

/// Every `.fml` file at or below `path`, sorted. Only a failure on `path` itself is an
/// error; unreadable entries below it are logged and skipped.
pub fn collect_fml_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_fml(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_fml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == FML_EXTENSION)
}

/// Owner of the per-file binding map.
pub struct SourceIndexer {
    syntax: Box<dyn DeclarationSyntax>,
    entries: HashMap<PathBuf, FileIndexEntry>,
}

impl Default for SourceIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceIndexer {
    pub fn new() -> Self {
        Self::with_syntax(Box::new(LineTokenSyntax))
    }

    pub fn with_syntax(syntax: Box<dyn DeclarationSyntax>) -> Self {
        Self {
            syntax,
            entries: HashMap::new(),
        }
    }

    /// Drop everything and index every `.fml` file under `roots`. Unreadable roots and
    /// files are logged and skipped. Returns the number of files indexed.
    pub fn scan_all<P: AsRef<Path>>(&mut self, roots: &[P]) -> usize {
        self.entries.clear();

        for root in roots {
            let root = root.as_ref();
            let files = match collect_fml_files(root) {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "Could not scan for FML files");
                    continue;
                }
            };
            for file in files {
                match read_entry(self.syntax.as_ref(), &file) {
                    Ok(entry) => {
                        self.entries.insert(file, entry);
                    }
                    Err(e) => tracing::warn!(error = %e, "Skipping FML file"),
                }
            }
        }

        tracing::info!(files = self.entries.len(), "FML sources indexed");
        self.entries.len()
    }

    /// Handle a create/change notification for a file or directory. Files whose content hash
    /// is unchanged are not re-parsed, unreadable ones are skipped. Returns the number of
    /// files re-parsed.
    pub fn file_changed(&mut self, path: &Path) -> Result<usize> {
        let mut reparsed = 0;

        for file in collect_fml_files(path)? {
            let bytes = match std::fs::read(&file) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "Skipping FML file");
                    continue;
                }
            };
            let hash = content_hash(&bytes);
            if self
                .entries
                .get(&file)
                .is_some_and(|entry| entry.content_hash == hash)
            {
                tracing::trace!(file = %file.display(), "FML file unchanged");
                continue;
            }

            let entry = build_entry(self.syntax.as_ref(), &file, hash, &bytes);
            tracing::debug!(file = %file.display(), bindings = entry.bindings.len(), "FML file re-indexed");
            self.entries.insert(file, entry);
            reparsed += 1;
        }

        Ok(reparsed)
    }

    /// Forget `path` and, if it was a directory, every file below it. Returns the number of
    /// entries removed.
    pub fn file_deleted(&mut self, path: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|known, _| !known.starts_with(path));
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(path = %path.display(), removed, "FML entries removed");
        }
        removed
    }

    pub fn bindings(&self, path: &Path) -> Option<Arc<Vec<AliasBinding>>> {
        self.entries.get(path).map(|entry| entry.bindings.clone())
    }

    pub fn entry(&self, path: &Path) -> Option<&FileIndexEntry> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &FileIndexEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_entry(syntax: &dyn DeclarationSyntax, file: &Path) -> Result<FileIndexEntry> {
    let bytes = std::fs::read(file).map_err(|source| Error::Io {
        path: file.to_path_buf(),
        source,
    })?;
    let hash = content_hash(&bytes);
    Ok(build_entry(syntax, file, hash, &bytes))
}

fn build_entry(
    syntax: &dyn DeclarationSyntax,
    file: &Path,
    content_hash: String,
    bytes: &[u8],
) -> FileIndexEntry {
    let text = String::from_utf8_lossy(bytes);
    FileIndexEntry {
        path: file.to_path_buf(),
        content_hash,
        bindings: Arc::new(bind_declarations(&syntax.declarations(&text))),
    }
}
