//! FHIR NPM package cache handling.
//!
//! Packages live in a shared cache directory (`~/.fhir/packages` by default) laid out as
//! `<cacheRoot>/<packageId>#<version>/package/*.json`. This crate knows that layout, lists
//! what is installed, and unpacks downloaded `.tgz` archives into it.

pub mod cache;

use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use thiserror::Error;

pub use cache::FileSystemCache;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

pub type PackageResult<T> = Result<T, PackageError>;

/// Directory name of an installed package (`name#version`).
pub fn package_key(name: &str, version: &str) -> String {
    format!("{}#{}", name, version)
}

/// Split a cache directory name back into `(name, version)`.
pub fn parse_package_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('#')
        .filter(|(name, version)| !name.is_empty() && !version.is_empty())
}

/// Parse JSON bytes from a package file, tolerating a UTF-8 BOM and stray control characters.
pub fn parse_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> PackageResult<T> {
    let cleaned = clean_bytes(bytes)?;
    Ok(serde_json::from_str(&cleaned)?)
}

/// Unpack a gzip-compressed tarball into `dest`.
///
/// `dest` is created if missing. Entries keep their archive paths, so an NPM package ends up
/// under `dest/package/...`.
pub fn unpack_tar_gz<R: Read>(reader: R, dest: &Path) -> PackageResult<()> {
    fs::create_dir_all(dest)?;
    let mut archive = Archive::new(GzDecoder::new(reader));
    archive.unpack(dest)?;
    Ok(())
}

/// Install a downloaded package archive at `dest`.
///
/// The archive is unpacked into a sibling staging directory and renamed into place, so a
/// concurrent reader never sees a half-extracted package. If another installer won the race
/// and `dest` already exists, the staged copy is discarded and the call still succeeds.
pub fn install_archive(archive_path: &Path, dest: &Path) -> PackageResult<()> {
    let parent = dest.parent().ok_or_else(|| {
        PackageError::InvalidStructure(format!("{} has no parent directory", dest.display()))
    })?;
    fs::create_dir_all(parent)?;

    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PackageError::InvalidStructure(format!("{} has no file name", dest.display())))?;
    let staging = parent.join(format!(".{}.{}.partial", file_name, uuid::Uuid::new_v4()));

    let unpacked = fs::File::open(archive_path)
        .map_err(PackageError::from)
        .and_then(|file| unpack_tar_gz(file, &staging));
    if let Err(e) = unpacked {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    match fs::rename(&staging, dest) {
        Ok(()) => Ok(()),
        Err(_) if dest.is_dir() => {
            tracing::debug!(dest = %dest.display(), "Package directory already installed");
            let _ = fs::remove_dir_all(&staging);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            Err(e.into())
        }
    }
}

fn clean_bytes(bytes: &[u8]) -> PackageResult<String> {
    let bytes = if bytes.len() >= 3 && &bytes[..3] == b"\xEF\xBB\xBF" {
        &bytes[3..]
    } else {
        bytes
    };

    let content = String::from_utf8(bytes.to_vec())
        .map_err(|e| PackageError::InvalidStructure(format!("Invalid UTF-8: {}", e)))?;

    Ok(content
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\x7F'))
        .collect::<String>()
        .trim()
        .to_string())
}
