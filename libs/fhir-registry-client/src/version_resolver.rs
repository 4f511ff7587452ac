//! Version resolution for FHIR package dependencies.
//!
//! IG configurations may pin a dependency to a patch range such as `1.2.x`. Such a range is
//! resolved against the versions already present in the local package cache, picking the
//! highest one that satisfies the range under semantic-version precedence. Any other version
//! reference (`4.0.1`, `dev`, `current`, ...) is used verbatim.

use crate::error::Result;
use mapbuilder_package::FileSystemCache;
use regex::Regex;
use semver::{Version, VersionReq};
use std::sync::OnceLock;

/// Whether `spec` is a `<major>.<minor>.x` patch range.
pub fn is_patch_range(spec: &str) -> bool {
    static PATCH_RANGE_RE: OnceLock<Regex> = OnceLock::new();
    PATCH_RANGE_RE
        .get_or_init(|| Regex::new(r"^\d+\.\d+\.x$").expect("patch range regex must compile"))
        .is_match(spec)
}

/// Pick the highest candidate satisfying the `x`-range `spec`.
///
/// Candidates that are not valid semantic versions (`current`, `dev`, `1.2`) are ignored.
/// Pre-release candidates never satisfy a plain patch range.
pub fn select_patch_version(candidates: &[String], spec: &str) -> Option<String> {
    let req = VersionReq::parse(spec).ok()?;

    candidates
        .iter()
        .filter_map(|candidate| {
            Version::parse(candidate)
                .ok()
                .map(|parsed| (parsed, candidate))
        })
        .filter(|(parsed, _)| req.matches(parsed))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, candidate)| candidate.clone())
}

/// Resolve `spec` for package `name` against the cache directory.
///
/// Returns `spec` unchanged when it is not a patch range, or when no installed version
/// satisfies it; the caller then treats the dependency as unresolved and may fail the fetch.
/// Only a cache root that cannot be listed is an error.
pub fn resolve_patch_version(cache: &FileSystemCache, name: &str, spec: &str) -> Result<String> {
    if !is_patch_range(spec) {
        return Ok(spec.to_string());
    }

    let installed = cache.installed_versions(name)?;
    match select_patch_version(&installed, spec) {
        Some(resolved) => {
            tracing::debug!(package = %name, range = %spec, resolved = %resolved, "Resolved patch range");
            Ok(resolved)
        }
        None => {
            tracing::debug!(
                package = %name,
                range = %spec,
                candidates = installed.len(),
                "No cached version satisfies range"
            );
            Ok(spec.to_string())
        }
    }
}
