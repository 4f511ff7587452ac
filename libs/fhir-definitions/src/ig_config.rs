//! SUSHI IG configuration (`sushi-config.yaml`) handling.
//!
//! Only the fields that decide which packages to index are read: `canonical`, `id`,
//! `fhirVersion` and `dependencies`.

use crate::error::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const IG_CONFIG_FILE_NAMES: [&str; 2] = ["sushi-config.yaml", "sushi-config.yml"];

pub const DEFAULT_FHIR_VERSION: &str = "4.0.1";
pub const R4_CORE_PACKAGE: &str = "hl7.fhir.r4.core";
pub const R4B_CORE_PACKAGE: &str = "hl7.fhir.r4b.core";
pub const R5_CORE_PACKAGE: &str = "hl7.fhir.r5.core";

/// Version reference used for the IG's own locally built package.
pub const DEV_BUILD_VERSION: &str = "dev";

/// A package the IG depends on, with its version reference as written (`4.0.1`, `1.2.x`, `dev`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDependency {
    pub package_id: String,
    pub version_spec: String,
}

impl PackageDependency {
    pub fn new(package_id: impl Into<String>, version_spec: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            version_spec: version_spec.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIgConfig {
    #[serde(default)]
    canonical: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    fhir_version: Option<Value>,
    #[serde(default)]
    dependencies: Option<Value>,
}

/// The parts of an IG configuration relevant to definition indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgConfig {
    pub canonical: String,
    pub id: String,
    pub fhir_version: String,
    pub dependencies: Vec<PackageDependency>,
}

impl Default for IgConfig {
    /// No configuration: plain FHIR R4, no extra dependencies.
    fn default() -> Self {
        Self {
            canonical: String::new(),
            id: String::new(),
            fhir_version: DEFAULT_FHIR_VERSION.to_string(),
            dependencies: Vec::new(),
        }
    }
}

impl IgConfig {
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: Option<RawIgConfig> =
            serde_yaml::from_str(yaml).map_err(|e| Error::IgConfig(e.to_string()))?;
        let raw = raw.unwrap_or_default();

        let listed_versions = match raw.fhir_version {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(&other).into_iter().collect(),
            None => Vec::new(),
        };
        let fhir_version = select_fhir_version(&listed_versions)
            .unwrap_or_else(|| DEFAULT_FHIR_VERSION.to_string());

        let declared = match raw.dependencies {
            Some(Value::Mapping(map)) => map,
            Some(Value::Null) | None => serde_yaml::Mapping::new(),
            Some(_) => {
                tracing::warn!("IG dependencies are not a mapping, ignoring them");
                serde_yaml::Mapping::new()
            }
        };
        let dependencies = declared
            .iter()
            .filter_map(|(key, value)| {
                let package_id = scalar_to_string(key)?;
                match dependency_version(value) {
                    Some(version_spec) => Some(PackageDependency {
                        package_id,
                        version_spec,
                    }),
                    None => {
                        tracing::warn!(package = %package_id, "Dependency has no usable version, skipping");
                        None
                    }
                }
            })
            .collect();

        Ok(Self {
            canonical: raw.canonical.as_ref().and_then(scalar_to_string).unwrap_or_default(),
            id: raw.id.as_ref().and_then(scalar_to_string).unwrap_or_default(),
            fhir_version,
            dependencies,
        })
    }

    pub fn core_package(&self) -> &'static str {
        core_package_for(&self.fhir_version)
    }

    /// Everything to index: declared dependencies, the IG's own dev build, then the core
    /// FHIR package.
    pub fn dependency_list(&self) -> Vec<PackageDependency> {
        let mut list = self.dependencies.clone();
        if !self.id.is_empty() {
            list.push(PackageDependency::new(self.id.clone(), DEV_BUILD_VERSION));
        }
        list.push(PackageDependency::new(self.core_package(), self.fhir_version.clone()));
        list
    }
}

/// Locate the IG configuration in `project_root`; the first matching name wins.
pub fn find_ig_config(project_root: &Path) -> Option<PathBuf> {
    IG_CONFIG_FILE_NAMES
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.is_file())
}

/// First listed version that names a known FHIR release. A leading `#` is ignored.
pub fn select_fhir_version(listed: &[String]) -> Option<String> {
    static FHIR_VERSION_RE: OnceLock<Regex> = OnceLock::new();
    let re = FHIR_VERSION_RE.get_or_init(|| {
        Regex::new(r"current|4\.0\.1|4\.[1-9]\d*\.\d+|5\.\d+\.\d+")
            .expect("FHIR version regex must compile")
    });

    listed
        .iter()
        .filter_map(|version| {
            version
                .trim_start_matches('#')
                .split_whitespace()
                .next()
                .map(str::to_string)
        })
        .find(|version| re.is_match(version))
}

/// Core package for a FHIR version: `4.0.x` is R4, `4.1.x`/`4.3.x` R4B, anything else R5.
pub fn core_package_for(fhir_version: &str) -> &'static str {
    if fhir_version.starts_with("4.1.") || fhir_version.starts_with("4.3.") {
        R4B_CORE_PACKAGE
    } else if fhir_version.starts_with("4.0.") {
        R4_CORE_PACKAGE
    } else {
        R5_CORE_PACKAGE
    }
}

fn dependency_version(value: &Value) -> Option<String> {
    match value {
        Value::Mapping(details) => details.get("version").and_then(scalar_to_string),
        other => scalar_to_string(other),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_configuration() {
        let config = IgConfig::parse(
            r#"
id: my.ig
canonical: http://example.org/fhir/my-ig
fhirVersion: 4.0.1
dependencies:
  hl7.fhir.us.core: 6.1.x
  hl7.terminology.r4:
    id: tx
    uri: http://terminology.hl7.org/ImplementationGuide/hl7.terminology
    version: 5.3.0
  numeric.dep: 1.2
  broken.dep:
"#,
        )
        .unwrap();

        assert_eq!(config.id, "my.ig");
        assert_eq!(config.canonical, "http://example.org/fhir/my-ig");
        assert_eq!(config.fhir_version, "4.0.1");
        assert_eq!(
            config.dependencies,
            vec![
                PackageDependency::new("hl7.fhir.us.core", "6.1.x"),
                PackageDependency::new("hl7.terminology.r4", "5.3.0"),
                PackageDependency::new("numeric.dep", "1.2"),
            ]
        );
        assert_eq!(
            config.dependency_list(),
            vec![
                PackageDependency::new("hl7.fhir.us.core", "6.1.x"),
                PackageDependency::new("hl7.terminology.r4", "5.3.0"),
                PackageDependency::new("numeric.dep", "1.2"),
                PackageDependency::new("my.ig", "dev"),
                PackageDependency::new("hl7.fhir.r4.core", "4.0.1"),
            ]
        );
    }

    #[test]
    fn test_first_recognized_fhir_version_wins() {
        let config = IgConfig::parse("id: x\nfhirVersion:\n  - 3.0.2\n  - '#4.3.0'\n  - 5.0.0\n").unwrap();
        assert_eq!(config.fhir_version, "4.3.0");
        assert_eq!(config.core_package(), R4B_CORE_PACKAGE);
    }

    #[test]
    fn test_unrecognized_or_missing_version_defaults_to_r4() {
        let config = IgConfig::parse("id: x\nfhirVersion: 3.0.2\n").unwrap();
        assert_eq!(config.fhir_version, DEFAULT_FHIR_VERSION);
        assert_eq!(config.core_package(), R4_CORE_PACKAGE);

        let config = IgConfig::parse("id: x\n").unwrap();
        assert_eq!(config.fhir_version, DEFAULT_FHIR_VERSION);
    }

    #[test]
    fn test_core_package_selection() {
        assert_eq!(core_package_for("4.0.1"), R4_CORE_PACKAGE);
        assert_eq!(core_package_for("4.1.0"), R4B_CORE_PACKAGE);
        assert_eq!(core_package_for("4.3.0"), R4B_CORE_PACKAGE);
        assert_eq!(core_package_for("4.4.0"), R5_CORE_PACKAGE);
        assert_eq!(core_package_for("5.0.0"), R5_CORE_PACKAGE);
        assert_eq!(core_package_for("current"), R5_CORE_PACKAGE);
    }

    #[test]
    fn test_default_configuration_indexes_core_only() {
        assert_eq!(
            IgConfig::default().dependency_list(),
            vec![PackageDependency::new(R4_CORE_PACKAGE, DEFAULT_FHIR_VERSION)]
        );
        assert!(IgConfig::parse("").unwrap().dependency_list().len() == 1);
    }

    #[test]
    fn test_unparsable_configuration_is_an_error() {
        assert!(matches!(
            IgConfig::parse("id: [unterminated"),
            Err(Error::IgConfig(_))
        ));
    }

    #[test]
    fn test_malformed_dependencies_keep_other_fields() {
        let ig = IgConfig::parse(
            "canonical: http://example.org/fhir\nid: example.ig\ndependencies: 42\n",
        )
        .unwrap();
        assert_eq!(ig.canonical, "http://example.org/fhir");
        assert_eq!(ig.id, "example.ig");
        assert!(ig.dependencies.is_empty());
        assert_eq!(
            ig.dependency_list(),
            vec![
                PackageDependency::new("example.ig", DEV_BUILD_VERSION),
                PackageDependency::new(R4_CORE_PACKAGE, DEFAULT_FHIR_VERSION),
            ]
        );

        let listed = IgConfig::parse("id: example.ig\ndependencies:\n  - a.pkg\n").unwrap();
        assert_eq!(listed.id, "example.ig");
        assert!(listed.dependencies.is_empty());
    }

    #[test]
    fn test_find_ig_config_prefers_yaml() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_ig_config(dir.path()), None);

        std::fs::write(dir.path().join("sushi-config.yml"), "id: a").unwrap();
        assert_eq!(
            find_ig_config(dir.path()),
            Some(dir.path().join("sushi-config.yml"))
        );

        std::fs::write(dir.path().join("sushi-config.yaml"), "id: b").unwrap();
        assert_eq!(
            find_ig_config(dir.path()),
            Some(dir.path().join("sushi-config.yaml"))
        );
    }
}
