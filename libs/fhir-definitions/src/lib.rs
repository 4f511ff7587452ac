//! FHIR definition index for mapping projects
//!
//! Resolves an IG's package dependencies (declared packages, the IG's own dev build and the
//! FHIR core package), installs missing packages into the shared cache, and indexes every
//! StructureDefinition by canonical URL with its element tree.

pub mod config;
pub mod error;
pub mod ig_config;
pub mod index;
pub mod loader;
pub mod snapshot;

pub use config::IndexConfig;
pub use error::{Error, Result};
pub use ig_config::{core_package_for, find_ig_config, IgConfig, PackageDependency};
pub use index::{parse_definition, DefinitionEntity, DefinitionIndex, DefinitionSet};
pub use loader::PackageInstaller;
pub use snapshot::{build_tree, ElementNode, FlatElement};

pub use mapbuilder_registry_client::DEFAULT_REGISTRIES;
