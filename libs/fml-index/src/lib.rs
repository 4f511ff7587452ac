//! FML source indexing and completion
//!
//! Tracks the `uses`/`group` declarations of every `.fml` file in a project and answers
//! "which FHIR structure is bound to `src.`" queries against a
//! [`mapbuilder_definitions::DefinitionSet`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use mapbuilder_definitions::DefinitionSet;
//! use mapbuilder_fml::{resolve_completions, SourceIndexer};
//! use std::path::Path;
//!
//! let mut indexer = SourceIndexer::new();
//! indexer.scan_all(&["maps"]);
//!
//! let definitions = DefinitionSet::default();
//! if let Some(bindings) = indexer.bindings(Path::new("maps/patient.fml")) {
//!     for completion in resolve_completions(&bindings, "  src.", &definitions) {
//!         println!("{}", completion.label);
//!     }
//! }
//! ```

pub mod completion;
pub mod error;
pub mod grammar;
pub mod indexer;

pub use completion::{active_binding, resolve_completions, Completion, BUILD_IG_ADVISORY};
pub use error::{Error, Result};
pub use grammar::{DeclarationSyntax, Declarations, GroupParam, LineTokenSyntax, UsesDecl};
pub use indexer::{
    collect_fml_files, content_hash, fhir_type_of, AliasBinding, FileIndexEntry, Role,
    SourceIndexer,
};
