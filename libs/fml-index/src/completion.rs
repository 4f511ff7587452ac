//! Dotted-path completion for group parameter names.

use crate::indexer::{AliasBinding, Role};
use mapbuilder_definitions::{DefinitionSet, ElementNode};
use serde::Serialize;

/// Shown instead of element names when the structure belongs to the IG being authored but is
/// not in the index yet.
pub const BUILD_IG_ADVISORY: &str = "You need to build IG to access autocomplete";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Completion {
    pub fn element(node: &ElementNode) -> Self {
        Self {
            label: node.path.clone(),
            detail: (!node.types.is_empty()).then(|| node.types.join(" | ")),
        }
    }

    pub fn advisory() -> Self {
        Self {
            label: BUILD_IG_ADVISORY.to_string(),
            detail: None,
        }
    }

    pub fn is_advisory(&self) -> bool {
        self.label == BUILD_IG_ADVISORY
    }
}

/// The binding whose group parameter name the line prefix ends with, followed by a dot.
///
/// Only the first bound source and the first bound target are candidates.
pub fn active_binding<'a>(bindings: &'a [AliasBinding], line_prefix: &str) -> Option<&'a AliasBinding> {
    [Role::Source, Role::Target].iter().find_map(|role| {
        let name = bindings
            .iter()
            .filter(|binding| &binding.role == role)
            .find_map(|binding| binding.bound_name.as_deref().filter(|name| !name.is_empty()))?;
        if !ends_with_member_access(line_prefix, name) {
            return None;
        }
        bindings
            .iter()
            .find(|binding| binding.bound_name.as_deref() == Some(name))
    })
}

fn ends_with_member_access(line_prefix: &str, name: &str) -> bool {
    let Some(before) = line_prefix
        .strip_suffix('.')
        .and_then(|rest| rest.strip_suffix(name))
    else {
        return false;
    };
    !before
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Completions for the cursor's line prefix: child elements of the bound structure, the
/// build advisory for unbuilt in-IG structures, or nothing.
pub fn resolve_completions(
    bindings: &[AliasBinding],
    line_prefix: &str,
    definitions: &DefinitionSet,
) -> Vec<Completion> {
    let Some(binding) = active_binding(bindings, line_prefix) else {
        return Vec::new();
    };
    if binding.url.is_empty() {
        return Vec::new();
    }

    match definitions.get(&binding.url) {
        Some(entity) => entity.elements.iter().map(Completion::element).collect(),
        None if definitions.in_ig_namespace(&binding.url) => vec![Completion::advisory()],
        None => {
            tracing::debug!(url = %binding.url, "No definition indexed for bound structure");
            Vec::new()
        }
    }
}
