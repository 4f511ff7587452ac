//! Element tree construction from StructureDefinition snapshots.
//!
//! A snapshot lists every element path flat and top-down (`Patient`, `Patient.name`,
//! `Patient.name.given`, ...). Completion only needs the nesting and the declared types, so
//! the flat list is folded into a tree of [`ElementNode`]s.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// One element of a structure definition, reduced to what the tree needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlatElement {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub max: Option<Cardinality>,
    #[serde(rename = "type", default)]
    pub types: Vec<ElementType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementType {
    #[serde(default)]
    pub code: Option<String>,
}

/// Maximum cardinality as found in the wild: normally a string (`"1"`, `"*"`), sometimes a
/// bare number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cardinality {
    Number(Number),
    Text(String),
}

impl Cardinality {
    /// `max = "0"` / `max = 0` prohibits the element.
    pub fn allows_elements(&self) -> bool {
        match self {
            Cardinality::Text(text) => text != "0",
            Cardinality::Number(number) => number.as_f64().is_some_and(|n| n > 0.0),
        }
    }
}

/// A node of the element tree; `path` is the last path segment only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementNode {
    pub path: String,
    pub types: Vec<String>,
    pub children: Vec<ElementNode>,
}

impl FlatElement {
    pub fn new(path: &str, max: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            max: Some(Cardinality::Text(max.to_string())),
            types: Vec::new(),
        }
    }

    pub fn with_types(mut self, codes: &[&str]) -> Self {
        self.types = codes
            .iter()
            .map(|code| ElementType {
                code: Some(code.to_string()),
            })
            .collect();
        self
    }

    fn is_allowed(&self) -> bool {
        self.max.as_ref().is_some_and(Cardinality::allows_elements)
    }

    fn type_codes(&self) -> Vec<String> {
        self.types.iter().filter_map(|t| t.code.clone()).collect()
    }
}

/// Strip the `[x]` marker of a choice element (`deceased[x]` -> `deceased`).
pub fn strip_choice_suffix(segment: &str) -> &str {
    segment.strip_suffix("[x]").unwrap_or(segment)
}

/// Fold a snapshot's flat element list into a tree.
///
/// The first path segment (the root type) is dropped. Precondition: parents come before
/// their children, as they do in snapshots; an element whose parent node does not exist yet
/// is skipped. Elements with `max = 0` (or no `max`) produce no node, and the first node for a
/// given name wins among its siblings.
pub fn build_tree(elements: &[FlatElement]) -> Vec<ElementNode> {
    let mut roots: Vec<ElementNode> = Vec::new();

    for element in elements {
        let Some(path) = element.path.as_deref() else {
            continue;
        };
        let segments: Vec<&str> = path.split('.').skip(1).collect();
        let Some((leaf, parents)) = segments.split_last() else {
            continue;
        };
        if !element.is_allowed() {
            continue;
        }

        let Some(siblings) = find_siblings(&mut roots, parents) else {
            tracing::trace!(path = %path, "Skipping element without parent node");
            continue;
        };

        let name = strip_choice_suffix(leaf);
        if siblings.iter().any(|existing| existing.path == name) {
            continue;
        }
        siblings.push(ElementNode {
            path: name.to_string(),
            types: element.type_codes(),
            children: Vec::new(),
        });
    }

    roots
}

fn find_siblings<'a>(
    roots: &'a mut Vec<ElementNode>,
    parents: &[&str],
) -> Option<&'a mut Vec<ElementNode>> {
    let mut current = roots;
    for parent in parents {
        let name = strip_choice_suffix(parent);
        current = &mut current.iter_mut().find(|node| node.path == name)?.children;
    }
    Some(current)
}
