//! Reverse dependency index from referenced assets to referencing documents.
//!
//! Populated only by the lexer and read only by the incremental build
//! selector. Lexing may run in parallel, each task filling its own graph;
//! the partial graphs are combined with [`DependencyGraph::merge`] before
//! selection starts.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Something a document can depend on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DepKey {
    /// Another document, referenced by `+ id`.
    Document(String),
    /// A snippet under `_data/snippets/`.
    Snippet(String),
    /// A plate under `_data/plates/`.
    Plate(String),
    /// A custom-function script under `_data/functions/`.
    Function(String),
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Document(id) => write!(f, "{id}"),
            DepKey::Snippet(name) => write!(f, "snippet:{name}"),
            DepKey::Plate(name) => write!(f, "plate:{name}"),
            DepKey::Function(name) => write!(f, "function:{name}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    edges: BTreeMap<DepKey, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that document `dependent` references `key`.
    pub fn add(&mut self, key: DepKey, dependent: &str) {
        self.edges
            .entry(key)
            .or_default()
            .insert(dependent.to_string());
    }

    /// Documents that reference `key` directly.
    pub fn dependents(&self, key: &DepKey) -> impl Iterator<Item = &str> {
        self.edges
            .get(key)
            .into_iter()
            .flat_map(|ids| ids.iter().map(String::as_str))
    }

    pub fn merge(&mut self, other: DependencyGraph) {
        for (key, ids) in other.edges {
            self.edges.entry(key).or_default().extend(ids);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &DepKey> {
        self.edges.keys()
    }
}
