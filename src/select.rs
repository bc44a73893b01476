//! Incremental build selection.
//!
//! Pure decision logic over a [`Snapshot`] of modification times. The
//! scanner builds the snapshot, the build pipeline applies the resulting
//! [`Selection`]; nothing here touches the filesystem.
//!
//! A document is re-rendered when its source is newer than its output, when
//! it has no output yet, or when everything is forced. An auxiliary asset
//! (snippet, plate, function) newer than the youngest existing output adds
//! the documents that reference it directly. Dependents of those documents
//! are not pulled in.

use crate::deps::{DepKey, DependencyGraph};
use std::collections::BTreeSet;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Lexed and rendered.
    Markup,
    /// `.html` source, copied verbatim.
    Static,
}

/// One source file and the state of its output counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState {
    pub id: String,
    pub kind: SourceKind,
    pub modified: SystemTime,
    pub output_modified: Option<SystemTime>,
    pub is_draft: bool,
}

/// Filesystem state the selection is computed from.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub sources: Vec<SourceState>,
    /// IDs of the `.html` files currently in the output tree.
    pub outputs: BTreeSet<String>,
    /// Sub-directories of the output tree, relative, `/`-separated.
    pub output_dirs: BTreeSet<String>,
    pub assets: Vec<(DepKey, SystemTime)>,
    /// Newest modification time in the output tree, `None` when empty.
    pub youngest_output: Option<SystemTime>,
    /// Output paths owned by `include` entries; never deleted here.
    pub protected: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    pub render_all: bool,
    pub drafts: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Markup documents to render.
    pub render: BTreeSet<String>,
    /// Static `.html` sources to copy.
    pub copy: BTreeSet<String>,
    /// Output IDs whose `.html` file should be removed.
    pub delete: BTreeSet<String>,
    pub create_dirs: BTreeSet<String>,
    /// Output directories with no source counterpart, removed once empty.
    pub delete_dirs: BTreeSet<String>,
    /// Auxiliary assets that changed since the last build.
    pub changed_assets: Vec<DepKey>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.render.is_empty()
            && self.copy.is_empty()
            && self.delete.is_empty()
            && self.create_dirs.is_empty()
            && self.delete_dirs.is_empty()
    }
}

pub fn select(snapshot: &Snapshot, graph: &DependencyGraph, policy: Policy) -> Selection {
    let mut selection = Selection::default();
    let mut live = BTreeSet::new();

    for source in &snapshot.sources {
        let excluded = source.is_draft && !policy.drafts;
        if excluded {
            if source.output_modified.is_some() {
                selection.delete.insert(source.id.clone());
            }
            continue;
        }
        live.insert(source.id.as_str());

        let stale = policy.render_all
            || source
                .output_modified
                .is_none_or(|output| source.modified > output);
        if !stale {
            continue;
        }
        match source.kind {
            SourceKind::Markup => selection.render.insert(source.id.clone()),
            SourceKind::Static => selection.copy.insert(source.id.clone()),
        };
    }

    for (key, modified) in &snapshot.assets {
        let changed = snapshot
            .youngest_output
            .is_none_or(|youngest| *modified > youngest);
        if !changed {
            continue;
        }
        selection.changed_assets.push(key.clone());
        for dependent in graph.dependents(key) {
            let is_markup = snapshot
                .sources
                .iter()
                .any(|s| s.id == dependent && s.kind == SourceKind::Markup);
            if is_markup && live.contains(dependent) {
                selection.render.insert(dependent.to_string());
            }
        }
    }

    for output in &snapshot.outputs {
        if !live.contains(output.as_str()) && !is_protected(output, &snapshot.protected) {
            selection.delete.insert(output.clone());
        }
    }

    let source_dirs: BTreeSet<String> = live.iter().flat_map(|id| ancestors(id)).collect();
    selection.create_dirs = source_dirs
        .difference(&snapshot.output_dirs)
        .cloned()
        .collect();
    selection.delete_dirs = snapshot
        .output_dirs
        .difference(&source_dirs)
        .filter(|dir| !is_protected_dir(dir, &snapshot.protected))
        .cloned()
        .collect();

    selection
}

/// Directory prefixes of an ID: `a/b/c` → `a`, `a/b`.
fn ancestors(id: &str) -> Vec<String> {
    id.match_indices('/')
        .map(|(i, _)| id[..i].to_string())
        .collect()
}

fn is_protected(path: &str, protected: &[String]) -> bool {
    protected
        .iter()
        .any(|p| path == p || path.starts_with(&format!("{p}/")))
}

/// A directory is protected when it is an include, lies inside one, or
/// contains one.
fn is_protected_dir(dir: &str, protected: &[String]) -> bool {
    is_protected(dir, protected)
        || protected
            .iter()
            .any(|p| p.starts_with(&format!("{dir}/")))
}
