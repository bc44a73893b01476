//! The per-source-file document (page) model.
//!
//! A [`Document`] is created once for every markup file the walker finds,
//! filled in by the lexer (variables, metadata, assets, draft flag) and then
//! read by the renderer. Documents live in the build context's registry keyed
//! by [`Document::id`] so other documents can import them.

use crate::token::{TokenStream, Vars};
use std::path::{Path, PathBuf};

/// Variable that selects the plate a document renders with.
pub const PLATE_VAR: &str = "plate";
/// Derived variable holding a document's rendered body, available to imports.
pub const BODY_VAR: &str = "body";

#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Source path relative to the project root, extension stripped, `/`-separated.
    pub id: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    /// Canonical URL path: `""` for the root index, `/a/b` otherwise.
    pub url_path: String,
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
    pub is_draft: bool,
    pub vars: Vars,
    /// `meta.*` assignments, used for the embed/SEO block.
    pub meta: Vars,
    pub stream: TokenStream,
}

impl Document {
    /// Create an unlexed document for a source file.
    ///
    /// `relative` is the path of the source below the project root and
    /// decides the ID, the output path below `output_root` and the URL.
    pub fn new(relative: &Path, source_path: PathBuf, output_root: &Path) -> Self {
        let id = document_id(relative);
        let url_path = url_path_for(&id);
        let mut vars = Vars::new();
        vars.insert("page_path".to_string(), page_path(&url_path));

        Self {
            output_path: output_root.join(format!("{id}.html")),
            id,
            source_path,
            url_path,
            vars,
            ..Self::default()
        }
    }

    /// A document that has no file of its own, such as a snippet.
    pub fn detached(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Name of the plate declared with `plate: <name>`, if any.
    pub fn plate_name(&self) -> Option<&str> {
        self.vars
            .get(PLATE_VAR)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn title(&self) -> &str {
        self.vars.get("title").map(String::as_str).unwrap_or("")
    }
}

/// Derive a document ID from its path relative to the project root.
///
/// ```text
/// index.ø          → index
/// blog/first.ø     → blog/first
/// notes/todo.txt   → notes/todo
/// ```
pub fn document_id(relative: &Path) -> String {
    let stripped = relative.with_extension("");
    stripped
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Map a document ID to its canonical URL path.
///
/// The root `index` maps to the empty string and `dir/index` collapses to `/dir`.
pub fn url_path_for(id: &str) -> String {
    if id == "index" {
        return String::new();
    }
    match id.strip_suffix("/index") {
        Some(dir) => format!("/{dir}"),
        None => format!("/{id}"),
    }
}

fn page_path(url_path: &str) -> String {
    if url_path.is_empty() {
        "/".to_string()
    } else {
        url_path.to_string()
    }
}
