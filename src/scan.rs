//! Filesystem scanning.
//!
//! Stage 1 of the build pipeline. Walks the project to find source
//! documents, the current output tree and the auxiliary assets under
//! `_data/`, and copies `include` entries into the output.
//!
//! ## Project Structure
//!
//! ```text
//! site/
//! ├── _data/
//! │   ├── oko.toml                # Project configuration
//! │   ├── plates/post.json        # Plates
//! │   ├── snippets/nav.ø          # Snippets
//! │   └── functions/toc.lua       # Custom-function scripts
//! ├── index.ø                     # → public/index.html
//! ├── about.txt                   # → public/about.html (.txt is markup too)
//! ├── robots.txt                  # ignored (use `include`)
//! ├── legacy.html                 # copied verbatim
//! ├── blog/
//! │   └── first.ø                 # → public/blog/first.html
//! ├── .git/                       # skipped: names starting with '.'
//! ├── _drafts/                    # skipped: names starting with '_'
//! └── public/                     # skipped: the output directory
//! ```

use crate::deps::DepKey;
use crate::document::document_id;
use crate::select::SourceKind;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A source file found by the walker.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub id: String,
    /// Path relative to the project root.
    pub relative: PathBuf,
    pub kind: SourceKind,
    pub modified: SystemTime,
}

/// What the previous build left behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTree {
    /// `.html` files by ID, with their modification time.
    pub pages: BTreeMap<String, SystemTime>,
    /// Every sub-directory, relative and `/`-separated.
    pub dirs: BTreeSet<String>,
    /// Newest modification time of any file in the tree.
    pub youngest: Option<SystemTime>,
}

/// Result of copying `include` entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeReport {
    pub copied: Vec<String>,
    pub deleted: Vec<String>,
    /// Entries that exist neither in the project nor in the output.
    pub missing: Vec<String>,
}

/// Auxiliary asset directories below `_data/` and the key they map to.
const ASSET_DIRS: &[(&str, fn(String) -> DepKey)] = &[
    ("snippets", DepKey::Snippet),
    ("plates", DepKey::Plate),
    ("functions", DepKey::Function),
];

/// Find every markup and static HTML source below `root`.
pub fn scan_sources(root: &Path, output: &str) -> Result<Vec<SourceFile>, ScanError> {
    let output_dir = root.join(output);
    let mut sources = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && e.path() != output_dir.as_path());

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(kind) = source_kind(entry.path()) else {
            continue;
        };
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_path_buf();
        sources.push(SourceFile {
            id: document_id(&relative),
            relative,
            kind,
            modified: entry.metadata()?.modified()?,
        });
    }

    debug!(count = sources.len(), "scanned sources");
    Ok(sources)
}

/// Walk the output directory. A missing directory is an empty tree.
pub fn scan_outputs(output_dir: &Path) -> Result<OutputTree, ScanError> {
    let mut tree = OutputTree::default();
    if !output_dir.is_dir() {
        return Ok(tree);
    }

    for entry in WalkDir::new(output_dir).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(output_dir).unwrap_or(entry.path());

        if entry.file_type().is_dir() {
            tree.dirs.insert(slash_path(relative));
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        if tree.youngest.is_none_or(|youngest| modified > youngest) {
            tree.youngest = Some(modified);
        }
        if relative.extension().is_some_and(|e| e == "html") {
            tree.pages.insert(document_id(relative), modified);
        }
    }
    Ok(tree)
}

/// Modification times of snippets, plates and function scripts.
pub fn scan_assets(data_dir: &Path) -> Result<Vec<(DepKey, SystemTime)>, ScanError> {
    let mut assets = Vec::new();

    for (dir_name, key) in ASSET_DIRS {
        let dir = data_dir.join(dir_name);
        if !dir.is_dir() {
            continue;
        }
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&dir).unwrap_or(entry.path());
            assets.push((key(document_id(relative)), entry.metadata()?.modified()?));
        }
    }
    Ok(assets)
}

/// Copy `include` files and directories into the output when newer.
///
/// Files that disappeared from an included directory are removed from its
/// output copy; an include that vanished entirely has its copy deleted.
pub fn copy_includes(
    root: &Path,
    output_dir: &Path,
    includes: &[String],
) -> Result<IncludeReport, ScanError> {
    let mut report = IncludeReport::default();

    for include in includes {
        let source = root.join(include);
        let target = output_dir.join(include);

        if source.is_dir() {
            sync_dir(&source, &target, include, &mut report)?;
        } else if source.is_file() {
            if copy_if_newer(&source, &target)? {
                report.copied.push(include.clone());
            }
        } else if target.exists() {
            remove_path(&target)?;
            report.deleted.push(include.clone());
        } else {
            report.missing.push(include.clone());
        }
    }
    Ok(report)
}

fn sync_dir(
    source: &Path,
    target: &Path,
    include: &str,
    report: &mut IncludeReport,
) -> Result<(), ScanError> {
    let mut wanted = BTreeSet::new();

    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        wanted.insert(relative.to_path_buf());
        if copy_if_newer(entry.path(), &target.join(relative))? {
            report
                .copied
                .push(format!("{include}/{}", slash_path(relative)));
        }
    }

    if !target.is_dir() {
        return Ok(());
    }
    let stale: Vec<PathBuf> = WalkDir::new(target)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(target).ok()?.to_path_buf();
            (!wanted.contains(&relative)).then_some(relative)
        })
        .collect();
    for relative in stale {
        fs::remove_file(target.join(&relative))?;
        report
            .deleted
            .push(format!("{include}/{}", slash_path(&relative)));
    }
    Ok(())
}

/// Copy `source` to `target` unless the target is at least as new.
pub fn copy_if_newer(source: &Path, target: &Path) -> Result<bool, ScanError> {
    if let Ok(existing) = target.metadata() {
        if existing.modified()? >= source.metadata()?.modified()? {
            return Ok(false);
        }
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;
    Ok(true)
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "ø" => Some(SourceKind::Markup),
        "txt" if path.file_name().is_some_and(|n| n != "robots.txt") => Some(SourceKind::Markup),
        "html" => Some(SourceKind::Static),
        _ => None,
    }
}

/// Names starting with `.` or `_` are never part of the site. The walk root
/// itself is exempt.
fn is_hidden(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0 && (name.starts_with('.') || name.starts_with('_'))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
