//! Per-run build state.
//!
//! Everything that is shared across documents during a build lives in a
//! [`BuildContext`] that is passed by reference through the pipeline: the
//! document registry, the dependency graph, the plate, snippet and body
//! memos, the custom-function runner and the accumulated warnings.

use crate::config::{DATA_DIR, ProjectConfig};
use crate::deps::DependencyGraph;
use crate::document::Document;
use crate::plate::PlateStore;
use crate::render::{BodyCache, SnippetCache};
use crate::scripting::{FunctionRunner, NoFunctions};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A recoverable problem, reported once at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Document (or snippet) ID the problem was found in.
    pub source: String,
    pub line: Option<usize>,
    pub message: String,
}

impl Warning {
    pub fn new(source: impl Into<String>, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} L{}: {}", self.source, line, self.message),
            None => write!(f, "{}: {}", self.source, self.message),
        }
    }
}

pub struct BuildContext {
    pub root: PathBuf,
    pub config: ProjectConfig,
    /// Every lexed source document, keyed by ID.
    pub documents: BTreeMap<String, Document>,
    pub graph: DependencyGraph,
    pub plates: PlateStore,
    pub snippets: SnippetCache,
    pub bodies: BodyCache,
    pub functions: Box<dyn FunctionRunner>,
    pub warnings: Vec<Warning>,
}

impl BuildContext {
    pub fn new(root: &Path, config: ProjectConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            documents: BTreeMap::new(),
            graph: DependencyGraph::new(),
            plates: PlateStore::new(root),
            snippets: SnippetCache::new(root),
            bodies: BodyCache::new(),
            functions: Box::new(NoFunctions),
            warnings: Vec::new(),
        }
    }

    /// Replace the custom-function runner.
    pub fn with_functions(mut self, runner: impl FunctionRunner + 'static) -> Self {
        self.functions = Box::new(runner);
        self
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.output)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// Record a warning. A repeat of one already recorded is dropped.
    pub fn warn(&mut self, warning: Warning) {
        if self.warnings.contains(&warning) {
            return;
        }
        tracing::debug!(%warning, "warning recorded");
        self.warnings.push(warning);
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.root)
            .field("documents", &self.documents.len())
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}
