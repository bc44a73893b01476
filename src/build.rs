//! The build pipeline.
//!
//! ```text
//! walk → lex-all → select → render-selected → write → delete
//! ```
//!
//! The lex phase runs over all markup documents in parallel; every task owns
//! a local [`DependencyGraph`] that is merged once the phase is complete, so
//! the graph is frozen before selection and rendering start. Rendering is
//! parallel as well: renderers share the [`BuildContext`] read-only and
//! collect their own warnings. Each document writes to its own output path.

use crate::config::{self, CONFIG_FILE, ConfigError, DATA_DIR};
use crate::context::{BuildContext, Warning};
use crate::deps::DependencyGraph;
use crate::document::{BODY_VAR, Document};
use crate::lexer::{self, LexError};
use crate::render::{RenderError, Renderer};
use crate::scan::{self, ScanError, SourceFile};
use crate::select::{self, Policy, Selection, Snapshot, SourceKind, SourceState};
use crate::sitemap;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command-line overrides. Each flag can only switch a setting on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub render_all: bool,
    pub drafts: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// IDs of the rendered documents.
    pub rendered: Vec<String>,
    /// Output paths of copied static sources and includes.
    pub copied: Vec<String>,
    /// Output paths that were removed.
    pub deleted: Vec<String>,
    pub sitemap_written: bool,
    pub warnings: Vec<Warning>,
}

impl BuildReport {
    pub fn is_noop(&self) -> bool {
        self.rendered.is_empty() && self.copied.is_empty() && self.deleted.is_empty()
    }
}

/// Load the project at `root` and build it.
pub fn build(root: &Path, options: BuildOptions) -> Result<BuildReport, BuildError> {
    let config = config::load_config(root)?;
    build_with(BuildContext::new(root, config), options)
}

/// Build with a prepared context, e.g. one carrying a function runner.
pub fn build_with(
    mut ctx: BuildContext,
    options: BuildOptions,
) -> Result<BuildReport, BuildError> {
    let sources = scan::scan_sources(&ctx.root, &ctx.config.output)?;
    lex_all(&mut ctx, &sources)?;

    let output_dir = ctx.output_dir();
    let policy = Policy {
        render_all: ctx.config.render_all || options.render_all,
        drafts: ctx.config.drafts || options.drafts,
    };
    let snapshot = take_snapshot(&ctx, &sources)?;
    let selection = select::select(&snapshot, &ctx.graph, policy);
    debug!(
        render = selection.render.len(),
        copy = selection.copy.len(),
        delete = selection.delete.len(),
        "selection computed"
    );

    let mut report = BuildReport::default();
    for dir in &selection.create_dirs {
        fs::create_dir_all(output_dir.join(dir))?;
    }

    render_selected(&mut ctx, &selection, &mut report)?;
    copy_static(&ctx, &sources, &selection, &mut report)?;
    delete_outputs(&output_dir, &selection, &mut report)?;

    let includes = scan::copy_includes(&ctx.root, &output_dir, &ctx.config.include)?;
    report.copied.extend(includes.copied);
    report.deleted.extend(includes.deleted);
    for missing in includes.missing {
        ctx.warn(Warning::new(
            format!("{DATA_DIR}/{CONFIG_FILE}"),
            None,
            format!("include \"{missing}\" does not exist"),
        ));
    }

    if ctx.config.sitemap && !report.rendered.is_empty() {
        let pages = ctx
            .documents
            .values()
            .filter(|doc| policy.drafts || !doc.is_draft);
        sitemap::write_sitemap(&output_dir, &ctx.config.domain, pages)?;
        report.sitemap_written = true;
    }

    info!(
        rendered = report.rendered.len(),
        copied = report.copied.len(),
        deleted = report.deleted.len(),
        warnings = ctx.warnings.len(),
        "build finished"
    );
    report.warnings = ctx.warnings;
    Ok(report)
}

/// Load, walk and lex the project without writing anything.
pub fn check(root: &Path) -> Result<BuildContext, BuildError> {
    let config = config::load_config(root)?;
    let mut ctx = BuildContext::new(root, config);
    let sources = scan::scan_sources(&ctx.root, &ctx.config.output)?;
    lex_all(&mut ctx, &sources)?;
    Ok(ctx)
}

/// Lex every markup source into the context's document registry.
///
/// Resolves each document's plate too, so a missing or malformed plate
/// fails the run before anything is rendered.
pub fn lex_all(ctx: &mut BuildContext, sources: &[SourceFile]) -> Result<(), BuildError> {
    let output_dir = ctx.output_dir();
    let root = ctx.root.clone();

    let lexed: Vec<(Document, DependencyGraph)> = sources
        .par_iter()
        .filter(|source| source.kind == SourceKind::Markup)
        .map(|source| lex_source(&root, &output_dir, source))
        .collect::<Result<_, _>>()?;

    for (doc, graph) in lexed {
        ctx.graph.merge(graph);
        ctx.documents.insert(doc.id.clone(), doc);
    }

    for doc in ctx.documents.values_mut() {
        lexer::register_plate(doc, &ctx.plates, &mut ctx.graph)?;
        if doc.plate_name().is_none() && !ctx.config.style.is_empty() {
            let mut styles = ctx.config.style.clone();
            styles.append(&mut doc.styles);
            doc.styles = styles;
        }
    }
    debug!(documents = ctx.documents.len(), "lexed all documents");
    Ok(())
}

fn lex_source(
    root: &Path,
    output_dir: &Path,
    source: &SourceFile,
) -> Result<(Document, DependencyGraph), BuildError> {
    let path = root.join(&source.relative);
    let text = fs::read_to_string(&path).map_err(|source| BuildError::Read {
        path: path.clone(),
        source,
    })?;

    let mut doc = Document::new(&source.relative, path, output_dir);
    let mut graph = DependencyGraph::new();
    doc.stream = lexer::lex(&mut doc, &text, &mut graph)?;
    Ok((doc, graph))
}

fn take_snapshot(ctx: &BuildContext, sources: &[SourceFile]) -> Result<Snapshot, BuildError> {
    let outputs = scan::scan_outputs(&ctx.output_dir())?;
    let states = sources
        .iter()
        .map(|source| SourceState {
            id: source.id.clone(),
            kind: source.kind,
            modified: source.modified,
            output_modified: outputs.pages.get(&source.id).copied(),
            is_draft: ctx
                .documents
                .get(&source.id)
                .is_some_and(|doc| doc.is_draft),
        })
        .collect();

    Ok(Snapshot {
        sources: states,
        outputs: outputs.pages.keys().cloned().collect(),
        output_dirs: outputs.dirs,
        assets: scan::scan_assets(&ctx.data_dir())?,
        youngest_output: outputs.youngest,
        protected: ctx.config.include.clone(),
    })
}

fn render_selected(
    ctx: &mut BuildContext,
    selection: &Selection,
    report: &mut BuildReport,
) -> Result<(), BuildError> {
    let targets: Vec<&Document> = selection
        .render
        .iter()
        .filter_map(|id| ctx.documents.get(id))
        .collect();

    let shared: &BuildContext = ctx;
    let rendered: Vec<(String, String, Vec<Warning>)> = targets
        .par_iter()
        .map(|doc| -> Result<_, BuildError> {
            let mut renderer = Renderer::new(shared);
            let output = renderer.render_document(doc)?;
            if let Some(parent) = doc.output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&doc.output_path, &output.html)?;
            debug!(document = %doc.id, "rendered");
            Ok((doc.id.clone(), output.body, renderer.into_warnings()))
        })
        .collect::<Result<_, _>>()?;

    // Imports saw bodies through the context's cache during the run; the
    // registry gets them once the parallel pass is over.
    for (id, body, warnings) in rendered {
        for warning in warnings {
            ctx.warn(warning);
        }
        if let Some(doc) = ctx.documents.get_mut(&id) {
            doc.vars.insert(BODY_VAR.to_string(), body);
        }
        report.rendered.push(id);
    }
    Ok(())
}

fn copy_static(
    ctx: &BuildContext,
    sources: &[SourceFile],
    selection: &Selection,
    report: &mut BuildReport,
) -> Result<(), BuildError> {
    let output_dir = ctx.output_dir();
    for source in sources.iter().filter(|s| selection.copy.contains(&s.id)) {
        let target = output_dir.join(format!("{}.html", source.id));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(ctx.root.join(&source.relative), &target)?;
        report.copied.push(format!("{}.html", source.id));
    }
    Ok(())
}

fn delete_outputs(
    output_dir: &Path,
    selection: &Selection,
    report: &mut BuildReport,
) -> Result<(), BuildError> {
    for id in &selection.delete {
        let path = output_dir.join(format!("{id}.html"));
        if path.is_file() {
            fs::remove_file(&path)?;
            report.deleted.push(format!("{id}.html"));
        }
    }

    // Deepest first, so emptied parents can follow their children.
    let mut dirs: Vec<&String> = selection.delete_dirs.iter().collect();
    dirs.sort_by_key(|dir| std::cmp::Reverse(dir.matches('/').count()));
    for dir in dirs {
        let path = output_dir.join(dir);
        let is_empty = fs::read_dir(&path).is_ok_and(|mut entries| entries.next().is_none());
        if is_empty {
            fs::remove_dir(&path)?;
            report.deleted.push(format!("{dir}/"));
        }
    }
    Ok(())
}
