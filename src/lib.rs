//! # oko
//!
//! An incremental static site compiler. Every `.ø` source file is lexed into
//! a flat token stream, rendered through a *plate* (a named, inheritable set
//! of HTML fragments) and written as one HTML page at the same relative path.
//!
//! # Architecture: Linear Pipeline
//!
//! ```text
//! 1. Walk      project/        →  sources, outputs, auxiliary assets
//! 2. Lex       sources         →  documents + dependency graph   (parallel)
//! 3. Select    timestamps      →  documents to render, files to delete
//! 4. Render    selected docs   →  public/**/*.html                (parallel)
//! 5. Clean up  selection       →  orphaned outputs removed, includes copied
//! ```
//!
//! The lex phase completes and the dependency graph is frozen before
//! anything is rendered: a snippet with `parent.*` conditionals needs the
//! including document's variables, and selection needs the full graph.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`token`] | Token kinds with capability queries, token streams and cursors |
//! | [`lexer`] | Markup → token stream; fills the document and the dependency graph |
//! | [`document`] | Per-source document model, ID and URL derivation |
//! | [`deps`] | Reverse index from snippets/plates/functions/documents to dependents |
//! | [`plate`] | Plate records, inheritance, the built-in default plate |
//! | [`template`] | `${name}` placeholder substitution |
//! | [`inline`] | Inline emphasis, element IDs, HTML escaping |
//! | [`media`] | Video embeds, favicon, image prefixing, style/script tags, meta block |
//! | [`condition`] | `if` block predicates for the `project`, `page` and `parent` scopes |
//! | [`scripting`] | Pluggable custom functions, absent by default |
//! | [`render`] | Recursive renderer, snippet cache, HTML shell |
//! | [`select`] | Incremental build selection (pure) |
//! | [`scan`] | Filesystem walking and `include` copying |
//! | [`context`] | The per-run build context and warnings |
//! | [`build`] | The pipeline itself |
//! | [`sitemap`] | `sitemap.xml` |
//! | [`config`] | `_data/oko.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Errors and Warnings
//!
//! Configuration problems, malformed plates and structurally broken markup
//! abort the run. An unknown import or snippet, or a failing custom
//! function, only degrades the affected fragment to empty output; these are
//! collected as [`context::Warning`]s and printed once at the end.

pub mod build;
pub mod condition;
pub mod config;
pub mod context;
pub mod deps;
pub mod document;
pub mod inline;
pub mod lexer;
pub mod media;
pub mod output;
pub mod plate;
pub mod render;
pub mod scan;
pub mod scripting;
pub mod select;
pub mod sitemap;
pub mod template;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;
