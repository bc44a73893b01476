//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Documents
//! 001 blog/draft [draft]
//!     Source: blog/draft.ø
//! 002 index (Home)
//!     Source: index.ø
//!     Plate: page
//!
//! 2 documents, 3 dependencies
//! ```
//!
//! ## Build
//!
//! ```text
//! Updated
//!     index → index.html
//!     blog/first → blog/first.html
//! Copied
//!     robots.txt
//! Deleted
//!     old/page.html
//!
//! 2 rendered, 1 copied, 1 deleted
//!
//! Warnings (1)
//!     blog/first L4: no such snippet "nav"
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::build::BuildReport;
use crate::context::{BuildContext, Warning};
use crate::deps::DependencyGraph;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

fn dependency_count(graph: &DependencyGraph) -> usize {
    graph.keys().map(|key| graph.dependents(key).count()).sum()
}

// ============================================================================
// Check
// ============================================================================

/// Format the document inventory found by `oko check`.
pub fn format_check_output(ctx: &BuildContext) -> Vec<String> {
    let mut lines = vec!["Documents".to_string()];

    for (i, doc) in ctx.documents.values().enumerate() {
        let mut header = format!("{} {}", format_index(i + 1), doc.id);
        if !doc.title().is_empty() {
            header.push_str(&format!(" ({})", doc.title()));
        }
        if doc.is_draft {
            header.push_str(" [draft]");
        }
        lines.push(header);

        let source = doc
            .source_path
            .strip_prefix(&ctx.root)
            .unwrap_or(&doc.source_path);
        lines.push(format!("{}Source: {}", indent(1), source.display()));
        if let Some(plate) = doc.plate_name() {
            lines.push(format!("{}Plate: {}", indent(1), plate));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{}, {}",
        plural(ctx.documents.len(), "document", "documents"),
        plural(dependency_count(&ctx.graph), "dependency", "dependencies")
    ));
    lines
}

pub fn print_check_output(ctx: &BuildContext) {
    for line in format_check_output(ctx) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format what a build changed, relative to `output_dir` for display.
pub fn format_build_output(report: &BuildReport, output_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    if report.is_noop() {
        lines.push(format!("Nothing to do, {} is up to date", output_dir.display()));
    } else {
        if !report.rendered.is_empty() {
            lines.push("Updated".to_string());
            for id in &report.rendered {
                lines.push(format!("{}{} → {}.html", indent(1), id, id));
            }
        }
        if !report.copied.is_empty() {
            lines.push("Copied".to_string());
            lines.extend(report.copied.iter().map(|p| format!("{}{}", indent(1), p)));
        }
        if !report.deleted.is_empty() {
            lines.push("Deleted".to_string());
            lines.extend(report.deleted.iter().map(|p| format!("{}{}", indent(1), p)));
        }
        lines.push(String::new());
        lines.push(format!(
            "{} rendered, {} copied, {} deleted",
            report.rendered.len(),
            report.copied.len(),
            report.deleted.len()
        ));
    }

    if report.sitemap_written {
        lines.push(format!("Sitemap: {}", output_dir.join("sitemap.xml").display()));
    }
    lines.extend(format_warnings(&report.warnings));
    lines
}

pub fn print_build_output(report: &BuildReport, output_dir: &Path) {
    for line in format_build_output(report, output_dir) {
        println!("{}", line);
    }
}

/// The end-of-run warnings summary. Empty when there are none.
pub fn format_warnings(warnings: &[Warning]) -> Vec<String> {
    if warnings.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![String::new(), format!("Warnings ({})", warnings.len())];
    lines.extend(warnings.iter().map(|w| format!("{}{}", indent(1), w)));
    lines
}

// ============================================================================
// Tests
// ============================================================================
