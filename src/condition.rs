//! Predicates behind `if scope.name { ... }` blocks.

use crate::config::ProjectConfig;
use crate::document::Document;
use crate::token::{Condition, Scope};

/// Documents a condition can be evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Subjects<'a> {
    pub project: &'a ProjectConfig,
    /// The document whose token stream is being rendered.
    pub page: &'a Document,
    /// The document including `page`, when rendering a snippet.
    pub parent: Option<&'a Document>,
}

/// Evaluate a conditional block head.
///
/// A `parent` condition outside any including context is false, so its
/// negated form holds.
pub fn evaluate(condition: Condition, name: &str, subjects: Subjects<'_>) -> bool {
    let value = match condition.scope {
        Scope::Project => subjects.project.has_value(name),
        Scope::Page => document_value(subjects.page, name),
        Scope::Parent => subjects
            .parent
            .is_some_and(|parent| document_value(parent, name)),
    };
    value != condition.negated
}

/// `style` and `script` test the asset lists; any other name is true when
/// the variable exists and is not `"false"`.
pub fn document_value(doc: &Document, name: &str) -> bool {
    match name {
        "style" => !doc.styles.is_empty(),
        "script" => !doc.scripts.is_empty(),
        _ => doc.vars.get(name).is_some_and(|value| value != "false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(scope: Scope, negated: bool) -> Condition {
        Condition { scope, negated }
    }

    #[test]
    fn page_style_follows_asset_list() {
        let project = ProjectConfig::default();
        let mut page = Document::detached("p");
        let subjects = Subjects {
            project: &project,
            page: &page,
            parent: None,
        };
        assert!(!evaluate(cond(Scope::Page, false), "style", subjects));
        assert!(evaluate(cond(Scope::Page, true), "style", subjects));

        page.styles.push("/a.css".into());
        let subjects = Subjects {
            project: &project,
            page: &page,
            parent: None,
        };
        assert!(evaluate(cond(Scope::Page, false), "style", subjects));
        assert!(!evaluate(cond(Scope::Page, true), "style", subjects));
    }

    #[test]
    fn variable_false_string_is_false() {
        let mut doc = Document::detached("p");
        doc.vars.insert("toc".into(), "false".into());
        doc.vars.insert("wide".into(), "yes".into());
        assert!(!document_value(&doc, "toc"));
        assert!(document_value(&doc, "wide"));
        assert!(!document_value(&doc, "missing"));
    }

    #[test]
    fn parent_scope_reads_including_document() {
        let project = ProjectConfig::default();
        let snippet = Document::detached("snippet");
        let mut parent = Document::detached("page");
        parent.vars.insert("title".into(), "Home".into());

        let with_parent = Subjects {
            project: &project,
            page: &snippet,
            parent: Some(&parent),
        };
        assert!(evaluate(cond(Scope::Parent, false), "title", with_parent));
        assert!(!evaluate(cond(Scope::Page, false), "title", with_parent));

        let orphan = Subjects {
            project: &project,
            page: &snippet,
            parent: None,
        };
        assert!(!evaluate(cond(Scope::Parent, false), "title", orphan));
        assert!(evaluate(cond(Scope::Parent, true), "title", orphan));
    }

    #[test]
    fn project_scope_uses_config_fields() {
        let project = ProjectConfig {
            domain: "https://a.org".into(),
            ..ProjectConfig::default()
        };
        let page = Document::detached("p");
        let subjects = Subjects {
            project: &project,
            page: &page,
            parent: None,
        };
        assert!(evaluate(cond(Scope::Project, false), "domain", subjects));
        assert!(evaluate(cond(Scope::Project, true), "favicon", subjects));
    }
}
