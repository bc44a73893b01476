//! `${name}` placeholder substitution.
//!
//! Every fragment pattern, plate body and document shell goes through these
//! helpers. Substitution is a single left-to-right pass: inserted values are
//! never re-scanned, so a variable whose value contains `${x}` stays literal.

use crate::token::Vars;

/// Placeholder every wrapping fragment receives its inner HTML through.
pub const CONTENT: &str = "content";

/// What to do with a placeholder the lookup cannot resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// Leave `${name}` in place for a later pass.
    Keep,
    /// Remove it.
    Delete,
}

/// Replace every `${name}` in `source` with `lookup(name)`.
///
/// An opening `${` without a closing brace is copied through untouched.
pub fn substitute<F>(source: &str, mut lookup: F, unresolved: Unresolved) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    if !source.contains("${") {
        return source.to_string();
    }

    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None if unresolved == Unresolved::Keep => {
                out.push_str(&rest[start..start + 2 + end + 1]);
            }
            None => {}
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Substitute against a variable table.
pub fn substitute_vars(source: &str, vars: &Vars, unresolved: Unresolved) -> String {
    substitute(source, |name| vars.get(name).cloned(), unresolved)
}

/// Replace all occurrences of a single placeholder.
pub fn fill(source: &str, name: &str, value: &str) -> String {
    source.replace(&format!("${{{name}}}"), value)
}

/// Replace `${content}`.
pub fn fill_content(source: &str, value: &str) -> String {
    fill(source, CONTENT, value)
}

pub fn has_placeholder(source: &str, name: &str) -> bool {
    source.contains(&format!("${{{name}}}"))
}
