//! Inline text utilities: emphasis markup, de-formatting, element IDs and
//! HTML escaping.

use maud::{PreEscaped, html};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Every inline form in one alternation, so one pass sees each span once and
/// generated markup is never rescanned.
static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\[(?P<text>.+?)\]\((?P<url>.+?)\)",
        r"|\*(?P<bold>.+?)\*",
        r"|_(?P<italic>.+?)_",
        r"|~(?P<strike>.+?)~",
        r"|`(?P<code>.+?)`",
    ))
    .expect("valid inline pattern")
});

/// Apply inline emphasis: `[text](url)`, `*bold*`, `_italic_`, `~strike~`, `` `code` ``.
///
/// Link text and emphasis nest; code spans and URLs are taken literally.
pub fn inlines(text: &str) -> String {
    INLINE
        .replace_all(text, |caps: &Captures<'_>| {
            if let (Some(label), Some(url)) = (caps.name("text"), caps.name("url")) {
                let label = inlines(label.as_str());
                return html! { a href=(url.as_str()) { (PreEscaped(label)) } }.into_string();
            }
            if let Some(code) = caps.name("code") {
                return format!("<code>{}</code>", code.as_str());
            }
            let emphasis = [("b", "bold"), ("i", "italic"), ("s", "strike")]
                .into_iter()
                .find_map(|(tag, group)| caps.name(group).map(|m| (tag, m.as_str())));
            match emphasis {
                Some((tag, inner)) => format!("<{tag}>{}</{tag}>", inlines(inner)),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Remove inline emphasis markers, keeping the visible text.
pub fn strip_inlines(text: &str) -> String {
    INLINE
        .replace_all(text, |caps: &Captures<'_>| {
            let visible = ["text", "bold", "italic", "strike"]
                .into_iter()
                .find_map(|group| caps.name(group));
            match (visible, caps.name("code")) {
                (Some(m), _) => strip_inlines(m.as_str()),
                (None, Some(code)) => code.as_str().to_string(),
                (None, None) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Turn heading text into an `id` attribute value.
///
/// Letters and digits are kept (lowercased), whitespace and dashes become
/// `-`, everything else is dropped.
pub fn element_id(text: &str) -> String {
    let mut id = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            id.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            id.push('-');
        }
    }
    id
}

/// Escape text for HTML content or a quoted attribute value.
pub fn escape_html(text: &str) -> String {
    html! { (text) }.into_string()
}
