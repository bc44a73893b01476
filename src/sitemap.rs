//! `sitemap.xml` generation.
//!
//! Lists the canonical URL (`domain` + URL path) of every published
//! document, in ID order.

use crate::document::Document;
use crate::inline::escape_html;
use std::fs;
use std::path::Path;

pub const SITEMAP_FILE: &str = "sitemap.xml";

const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:xhtml="http://www.w3.org/1999/xhtml">"#;

/// Serialize the sitemap for `pages`.
pub fn render_sitemap<'a>(domain: &str, pages: impl IntoIterator<Item = &'a Document>) -> String {
    let domain = domain.trim_end_matches('/');
    let mut xml = String::from(HEADER);
    xml.push('\n');
    for page in pages {
        xml.push_str(&format!(
            "  <url><loc>{}</loc></url>\n",
            escape_html(&format!("{domain}{}", page.url_path))
        ));
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Write `sitemap.xml` into the output directory.
pub fn write_sitemap<'a>(
    output_dir: &Path,
    domain: &str,
    pages: impl IntoIterator<Item = &'a Document>,
) -> std::io::Result<()> {
    fs::create_dir_all(output_dir)?;
    fs::write(output_dir.join(SITEMAP_FILE), render_sitemap(domain, pages))
}
