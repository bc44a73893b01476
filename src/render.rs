//! Recursive renderer: token stream + plate → HTML.
//!
//! [`Renderer::render_document`] walks a document's stream with a fresh
//! cursor, recursing on every block-opening token, wraps the result with the
//! plate's snippet injections and body fragment, runs the final `${var}`
//! pass against the document's variables and emits the HTML shell.
//!
//! Snippets are lexed lazily the first time they are referenced and kept in
//! the [`SnippetCache`]. A snippet without `parent.*` conditionals renders
//! the same everywhere, so its output is memoized; one with them is
//! re-walked for every including document, which is passed down as the
//! `parent` of the render frame.

use crate::condition::{self, Subjects};
use crate::config::DATA_DIR;
use crate::context::{BuildContext, Warning};
use crate::deps::DependencyGraph;
use crate::document::{BODY_VAR, Document};
use crate::inline::{element_id, escape_html, inlines, strip_inlines};
use crate::lexer::{self, LexError};
use crate::media;
use crate::plate::{Plate, PlateError, default_plate};
use crate::scripting::FunctionInput;
use crate::template::{CONTENT, Unresolved, fill, fill_content, has_placeholder, substitute_vars};
use crate::token::{Cursor, Token, TokenKind, Vars};
use maud::{DOCTYPE, PreEscaped, html};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use thiserror::Error;
use tracing::debug;

pub const SNIPPETS_DIR: &str = "snippets";
/// Markup extension used by snippets and documents.
pub const MARKUP_EXT: &str = "ø";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Plate(#[from] PlateError),
    #[error("failed to read snippet \"{name}\": {source}")]
    Snippet {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{document} L{line}: {message}")]
    Structural {
        document: String,
        line: usize,
        message: String,
    },
}

// ============================================================================
// Snippet cache
// ============================================================================

/// A lexed snippet and, once rendered, its output if the stream is cacheable.
#[derive(Debug)]
pub struct Snippet {
    pub doc: Document,
    rendered: OnceLock<String>,
}

/// Lazily lexed snippets from `_data/snippets/`, memoized by name.
#[derive(Debug)]
pub struct SnippetCache {
    dir: PathBuf,
    entries: Mutex<HashMap<String, Arc<Snippet>>>,
}

impl SnippetCache {
    pub fn new(project_root: &Path) -> Self {
        Self {
            dir: project_root.join(DATA_DIR).join(SNIPPETS_DIR),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn snippet_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{MARKUP_EXT}"))
    }

    /// Fetch a snippet, lexing it on first use. `None` if it does not exist.
    pub fn load(&self, name: &str) -> Result<Option<Arc<Snippet>>, RenderError> {
        if let Some(snippet) = self.lock().get(name) {
            return Ok(Some(Arc::clone(snippet)));
        }

        let path = self.snippet_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        let source = fs::read_to_string(&path).map_err(|source| RenderError::Snippet {
            name: name.to_string(),
            source,
        })?;

        let mut doc = Document::detached(format!("snippet:{name}"));
        doc.source_path = path;
        doc.stream = lexer::lex(&mut doc, &source, &mut DependencyGraph::new())?;
        debug!(snippet = name, cacheable = doc.stream.cacheable, "lexed snippet");

        let snippet = Arc::new(Snippet {
            doc,
            rendered: OnceLock::new(),
        });
        let mut entries = self.lock();
        Ok(Some(Arc::clone(
            entries.entry(name.to_string()).or_insert(snippet),
        )))
    }

    /// Memoized output of a snippet, if it has been rendered and is cacheable.
    pub fn rendered(&self, name: &str) -> Option<String> {
        self.lock().get(name)?.rendered.get().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Snippet>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Body cache
// ============================================================================

/// Rendered bodies by document ID, published as documents finish rendering
/// so imports that use `${body}` can reuse them.
#[derive(Debug, Default)]
pub struct BodyCache {
    entries: Mutex<HashMap<String, String>>,
}

impl BodyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.lock().get(id).cloned()
    }

    /// Record a document's body. The first writer wins.
    pub fn publish(&self, id: &str, body: &str) {
        self.lock()
            .entry(id.to_string())
            .or_insert_with(|| body.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Output of rendering one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    /// The complete HTML file.
    pub html: String,
    /// The rendered body, also published to the context's [`BodyCache`].
    pub body: String,
}

/// The document being walked and what it is rendered against.
#[derive(Clone, Copy)]
struct Frame<'a> {
    page: &'a Document,
    parent: Option<&'a Document>,
    plate: &'a Plate,
}

pub struct Renderer<'a> {
    ctx: &'a BuildContext,
    warnings: Vec<Warning>,
    /// Snippets currently being rendered, innermost last.
    active_snippets: Vec<String>,
    /// Documents whose bodies are being rendered, outermost first.
    active_imports: Vec<String>,
}

impl<'a> Renderer<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self {
            ctx,
            warnings: Vec::new(),
            active_snippets: Vec::new(),
            active_imports: Vec::new(),
        }
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    /// Render a full HTML document.
    pub fn render_document(&mut self, doc: &Document) -> Result<Rendered, RenderError> {
        self.active_imports.push(doc.id.clone());
        let result = self.document_body(doc);
        self.active_imports.pop();
        let (plate, body) = result?;

        self.ctx.bodies.publish(&doc.id, &body);
        let html = self.shell(doc, &plate, &body);
        Ok(Rendered { html, body })
    }

    /// The plate and fully substituted body of a top-level document.
    fn document_body(&mut self, doc: &Document) -> Result<(Arc<Plate>, String), RenderError> {
        let plate = self.plate_for(doc)?;
        let body = self.render_body(doc, None, &plate)?;
        let body = substitute_vars(&body, &self.substitution_vars(doc), Unresolved::Delete);
        Ok((plate, body))
    }

    fn plate_for(&self, doc: &Document) -> Result<Arc<Plate>, PlateError> {
        match doc.plate_name() {
            Some(name) => self.ctx.plates.get(name),
            None => Ok(Arc::new(default_plate().clone())),
        }
    }

    /// Snippet injections around the body fragment around the token stream.
    fn render_body(
        &mut self,
        doc: &Document,
        parent: Option<&Document>,
        plate: &Plate,
    ) -> Result<String, RenderError> {
        let frame = Frame {
            page: doc,
            parent,
            plate,
        };

        let mut inner = String::new();
        for name in &plate.body_before {
            inner.push_str(&self.snippet(name, doc, None)?);
        }
        let mut cursor = doc.stream.cursor();
        inner.push_str(&self.render_block(frame, &mut cursor, None)?);
        for name in &plate.body_after {
            inner.push_str(&self.snippet(name, doc, None)?);
        }

        let mut body = String::new();
        for name in &plate.snippet_before {
            body.push_str(&self.snippet(name, doc, None)?);
        }
        body.push_str(&wrap(plate.fragment("body"), &inner));
        for name in &plate.snippet_after {
            body.push_str(&self.snippet(name, doc, None)?);
        }
        Ok(body)
    }

    /// Render tokens until the close of `block`, or to the end of the stream
    /// at top level.
    fn render_block(
        &mut self,
        frame: Frame<'_>,
        cursor: &mut Cursor<'_>,
        block: Option<&Token>,
    ) -> Result<String, RenderError> {
        let mut out = String::new();

        while let Some(token) = cursor.next() {
            match token.kind {
                TokenKind::BlockClose => {
                    if block.is_none() {
                        return Err(structural(frame.page, token.line, "'}' without an open block"));
                    }
                    return Ok(out);
                }
                TokenKind::Conditional(condition) => {
                    let subjects = Subjects {
                        project: &self.ctx.config,
                        page: frame.page,
                        parent: frame.parent,
                    };
                    if condition::evaluate(condition, &token.text, subjects) {
                        let inner = self.render_block(frame, cursor, Some(token))?;
                        out.push_str(&apply_block_vars(&inner, token));
                    } else {
                        skip_block(cursor);
                    }
                }
                TokenKind::BlockOpen => {
                    let inner = self.render_block(frame, cursor, Some(token))?;
                    let wrapped = wrap(frame.plate.fragment(&token.text), &inner);
                    out.push_str(&apply_block_vars(&wrapped, token));
                }
                TokenKind::ListEntry => out.push_str(&list_run(frame.plate, token, cursor)),
                TokenKind::Snippet => {
                    out.push_str(&self.snippet(&token.text, frame.page, Some(token.line))?);
                }
                TokenKind::Import => out.push_str(&self.import(frame, token)?),
                TokenKind::Function => out.push_str(&self.function(frame, token)),
                TokenKind::Html => out.push_str(&token.text),
                TokenKind::Code => {
                    let content = cursor
                        .next()
                        .filter(|t| t.kind == TokenKind::CodeContent)
                        .ok_or_else(|| structural(frame.page, token.line, "code block without content"))?;
                    out.push_str(&code(frame.plate, &token.text, &content.text));
                }
                TokenKind::CodeContent => {
                    return Err(structural(frame.page, token.line, "code content outside a code block"));
                }
                TokenKind::Media => out.push_str(&self.media(frame, token)),
                _ => out.push_str(&self.leaf(frame, token)),
            }
        }

        match block {
            Some(open) => Err(structural(
                frame.page,
                open.line,
                format!("unclosed block \"{}\"", open.text),
            )),
            None => Ok(out),
        }
    }

    fn leaf(&mut self, frame: Frame<'_>, token: &Token) -> String {
        let name = token.kind.fragment_name();
        let Some(fragment) = frame.plate.fragment(name) else {
            self.warn(frame.page, Some(token.line), format!("no fragment for \"{name}\""));
            return String::new();
        };

        let text = match token.kind {
            TokenKind::Image => {
                media::prefix_image(&token.text, &self.ctx.config.image_path_prefix)
            }
            kind if kind.is_inline_formatted() => inlines(&token.text),
            _ => token.text.clone(),
        };

        if token.kind.is_heading() {
            let id = element_id(&strip_inlines(&token.text));
            fill_content(&fill(fragment, "id", &id), &text)
        } else {
            fill_content(fragment, &text)
        }
    }

    /// `+ <id> <slot?>`: the slot fragment of the current plate, filled with
    /// the referenced document's variables and its rendered `body`.
    fn import(&mut self, frame: Frame<'_>, token: &Token) -> Result<String, RenderError> {
        let mut parts = token.text.splitn(2, char::is_whitespace);
        let target = parts.next().unwrap_or_default();
        let slot = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("import");

        let ctx = self.ctx;
        let Some(imported) = ctx.documents.get(target) else {
            self.warn(
                frame.page,
                Some(token.line),
                format!("no such document to import \"{target}\""),
            );
            return Ok(String::new());
        };
        let Some(fragment) = frame.plate.fragment(slot) else {
            self.warn(
                frame.page,
                Some(token.line),
                format!("no fragment \"{slot}\" to import \"{target}\" with"),
            );
            return Ok(String::new());
        };
        if !has_placeholder(fragment, BODY_VAR) {
            return Ok(substitute_vars(fragment, &imported.vars, Unresolved::Delete));
        }

        let body = self.imported_body(frame.page, imported, token.line)?;
        let mut vars = imported.vars.clone();
        vars.insert(BODY_VAR.to_string(), body);
        Ok(substitute_vars(fragment, &vars, Unresolved::Delete))
    }

    /// Body of an imported document: the published one if its own render
    /// already finished, otherwise rendered here.
    fn imported_body(
        &mut self,
        including: &Document,
        imported: &Document,
        line: usize,
    ) -> Result<String, RenderError> {
        if let Some(body) = self.ctx.bodies.get(&imported.id) {
            return Ok(body);
        }
        if self.active_imports.contains(&imported.id) {
            self.warn(
                including,
                Some(line),
                format!("import of \"{}\" needs its own body", imported.id),
            );
            return Ok(String::new());
        }

        let mut nested = Renderer::new(self.ctx);
        nested.active_imports = self.active_imports.clone();
        nested.active_imports.push(imported.id.clone());
        let result = nested.document_body(imported);
        self.warnings.append(&mut nested.warnings);
        let (_, body) = result?;
        Ok(body)
    }

    fn function(&mut self, frame: Frame<'_>, token: &Token) -> String {
        let input = FunctionInput {
            document_id: &frame.page.id,
            vars: &frame.page.vars,
            tokens: frame.page.stream.tokens(),
        };
        match self.ctx.functions.call(&token.text, input) {
            Ok(fragment) => fragment,
            Err(err) => {
                self.warn(frame.page, Some(token.line), err.to_string());
                String::new()
            }
        }
    }

    fn media(&mut self, frame: Frame<'_>, token: &Token) -> String {
        match media::video_embed(&token.text) {
            Ok(embed) => wrap(frame.plate.fragments.get("video").map(String::as_str), &embed),
            Err(message) => {
                self.warn(frame.page, Some(token.line), message);
                String::new()
            }
        }
    }

    fn snippet(
        &mut self,
        name: &str,
        including: &Document,
        line: Option<usize>,
    ) -> Result<String, RenderError> {
        if self.active_snippets.iter().any(|active| active == name) {
            self.warn(including, line, format!("snippet \"{name}\" includes itself"));
            return Ok(String::new());
        }
        let Some(snippet) = self.ctx.snippets.load(name)? else {
            self.warn(including, line, format!("no such snippet \"{name}\""));
            return Ok(String::new());
        };
        if snippet.doc.is_draft {
            return Ok(String::new());
        }
        if let Some(cached) = snippet.rendered.get() {
            return Ok(cached.clone());
        }

        self.active_snippets.push(name.to_string());
        let result = self.render_snippet(&snippet.doc, including);
        self.active_snippets.pop();
        let html = result?;

        if snippet.doc.stream.cacheable {
            let _ = snippet.rendered.set(html.clone());
        }
        Ok(html)
    }

    /// Snippets keep unresolved placeholders so the including document's
    /// final pass can fill them.
    fn render_snippet(&mut self, doc: &Document, parent: &Document) -> Result<String, RenderError> {
        let plate = self.plate_for(doc)?;
        let body = self.render_body(doc, Some(parent), &plate)?;
        Ok(substitute_vars(&body, &doc.vars, Unresolved::Keep))
    }

    /// Document variables with image-like values prefixed.
    fn substitution_vars(&self, doc: &Document) -> Vars {
        let prefix = &self.ctx.config.image_path_prefix;
        doc.vars
            .iter()
            .map(|(key, value)| {
                let value = if !prefix.is_empty() && key.contains("image") {
                    media::prefix_image(value, prefix)
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }

    fn shell(&self, doc: &Document, plate: &Plate, body: &str) -> String {
        let config = &self.ctx.config;
        let title = if doc.title().is_empty() {
            config.title.as_str()
        } else {
            doc.title()
        };

        let favicon = doc
            .vars
            .get("favicon")
            .filter(|f| !f.is_empty())
            .unwrap_or(&config.favicon);
        let favicon = media::favicon_tag(favicon);

        // Plate-less documents already carry the project styles in their own list.
        let inherited_styles = if doc.plate_name().is_some() {
            media::render_styles(&plate.style, media::render_styles(&config.style, html! {}))
        } else {
            html! {}
        };
        let styles = media::render_styles(&doc.styles, inherited_styles);
        let scripts = media::render_scripts(&doc.scripts, media::render_scripts(&plate.script, html! {}));
        let meta = media::meta_block(&doc.meta, title, &doc.url_path, config);

        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="utf-8";
                    title { (title) }
                    @if let Some(favicon) = favicon {
                        (favicon)
                    }
                    (styles)
                    (meta)
                }
                body {
                    (PreEscaped(body))
                    (scripts)
                }
            }
        }
        .into_string()
    }

    fn warn(&mut self, doc: &Document, line: Option<usize>, message: impl Into<String>) {
        let warning = Warning::new(&doc.id, line, message);
        debug!(%warning, "render warning");
        self.warnings.push(warning);
    }
}

/// Wrap `inner` in a fragment. No fragment (or an empty one) means no wrapper;
/// a fragment without `${content}` is emitted before `inner`.
fn wrap(fragment: Option<&str>, inner: &str) -> String {
    match fragment {
        None | Some("") => inner.to_string(),
        Some(f) if has_placeholder(f, CONTENT) => fill_content(f, inner),
        Some(f) => format!("{f}{inner}"),
    }
}

fn apply_block_vars(text: &str, token: &Token) -> String {
    match &token.vars {
        Some(vars) if !vars.is_empty() => substitute_vars(text, vars, Unresolved::Keep),
        _ => text.to_string(),
    }
}

/// Advance past the close of the block whose opening token was just read.
fn skip_block(cursor: &mut Cursor<'_>) {
    let mut depth = 1usize;
    while let Some(token) = cursor.next() {
        if token.kind.opens_block() {
            depth += 1;
        } else if token.kind == TokenKind::BlockClose {
            depth -= 1;
            if depth == 0 {
                return;
            }
        }
    }
}

/// Consecutive list entries, each in the `list` fragment, all in one `ul`.
fn list_run(plate: &Plate, first: &Token, cursor: &mut Cursor<'_>) -> String {
    let item = plate.fragment("list").unwrap_or("${content}");
    let mut items = fill_content(item, &inlines(&first.text));
    while let Some(entry) = cursor.peek().filter(|t| t.kind == TokenKind::ListEntry) {
        cursor.next();
        items.push_str(&fill_content(item, &inlines(&entry.text)));
    }
    wrap(plate.fragment("ul"), &items)
}

fn code(plate: &Plate, lang: &str, content: &str) -> String {
    let fragment = plate.fragment("code").unwrap_or("${content}");
    fill_content(&fill(fragment, "lang", lang), &escape_html(content))
}

fn structural(doc: &Document, line: usize, message: impl Into<String>) -> RenderError {
    RenderError::Structural {
        document: doc.id.clone(),
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::scripting::FunctionError;
    use tempfile::TempDir;

    fn context(files: &[(&str, &str)]) -> (TempDir, BuildContext) {
        let tmp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = tmp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let config = ProjectConfig {
            domain: "https://a.org".into(),
            ..ProjectConfig::default()
        };
        let ctx = BuildContext::new(tmp.path(), config);
        (tmp, ctx)
    }

    fn add_doc(ctx: &mut BuildContext, id: &str, source: &str) {
        let relative = PathBuf::from(format!("{id}.ø"));
        let mut doc = Document::new(&relative, ctx.root.join(&relative), &ctx.output_dir());
        doc.stream = lexer::lex(&mut doc, source, &mut ctx.graph).unwrap();
        ctx.documents.insert(doc.id.clone(), doc);
    }

    fn render(ctx: &BuildContext, id: &str) -> (Rendered, Vec<Warning>) {
        let mut renderer = Renderer::new(ctx);
        let rendered = renderer.render_document(&ctx.documents[id]).unwrap();
        (rendered, renderer.into_warnings())
    }

    fn body(ctx: &BuildContext, id: &str) -> String {
        render(ctx, id).0.body
    }

    // =========================================================================
    // Leaves and runs
    // =========================================================================

    #[test]
    fn heading_then_paragraph() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "# Hello\n.World");
        assert_eq!(body(&ctx, "index"), "<h1 id=\"hello\">Hello</h1><p>World</p>");
    }

    #[test]
    fn heading_id_ignores_emphasis() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "## *Big* news");
        assert_eq!(
            body(&ctx, "index"),
            "<h2 id=\"big-news\"><b>Big</b> news</h2>"
        );
    }

    #[test]
    fn list_entries_group_into_one_list() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "- one\n- _two_\n. after\n- three");
        assert_eq!(
            body(&ctx, "index"),
            "<ul><li>one</li><li><i>two</i></li></ul><p>after</p><ul><li>three</li></ul>"
        );
    }

    #[test]
    fn raw_html_is_verbatim() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "* <div>*not bold*</div>");
        assert_eq!(body(&ctx, "index"), "<div>*not bold*</div>");
    }

    #[test]
    fn code_is_escaped() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "code html {\n<b>x</b>\n}");
        assert_eq!(
            body(&ctx, "index"),
            "<pre><code>&lt;b&gt;x&lt;/b&gt;</code></pre>"
        );
    }

    #[test]
    fn image_gets_prefix() {
        let (_tmp, mut ctx) = context(&[]);
        ctx.config.image_path_prefix = "/media/".into();
        add_doc(&mut ctx, "index", "% cat.png\n% https://x.org/dog.png");
        assert_eq!(
            body(&ctx, "index"),
            "<img src=\"/media/cat.png\"><img src=\"https://x.org/dog.png\">"
        );
    }

    #[test]
    fn media_renders_embed() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "@ 12345 16:9");
        let html = body(&ctx, "index");
        assert!(html.contains("player.vimeo.com/video/12345"));
        assert!(html.contains("padding-top: 56.25%"));
    }

    // =========================================================================
    // Blocks and conditionals
    // =========================================================================

    #[test]
    fn generic_block_uses_plate_fragment_and_block_vars() {
        let (_tmp, mut ctx) = context(&[(
            "_data/plates/cards.json",
            r#"{"fragments": {"card": "<div class='${color}'>${content}</div>"}}"#,
        )]);
        add_doc(&mut ctx, "index", "plate: cards\ncard {\ncolor: red\n. hi\n}\nloose {\n. bare\n}");
        assert_eq!(
            body(&ctx, "index"),
            "<div class='red'><p>hi</p></div><p>bare</p>"
        );
    }

    #[test]
    fn page_style_conditional() {
        let source = "if page.style {\n. styled\n}\nif !page.style {\n. plain\n}";
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "plain", source);
        add_doc(&mut ctx, "styled", &format!("style: /a.css\n{source}"));
        assert_eq!(body(&ctx, "plain"), "<p>plain</p>");
        assert_eq!(body(&ctx, "styled"), "<p>styled</p>");
    }

    #[test]
    fn false_conditional_skips_nested_blocks() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(
            &mut ctx,
            "index",
            "if page.missing {\nbox {\nif page.x {\n. deep\n}\n}\n. hidden\n}\n. shown",
        );
        assert_eq!(body(&ctx, "index"), "<p>shown</p>");
    }

    #[test]
    fn project_conditional() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "if project.domain {\n. yes\n}\nif project.favicon {\n. no\n}");
        assert_eq!(body(&ctx, "index"), "<p>yes</p>");
    }

    // =========================================================================
    // Imports
    // =========================================================================

    #[test]
    fn import_fills_fragment_from_referenced_document() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "about", "title: About us");
        add_doc(&mut ctx, "index", "+ about");
        let (rendered, warnings) = render(&ctx, "index");
        assert_eq!(rendered.body, "<a href=\"/about\">About us</a>");
        assert!(warnings.is_empty());
    }

    #[test]
    fn import_sees_rendered_body() {
        let (_tmp, mut ctx) = context(&[(
            "_data/plates/t.json",
            r#"{"fragments": {"teaser": "<div>${body}</div>"}}"#,
        )]);
        add_doc(&mut ctx, "a", ". hello _you_");
        add_doc(&mut ctx, "b", "plate: t\n+ a teaser");
        let (rendered, warnings) = render(&ctx, "b");
        assert_eq!(rendered.body, "<div><p>hello <i>you</i></p></div>");
        assert!(warnings.is_empty());
    }

    #[test]
    fn import_reuses_published_body() {
        let (_tmp, mut ctx) = context(&[(
            "_data/plates/t.json",
            r#"{"fragments": {"teaser": "<div>${body}</div>"}}"#,
        )]);
        add_doc(&mut ctx, "a", ". fresh");
        add_doc(&mut ctx, "b", "plate: t\n+ a teaser");
        ctx.bodies.publish("a", "<p>cached</p>");
        assert_eq!(body(&ctx, "b"), "<div><p>cached</p></div>");
    }

    #[test]
    fn rendering_publishes_body() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "a", ". text");
        render(&ctx, "a");
        assert_eq!(ctx.bodies.get("a").as_deref(), Some("<p>text</p>"));
    }

    #[test]
    fn mutual_body_imports_warn() {
        let (_tmp, mut ctx) = context(&[(
            "_data/plates/t.json",
            r#"{"fragments": {"teaser": "<div>${body}</div>"}}"#,
        )]);
        add_doc(&mut ctx, "a", "plate: t\n+ b teaser");
        add_doc(&mut ctx, "b", "plate: t\n+ a teaser");
        let (rendered, warnings) = render(&ctx, "a");
        assert_eq!(rendered.body, "<div><div></div></div>");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "b");
        assert!(warnings[0].message.contains("needs its own body"));
    }

    #[test]
    fn missing_import_warns_once() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", ". a\n+ otherid\n. b");
        let (rendered, warnings) = render(&ctx, "index");
        assert_eq!(rendered.body, "<p>a</p><p>b</p>");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("otherid"));
        assert_eq!(warnings[0].line, Some(2));
    }

    #[test]
    fn import_with_unknown_slot_warns() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "about", "title: About");
        add_doc(&mut ctx, "index", "+ about teaser");
        let (rendered, warnings) = render(&ctx, "index");
        assert!(rendered.body.is_empty());
        assert!(warnings[0].message.contains("teaser"));
    }

    // =========================================================================
    // Snippets
    // =========================================================================

    #[test]
    fn cacheable_snippet_is_memoized() {
        let (_tmp, mut ctx) = context(&[("_data/snippets/nav.ø", ". nav")]);
        add_doc(&mut ctx, "index", "> nav\n. body");
        assert_eq!(body(&ctx, "index"), "<p>nav</p><p>body</p>");
        assert_eq!(ctx.snippets.rendered("nav").as_deref(), Some("<p>nav</p>"));
    }

    #[test]
    fn parent_conditional_follows_including_document() {
        let (_tmp, mut ctx) = context(&[(
            "_data/snippets/greet.ø",
            "if parent.title {\n. titled\n}\nif !parent.title {\n. untitled\n}",
        )]);
        add_doc(&mut ctx, "a", "title: A\n> greet");
        add_doc(&mut ctx, "b", "> greet");
        assert_eq!(body(&ctx, "a"), "<p>titled</p>");
        assert_eq!(body(&ctx, "b"), "<p>untitled</p>");
        assert_eq!(ctx.snippets.rendered("greet"), None);
    }

    #[test]
    fn snippet_placeholders_resolve_against_page() {
        let (_tmp, mut ctx) = context(&[("_data/snippets/hello.ø", "who: snippet\n. ${who} / ${title}")]);
        add_doc(&mut ctx, "index", "title: Page\n> hello");
        assert_eq!(body(&ctx, "index"), "<p>snippet / Page</p>");
    }

    #[test]
    fn missing_snippet_warns() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "> ghost");
        let (rendered, warnings) = render(&ctx, "index");
        assert!(rendered.body.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("ghost"));
    }

    #[test]
    fn draft_snippet_renders_empty() {
        let (_tmp, mut ctx) = context(&[("_data/snippets/wip.ø", "draft: true\n. secret")]);
        add_doc(&mut ctx, "index", "> wip");
        assert_eq!(body(&ctx, "index"), "");
    }

    #[test]
    fn snippet_cycle_is_cut() {
        let (_tmp, mut ctx) = context(&[
            ("_data/snippets/a.ø", ". a\n> b"),
            ("_data/snippets/b.ø", ". b\n> a"),
        ]);
        add_doc(&mut ctx, "index", "> a");
        let (rendered, warnings) = render(&ctx, "index");
        assert_eq!(rendered.body, "<p>a</p><p>b</p>");
        assert!(warnings.iter().any(|w| w.message.contains("includes itself")));
    }

    #[test]
    fn malformed_snippet_is_fatal() {
        let (_tmp, mut ctx) = context(&[("_data/snippets/bad.ø", "box {\n. open")]);
        add_doc(&mut ctx, "index", "> bad");
        let mut renderer = Renderer::new(&ctx);
        let err = renderer.render_document(&ctx.documents["index"]).unwrap_err();
        assert!(matches!(err, RenderError::Lex(_)));
    }

    // =========================================================================
    // Plates
    // =========================================================================

    #[test]
    fn plate_injections_wrap_body() {
        let (_tmp, mut ctx) = context(&[
            (
                "_data/plates/post.json",
                r#"{"snippet_before": ["top"], "body_before": ["lead"], "snippet_after": ["end"],
                    "fragments": {"body": "<main>${content}</main>"}}"#,
            ),
            ("_data/snippets/top.ø", ". T"),
            ("_data/snippets/lead.ø", ". L"),
            ("_data/snippets/end.ø", ". E"),
        ]);
        add_doc(&mut ctx, "index", "plate: post\n. x");
        assert_eq!(
            body(&ctx, "index"),
            "<p>T</p><main><p>L</p><p>x</p></main><p>E</p>"
        );
    }

    #[test]
    fn missing_plate_is_fatal() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "plate: ghost\n. x");
        let mut renderer = Renderer::new(&ctx);
        assert!(matches!(
            renderer.render_document(&ctx.documents["index"]),
            Err(RenderError::Plate(_))
        ));
    }

    // =========================================================================
    // Functions
    // =========================================================================

    #[test]
    fn functions_unavailable_by_default() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "ø toc\n. after");
        let (rendered, warnings) = render(&ctx, "index");
        assert_eq!(rendered.body, "<p>after</p>");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn custom_function_runner() {
        let (_tmp, ctx) = context(&[]);
        let mut ctx = ctx.with_functions(|name: &str, input: FunctionInput<'_>| {
            if name == "count" {
                Ok(format!("<p>{} tokens</p>", input.tokens.len()))
            } else {
                Err(FunctionError::NotFound(name.to_string()))
            }
        });
        add_doc(&mut ctx, "index", "ø count\n. x");
        assert_eq!(body(&ctx, "index"), "<p>2 tokens</p><p>x</p>");
    }

    // =========================================================================
    // Document level
    // =========================================================================

    #[test]
    fn unresolved_document_placeholders_are_deleted() {
        let (_tmp, mut ctx) = context(&[]);
        add_doc(&mut ctx, "index", "name: Bob\n. Hi ${name} ${missing}");
        assert_eq!(body(&ctx, "index"), "<p>Hi Bob </p>");
    }

    #[test]
    fn rendering_twice_is_identical() {
        let (_tmp, mut ctx) = context(&[("_data/snippets/nav.ø", "- home\n- blog")]);
        add_doc(&mut ctx, "index", "title: Home\n# Home\n> nav\nbox {\n. inner\n}");
        let first = render(&ctx, "index").0;
        let second = render(&ctx, "index").0;
        assert_eq!(first, second);
    }

    #[test]
    fn shell_has_head_and_body() {
        let (_tmp, mut ctx) = context(&[]);
        ctx.config.favicon = "/icon.png".into();
        add_doc(&mut ctx, "blog/post", "title: A <b> post\nstyle: /post.css\nscript: /app.js\n. text");
        let html = render(&ctx, "blog/post").0.html;
        assert!(html.starts_with("<!DOCTYPE html><html><head><meta charset=\"utf-8\">"));
        assert!(html.contains("<title>A &lt;b&gt; post</title>"));
        assert!(html.contains("<link rel=\"icon\" type=\"image/png\" href=\"/icon.png\">"));
        assert!(html.contains("href=\"/post.css\""));
        assert!(html.contains("og:url\" content=\"https://a.org/blog/post\""));
        assert!(html.contains("<body><p>text</p><script type=\"text/javascript\" src=\"/app.js\" defer></script></body>"));
    }

    #[test]
    fn plate_styles_stack_over_project_styles() {
        let (_tmp, mut ctx) = context(&[(
            "_data/plates/post.json",
            r#"{"style": ["default", "/post.css"]}"#,
        )]);
        ctx.config.style = vec!["/site.css".into()];
        add_doc(&mut ctx, "index", "plate: post\n. x");
        let html = render(&ctx, "index").0.html;
        let site = html.find("/site.css").unwrap();
        let post = html.find("/post.css").unwrap();
        assert!(site < post);
    }
}
