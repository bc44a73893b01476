//! Token model shared by the lexer and the renderer.
//!
//! A document is lexed once into a flat [`TokenStream`]. Nesting is expressed
//! with explicit [`TokenKind::BlockOpen`] / [`TokenKind::Conditional`] tokens
//! closed by [`TokenKind::BlockClose`], so the renderer walks the stream with
//! a [`Cursor`] and recurses on every opening token.

use std::collections::BTreeMap;

/// Variable table used by documents and block-scoped assignments.
pub type Vars = BTreeMap<String, String>;

/// Which document a conditional block is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Project configuration fields.
    Project,
    /// The document currently including this one (snippets only).
    Parent,
    /// The document that owns the token stream.
    Page,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Project => "project",
            Scope::Parent => "parent",
            Scope::Page => "page",
        }
    }
}

/// A conditional-block head: `if <!>scope.name {`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
    pub scope: Scope,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `#` .. `######`, level 1-6.
    Heading(u8),
    Quote,
    Paragraph,
    ListEntry,
    Divider,
    Image,
    /// `&` inline token reference.
    InlineToken,
    /// `@` video/media reference.
    Media,
    /// `+ <document-id> <slot?>`
    Import,
    /// `> <snippet-name>`
    Snippet,
    /// `ø <function-name>`
    Function,
    /// `* ` raw HTML passthrough.
    Html,
    /// `code <lang> {`; always followed by one [`TokenKind::CodeContent`].
    Code,
    CodeContent,
    BlockOpen,
    BlockClose,
    Conditional(Condition),
}

impl TokenKind {
    pub fn is_heading(self) -> bool {
        matches!(self, TokenKind::Heading(_))
    }

    /// Kinds whose text goes through the inline emphasis pass before insertion.
    pub fn is_inline_formatted(self) -> bool {
        matches!(
            self,
            TokenKind::Heading(_) | TokenKind::Quote | TokenKind::Paragraph | TokenKind::ListEntry
        )
    }

    /// Kinds that push a nesting level and own a block-scoped variable table.
    pub fn opens_block(self) -> bool {
        matches!(self, TokenKind::BlockOpen | TokenKind::Conditional(_))
    }

    /// Name used to look the kind up in a plate's fragment mapping.
    pub fn fragment_name(self) -> &'static str {
        match self {
            TokenKind::Heading(1) => "h1",
            TokenKind::Heading(2) => "h2",
            TokenKind::Heading(3) => "h3",
            TokenKind::Heading(4) => "h4",
            TokenKind::Heading(5) => "h5",
            TokenKind::Heading(_) => "h6",
            TokenKind::Quote => "quote",
            TokenKind::Paragraph => "paragraph",
            TokenKind::ListEntry => "list",
            TokenKind::Divider => "divider",
            TokenKind::Image => "image",
            TokenKind::InlineToken => "token",
            TokenKind::Media => "video",
            TokenKind::Import => "import",
            TokenKind::Snippet => "snippet",
            TokenKind::Function => "function",
            TokenKind::Html => "html",
            TokenKind::Code => "code",
            TokenKind::CodeContent => "code_content",
            TokenKind::BlockOpen => "block",
            TokenKind::BlockClose => "block_close",
            TokenKind::Conditional(_) => "if",
        }
    }
}

/// One lexed unit of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Payload; meaning depends on `kind` (heading text, image path,
    /// import target, block name, condition variable, ...).
    pub text: String,
    /// 1-based source line.
    pub line: usize,
    /// Block-scoped variables. Only present on block-opening kinds.
    pub vars: Option<Vars>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        let vars = kind.opens_block().then(Vars::new);
        Self {
            kind,
            text: text.into(),
            line,
            vars,
        }
    }
}

/// The lexed form of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
    /// False when the stream contains a parent-scoped conditional, so its
    /// rendering depends on the including document and must not be reused.
    pub cacheable: bool,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>, cacheable: bool) -> Self {
        Self { tokens, cacheable }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// A fresh cursor positioned before the first token.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            tokens: &self.tokens,
            pos: 0,
        }
    }
}

/// Read position over a [`TokenStream`].
///
/// The stream itself is immutable and may be walked by several cursors, one
/// per including context.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// The token most recently returned by [`Cursor::next`].
    pub fn current(&self) -> Option<&'a Token> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// The token the next call to [`Cursor::next`] will return.
    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}
