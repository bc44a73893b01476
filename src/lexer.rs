//! Lexer for the oko markup language.
//!
//! One pass over the source turns it into a flat [`TokenStream`]. While it
//! scans, the lexer fills in the owning [`Document`] (variables, `meta.*`,
//! assets, draft flag) and records every import, snippet and function
//! reference in the [`DependencyGraph`].
//!
//! ## Grammar (per line, after leading whitespace)
//!
//! | Line starts with | Result |
//! |---|---|
//! | `}` | block close |
//! | `//` | comment, dropped |
//! | `#` .. `######` | heading 1-6 |
//! | `%` `@` `+` `>` `&` `ø` `$` `.` | image, media, import, snippet, inline token, function, quote, paragraph |
//! | `* ` | raw HTML, rest of line verbatim |
//! | `---` | divider |
//! | `-` | list entry |
//! | `name: value` | variable assignment |
//! | `name {` | generic block |
//! | `code lang {` | verbatim code up to a `}` preceded by whitespace |
//! | `if !scope.var {` | conditional block |
//! | anything else | paragraph |

use crate::deps::{DepKey, DependencyGraph};
use crate::document::{Document, PLATE_VAR};
use crate::plate::{PlateError, PlateStore};
use crate::token::{Condition, Scope, Token, TokenKind, TokenStream};
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum LexError {
    #[error("{document} L{line}: {message}")]
    Structural {
        document: String,
        line: usize,
        message: String,
    },
    #[error("{document}: {source}")]
    Plate {
        document: String,
        #[source]
        source: PlateError,
    },
}

const MAX_HEADING: usize = 6;
const TAB_WIDTH: &str = "    ";

/// Lex `source` into a token stream, populating `doc` and `graph`.
pub fn lex(
    doc: &mut Document,
    source: &str,
    graph: &mut DependencyGraph,
) -> Result<TokenStream, LexError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        doc,
        graph,
        tokens: Vec::new(),
        open: Vec::new(),
        cacheable: true,
    };
    lexer.run()?;

    let Lexer {
        tokens, cacheable, ..
    } = lexer;
    trace!(count = tokens.len(), cacheable, "lexed");
    Ok(TokenStream::new(tokens, cacheable))
}

/// Register the dependency on a document's declared plate and on every
/// snippet that plate injects. Fails when the plate cannot be resolved.
pub fn register_plate(
    doc: &Document,
    plates: &PlateStore,
    graph: &mut DependencyGraph,
) -> Result<(), LexError> {
    let Some(name) = doc.plate_name() else {
        return Ok(());
    };
    graph.add(DepKey::Plate(name.to_string()), &doc.id);

    let plate = plates.get(name).map_err(|source| LexError::Plate {
        document: doc.id.clone(),
        source,
    })?;
    for snippet in plate.injected_snippets() {
        graph.add(DepKey::Snippet(snippet.to_string()), &doc.id);
    }
    Ok(())
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    doc: &'a mut Document,
    graph: &'a mut DependencyGraph,
    tokens: Vec<Token>,
    /// Indices into `tokens` of the currently open blocks.
    open: Vec<usize>,
    cacheable: bool,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), LexError> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else { break };

            match c {
                '}' => {
                    self.bump();
                    self.close_block()?;
                }
                '/' if self.peek_at(1) == Some('/') => {
                    self.rest_of_line();
                }
                '#' => self.heading(),
                '%' => {
                    self.sigil(TokenKind::Image);
                }
                '@' => {
                    self.sigil(TokenKind::Media);
                }
                '+' => {
                    let text = self.sigil(TokenKind::Import);
                    if let Some(target) = text.split_whitespace().next() {
                        self.depend(DepKey::Document(target.to_string()));
                    }
                }
                '>' => {
                    let name = self.sigil(TokenKind::Snippet);
                    if !name.is_empty() {
                        self.depend(DepKey::Snippet(name));
                    }
                }
                '&' => {
                    self.sigil(TokenKind::InlineToken);
                }
                'ø' => {
                    let name = self.sigil(TokenKind::Function);
                    if !name.is_empty() {
                        self.depend(DepKey::Function(name));
                    }
                }
                '$' => {
                    self.sigil(TokenKind::Quote);
                }
                '.' => {
                    self.sigil(TokenKind::Paragraph);
                }
                '*' if self.peek_at(1).is_none_or(is_line_space_or_break) => {
                    self.bump();
                    if self.peek().is_some_and(is_line_space) {
                        self.bump();
                    }
                    let line = self.line;
                    let text = self.rest_of_line();
                    self.push(TokenKind::Html, text, line);
                }
                '-' => self.dash(),
                _ => self.word()?,
            }
        }

        if let Some(&index) = self.open.last() {
            let token = &self.tokens[index];
            let what = match token.kind {
                TokenKind::Conditional(_) => format!("if {}", token.text),
                _ => token.text.clone(),
            };
            return Err(self.error_at(token.line, format!("unclosed block \"{what}\"")));
        }
        Ok(())
    }

    // ========================================================================
    // Line forms
    // ========================================================================

    fn heading(&mut self) {
        let line = self.line;
        let level = self.count_run('#');
        if level > MAX_HEADING {
            let text = self.rest_of_line();
            self.push(TokenKind::Paragraph, text, line);
            return;
        }
        self.pos += level;
        self.skip_line_space();
        let text = self.rest_of_line();
        self.push(TokenKind::Heading(level as u8), text, line);
    }

    /// Single-character sigil: the rest of the line is the payload.
    fn sigil(&mut self, kind: TokenKind) -> String {
        let line = self.line;
        self.bump();
        self.skip_line_space();
        let text = self.rest_of_line().trim_end().to_string();
        self.push(kind, text.clone(), line);
        text
    }

    fn dash(&mut self) {
        let line = self.line;
        if self.count_run('-') == 3 && self.peek_at(3).is_none_or(is_line_space_or_break) {
            self.pos += 3;
            self.push(TokenKind::Divider, String::new(), line);
            return;
        }
        self.sigil(TokenKind::ListEntry);
    }

    /// Assignment, block opener or plain paragraph.
    fn word(&mut self) -> Result<(), LexError> {
        let line = self.line;
        let start = self.pos;

        if let Some(ident) = self.identifier() {
            self.skip_line_space();

            if self.peek() == Some(':') {
                self.bump();
                self.skip_line_space();
                let value = self.rest_of_line();
                return self.assign(&ident, value.trim_end().to_string(), line);
            }

            // Only `code` and `if` take arguments; any other `word text {`
            // line is prose that happens to end in a brace.
            let head = self.rest_of_line();
            if let Some(head) = head.trim_end().strip_suffix('{')
                && (head.trim().is_empty() || matches!(ident.as_str(), "code" | "if"))
            {
                return self.open_block(&ident, head.trim(), line);
            }
        }

        self.pos = start;
        let text = self.rest_of_line();
        self.push(TokenKind::Paragraph, text, line);
        Ok(())
    }

    fn assign(&mut self, key: &str, value: String, line: usize) -> Result<(), LexError> {
        if let Some((target, field)) = key.split_once('.') {
            if target != "meta" || field.is_empty() || field.contains('.') {
                return Err(self.error_at(line, format!("unknown variable target \"{key}\"")));
            }
            self.doc.meta.insert(field.to_string(), value.clone());
            self.doc.vars.insert(key.to_string(), value);
            return Ok(());
        }

        match key {
            "script" => self.doc.scripts.push(value),
            "style" => self.doc.styles.push(value),
            "draft" => {
                if value == "true" {
                    self.doc.is_draft = true;
                    self.doc.vars.insert(key.to_string(), value);
                }
            }
            PLATE_VAR => {
                self.doc.vars.insert(key.to_string(), value);
            }
            _ => {
                let scope = match self.open.last() {
                    Some(&index) => self.tokens[index].vars.as_mut(),
                    None => None,
                };
                match scope {
                    Some(vars) => vars.insert(key.to_string(), value),
                    None => self.doc.vars.insert(key.to_string(), value),
                };
            }
        }
        Ok(())
    }

    fn open_block(&mut self, ident: &str, head: &str, line: usize) -> Result<(), LexError> {
        match ident {
            "code" => self.code_block(head, line),
            "if" => {
                let token = self.conditional(head, line)?;
                self.open.push(self.tokens.len());
                self.tokens.push(token);
                Ok(())
            }
            _ => {
                self.open.push(self.tokens.len());
                self.push(TokenKind::BlockOpen, ident.to_string(), line);
                Ok(())
            }
        }
    }

    fn conditional(&mut self, head: &str, line: usize) -> Result<Token, LexError> {
        let (negated, rest) = match head.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, head),
        };
        let (scope_name, variable) = rest.split_once('.').ok_or_else(|| {
            if scope_of(rest).is_some() {
                self.error_at(line, "missing '.' separator in if-statement")
            } else {
                self.error_at(line, format!("no such scope \"{rest}\""))
            }
        })?;
        let scope = scope_of(scope_name)
            .ok_or_else(|| self.error_at(line, format!("no such scope \"{scope_name}\"")))?;
        if variable.is_empty() || !is_identifier(variable) {
            return Err(self.error_at(line, "no variable in if-statement"));
        }

        if scope == Scope::Parent {
            self.cacheable = false;
        }
        Ok(Token::new(
            TokenKind::Conditional(Condition { scope, negated }),
            variable,
            line,
        ))
    }

    /// `code lang {`: everything up to a `}` preceded by whitespace.
    fn code_block(&mut self, lang: &str, line: usize) -> Result<(), LexError> {
        let lang = if lang.is_empty() { "code" } else { lang };
        self.push(TokenKind::Code, lang.to_string(), line);

        // skip the newline ending the opening line
        if self.peek() == Some('\r') {
            self.bump();
        }
        if self.peek() == Some('\n') {
            self.bump();
        }

        let content_line = self.line;
        let start = self.pos;
        let mut previous = '\n';
        let end = loop {
            match self.peek() {
                None => return Err(self.error_at(line, "unterminated code block")),
                Some('}') if previous.is_whitespace() => break self.pos,
                Some(c) => {
                    previous = c;
                    self.bump();
                }
            }
        };
        self.bump();

        let raw: String = self.chars[start..end].iter().collect();
        self.push(TokenKind::CodeContent, normalize_code(&raw), content_line);
        Ok(())
    }

    fn close_block(&mut self) -> Result<(), LexError> {
        let line = self.line;
        if self.open.pop().is_none() {
            return Err(self.error_at(line, "'}' without an open block"));
        }
        self.push(TokenKind::BlockClose, String::new(), line);
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn push(&mut self, kind: TokenKind, text: String, line: usize) {
        self.tokens.push(Token::new(kind, text, line));
    }

    fn depend(&mut self, key: DepKey) {
        self.graph.add(key, &self.doc.id);
    }

    fn error_at(&self, line: usize, message: impl Into<String>) -> LexError {
        LexError::Structural {
            document: self.doc.id.clone(),
            line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            if c == '\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_line_space(&mut self) {
        while self.peek().is_some_and(is_line_space) {
            self.bump();
        }
    }

    fn count_run(&self, c: char) -> usize {
        self.chars[self.pos..].iter().take_while(|&&x| x == c).count()
    }

    /// Consume up to (not including) the line break.
    fn rest_of_line(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '\n' && c != '\r') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Consume an identifier (`[A-Za-z_][A-Za-z0-9_.]*`) if one starts here.
    fn identifier(&mut self) -> Option<String> {
        let first = self.peek()?;
        if !(first.is_alphabetic() || first == '_') {
            return None;
        }
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.pos += 1;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }
}

fn scope_of(name: &str) -> Option<Scope> {
    match name {
        "project" => Some(Scope::Project),
        "parent" => Some(Scope::Parent),
        "page" => Some(Scope::Page),
        _ => None,
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn is_identifier(s: &str) -> bool {
    s.chars().all(is_identifier_char)
}

fn is_line_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_line_space_or_break(c: char) -> bool {
    c.is_whitespace()
}

/// Strip the first line's indentation from every line, expand tabs and
/// unescape `\}`.
fn normalize_code(raw: &str) -> String {
    let trimmed = raw.trim_end();
    let indent: String = trimmed
        .chars()
        .take_while(|c| is_line_space(*c))
        .collect();

    trimmed
        .lines()
        .map(|line| line.strip_prefix(indent.as_str()).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
        .replace('\t', TAB_WIDTH)
        .replace("\\}", "}")
}
