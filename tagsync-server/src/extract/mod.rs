//! Source extractor
//!
//! Reads the variable declaration sections of vendor structured text and
//! produces raw declarations in source order. Extraction never fails:
//! lines it cannot read become [`RawDecl::Partial`] entries plus a
//! diagnostic, and a source without any readable block yields an empty
//! result with an error diagnostic.
//!
//! # Recognised shape
//!
//! ```text
//! VAR_INPUT
//!     Start_Button AT I:1/0 : BOOL := 0; // green button
//!     Speed, Setpoint : INT;
//! END_VAR
//! ```

pub mod lexer;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tagsync_common::{CanonicalTag, Category, Diagnostic, DiagnosticCode, Scope, Vendor};
use tracing::debug;

use crate::vendor;
use lexer::SourceLine;

static BLOCK_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bVAR(_INPUT|_OUTPUT|_IN_OUT|_GLOBAL|_TEMP|_STAT|_EXTERNAL)?\b((?:\s+(?:CONSTANT|RETAIN|PERSISTENT|NON_RETAIN)\b)*)",
    )
    .expect("block start regex")
});

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^\s*(?P<names>.+?)\s*(?:\b(?i:AT)\s+(?P<addr>\S+)\s*)?:\s*(?P<ty>[^:]+?)\s*(?::=\s*(?P<default>.*?))?\s*$",
    )
    .expect("declaration regex")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Comment and quoting rules of one dialect
#[derive(Debug)]
pub struct SourceSyntax {
    /// Block comment delimiters (`//` line comments are always recognised)
    pub block_comments: &'static [(&'static str, &'static str)],
    /// Names may be written in double quotes
    pub quoted_names: bool,
    /// `{ ... }` attribute / pragma blocks are skipped
    pub brace_blocks: bool,
}

// ========================================
// Declaration Types
// ========================================

/// Kind of `VAR*` block a declaration sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Var,
    Input,
    Output,
    InOut,
    Global,
    Temp,
    Static,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub constant: bool,
}

impl Section {
    pub fn scope(&self) -> Scope {
        match self.kind {
            SectionKind::Input => Scope::Input,
            SectionKind::Output => Scope::Output,
            SectionKind::Global | SectionKind::External => Scope::Global,
            SectionKind::Var | SectionKind::InOut | SectionKind::Temp | SectionKind::Static => {
                Scope::Local
            }
        }
    }

    /// Category implied by the block itself, if any
    pub fn category(&self) -> Option<Category> {
        if self.constant {
            Some(Category::Constant)
        } else if self.kind == SectionKind::Temp {
            Some(Category::Temp)
        } else {
            None
        }
    }

    fn from_captures(caps: &Captures<'_>) -> Self {
        let kind = match caps
            .get(1)
            .map(|m| m.as_str().to_ascii_uppercase())
            .as_deref()
        {
            Some("_INPUT") => SectionKind::Input,
            Some("_OUTPUT") => SectionKind::Output,
            Some("_IN_OUT") => SectionKind::InOut,
            Some("_GLOBAL") => SectionKind::Global,
            Some("_TEMP") => SectionKind::Temp,
            Some("_STAT") => SectionKind::Static,
            Some("_EXTERNAL") => SectionKind::External,
            _ => SectionKind::Var,
        };
        let constant = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_uppercase().contains("CONSTANT"))
            .unwrap_or(false);
        Self { kind, constant }
    }
}

/// One declared name with its attributes as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    /// Vendor type name, whitespace collapsed
    pub type_name: String,
    pub address: String,
    pub default_value: String,
    pub description: String,
    pub section: Section,
    pub line: usize,
}

/// A declaration line as read from one dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDecl {
    Rockwell(Declaration),
    Siemens(Declaration),
    Beckhoff(Declaration),
    /// Text inside a declaration block that could not be read
    Partial(PartialDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDecl {
    pub line: usize,
    pub text: String,
    pub reason: String,
}

impl RawDecl {
    fn from_vendor(vendor: Vendor, declaration: Declaration) -> Self {
        match vendor {
            Vendor::Rockwell => RawDecl::Rockwell(declaration),
            Vendor::Siemens => RawDecl::Siemens(declaration),
            Vendor::Beckhoff => RawDecl::Beckhoff(declaration),
        }
    }

    pub fn declaration(&self) -> Option<&Declaration> {
        match self {
            RawDecl::Rockwell(d) | RawDecl::Siemens(d) | RawDecl::Beckhoff(d) => Some(d),
            RawDecl::Partial(_) => None,
        }
    }

    /// Vendor the declaration was read as; `None` for partial lines
    pub fn vendor(&self) -> Option<Vendor> {
        match self {
            RawDecl::Rockwell(_) => Some(Vendor::Rockwell),
            RawDecl::Siemens(_) => Some(Vendor::Siemens),
            RawDecl::Beckhoff(_) => Some(Vendor::Beckhoff),
            RawDecl::Partial(_) => None,
        }
    }
}

/// Extractor output: declarations in source order plus diagnostics
#[derive(Debug, Clone)]
pub struct Extraction {
    pub vendor: Vendor,
    pub declarations: Vec<RawDecl>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    /// Fully read declarations, skipping partial lines
    pub fn declared(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter_map(RawDecl::declaration)
    }

    /// Translate the declarations into canonical tags
    ///
    /// Declarations whose type the vendor does not know are dropped with
    /// a diagnostic; the extractor diagnostics are carried over.
    pub fn into_canonical(self) -> (Vec<CanonicalTag>, Vec<Diagnostic>) {
        let mut tags = Vec::new();
        let mut diagnostics = self.diagnostics;

        for declaration in self.declarations.iter().filter_map(RawDecl::declaration) {
            match vendor::from_declaration(declaration, self.vendor) {
                Ok(tag) => tags.push(tag),
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        (tags, diagnostics)
    }
}

// ========================================
// Extraction
// ========================================

/// Extract declarations from `source` using a dialect's syntax rules
pub fn extract(vendor: Vendor, syntax: &SourceSyntax, source: &str) -> Extraction {
    let mut walker = Walker::new(vendor, syntax);
    let lines = lexer::split_lines(source, syntax);

    for line in &lines {
        walker.feed(line);
    }
    walker.finish(&lines, source)
}

enum Terminator {
    Semicolon(usize),
    EndVar(usize),
}

struct Walker<'a> {
    vendor: Vendor,
    syntax: &'a SourceSyntax,
    section: Option<Section>,
    pending: String,
    pending_line: usize,
    pending_comment: String,
    /// `pending` reads as a whole declaration but had no `;`; the next
    /// code line decides whether it continues
    deferred: bool,
    saw_block: bool,
    out: Extraction,
}

impl<'a> Walker<'a> {
    fn new(vendor: Vendor, syntax: &'a SourceSyntax) -> Self {
        Self {
            vendor,
            syntax,
            section: None,
            pending: String::new(),
            pending_line: 0,
            pending_comment: String::new(),
            deferred: false,
            saw_block: false,
            out: Extraction {
                vendor,
                declarations: Vec::new(),
                diagnostics: Vec::new(),
            },
        }
    }

    fn feed(&mut self, line: &SourceLine) {
        let mut text: &str = &line.code;

        if self.deferred && !text.trim().is_empty() {
            self.deferred = false;
            let continues = text.trim_start().starts_with(":=")
                || self.pending.trim_end().ends_with(":=");
            if let (false, Some(section)) = (continues, self.section) {
                self.statement(section, true);
            }
        }

        loop {
            let Some(section) = self.section else {
                match BLOCK_START.captures(text) {
                    Some(caps) => {
                        self.section = Some(Section::from_captures(&caps));
                        self.saw_block = true;
                        let end = caps.get(0).map(|m| m.end()).unwrap_or(text.len());
                        text = &text[end..];
                        continue;
                    }
                    None => return,
                }
            };

            match self.find_terminator(text) {
                Some(Terminator::Semicolon(pos)) => {
                    self.append(&text[..pos], line);
                    self.statement(section, false);
                    text = &text[pos + 1..];
                }
                Some(Terminator::EndVar(pos)) => {
                    self.append(&text[..pos], line);
                    if !self.pending.trim().is_empty() {
                        self.statement(section, true);
                    }
                    self.section = None;
                    text = text[pos + "END_VAR".len()..].trim_start();
                    text = text.strip_prefix(';').unwrap_or(text);
                }
                None => {
                    self.append(text, line);
                    // Taken as missing its ';' unless the next line carries on
                    self.deferred = DECLARATION.is_match(&self.pending);
                    return;
                }
            }
        }
    }

    fn append(&mut self, text: &str, line: &SourceLine) {
        if text.trim().is_empty() {
            return;
        }
        if self.pending.trim().is_empty() {
            self.pending.clear();
            self.pending_comment.clear();
            self.pending_line = line.number;
        } else {
            self.pending.push(' ');
        }
        self.pending.push_str(text.trim());
        if !line.comment.is_empty() {
            self.pending_comment = line.comment.clone();
        }
    }

    /// First `;` or `END_VAR` outside quotes
    fn find_terminator(&self, text: &str) -> Option<Terminator> {
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for (i, c) in text.char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '$' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '\'' => quote = Some(c),
                '"' if self.syntax.quoted_names => quote = Some(c),
                ';' => return Some(Terminator::Semicolon(i)),
                'E' | 'e' if is_end_var(text, i) => return Some(Terminator::EndVar(i)),
                _ => {}
            }
        }

        None
    }

    fn statement(&mut self, section: Section, unterminated: bool) {
        let text = std::mem::take(&mut self.pending);
        let comment = std::mem::take(&mut self.pending_comment);
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        if unterminated {
            self.out.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::PartialDeclaration,
                    format!("declaration '{}' is missing its ';'", text),
                )
                .at_line(self.pending_line),
            );
        }

        match self.parse_statement(text, section, &comment) {
            Ok(declarations) => {
                for declaration in declarations {
                    self.out
                        .declarations
                        .push(RawDecl::from_vendor(self.vendor, declaration));
                }
            }
            Err(reason) => {
                debug!("Unreadable declaration at line {}: {}", self.pending_line, text);
                self.partial(text, reason);
            }
        }
    }

    fn partial(&mut self, text: &str, reason: String) {
        self.out.diagnostics.push(
            Diagnostic::error(
                DiagnosticCode::PartialDeclaration,
                format!("cannot read declaration '{}': {}", text, reason),
            )
            .at_line(self.pending_line),
        );
        self.out.declarations.push(RawDecl::Partial(PartialDecl {
            line: self.pending_line,
            text: text.to_string(),
            reason,
        }));
    }

    fn parse_statement(
        &self,
        text: &str,
        section: Section,
        comment: &str,
    ) -> Result<Vec<Declaration>, String> {
        let caps = DECLARATION
            .captures(text)
            .ok_or_else(|| "expected 'name : TYPE'".to_string())?;

        let type_name = caps["ty"].split_whitespace().collect::<Vec<_>>().join(" ");
        if type_name.is_empty() {
            return Err("missing data type".to_string());
        }

        let address = caps
            .name("addr")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let default_value = caps
            .name("default")
            .map(|m| unquote(m.as_str().trim()))
            .unwrap_or_default();

        let mut declarations = Vec::new();
        for raw in caps["names"].split(',') {
            let name = self.read_name(raw.trim())?;
            declarations.push(Declaration {
                name,
                type_name: type_name.clone(),
                address: address.clone(),
                default_value: default_value.clone(),
                description: comment.to_string(),
                section,
                line: self.pending_line,
            });
        }

        Ok(declarations)
    }

    fn read_name(&self, raw: &str) -> Result<String, String> {
        if self.syntax.quoted_names && raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            let inner = &raw[1..raw.len() - 1];
            if !inner.trim().is_empty() {
                return Ok(inner.to_string());
            }
        } else if IDENTIFIER.is_match(raw) {
            return Ok(raw.to_string());
        }
        Err(format!("'{}' is not a valid name", raw))
    }

    fn finish(mut self, lines: &[SourceLine], source: &str) -> Extraction {
        let last_line = lines.last().map(|l| l.number).unwrap_or(1);

        if let Some(section) = self.section {
            if self.deferred {
                self.statement(section, true);
            } else if !self.pending.trim().is_empty() {
                let text = std::mem::take(&mut self.pending);
                self.partial(text.trim(), "declaration block ended early".to_string());
            }
            self.out.diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::Unparseable,
                    "declaration block is not closed by END_VAR",
                )
                .at_line(last_line),
            );
        } else if !self.saw_block && !source.trim().is_empty() {
            self.out.diagnostics.push(Diagnostic::error(
                DiagnosticCode::Unparseable,
                "no VAR ... END_VAR declaration block found",
            ));
        }

        self.out
    }
}

fn is_end_var(text: &str, i: usize) -> bool {
    let Some(candidate) = text.get(i..i + "END_VAR".len()) else {
        return false;
    };
    if !candidate.eq_ignore_ascii_case("END_VAR") {
        return false;
    }
    let before = text[..i].chars().next_back();
    let after = text[i + "END_VAR".len()..].chars().next();
    let is_word = |c: Option<char>| c.map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false);
    !is_word(before) && !is_word(after)
}

/// Strip the quotes of a string literal default, resolving `$'` escapes
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        value[1..value.len() - 1].replace("$'", "'")
    } else {
        value.to_string()
    }
}
