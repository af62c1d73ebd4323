//! Source positions, spans and structured diagnostics
//!
//! Every stage of the pipeline reports problems as [`Diagnostic`] values;
//! nothing is written to stderr from inside the library. The dispatcher
//! merges per-stage vectors and sorts them into canonical
//! (source file, position) order before returning them to the caller.

use serde::{Deserialize, Serialize};

/// An in-memory source file handed to the compiler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseSourceFile {
    pub content: String,
    pub url: String,
}

impl ParseSourceFile {
    pub fn new(content: String, url: String) -> Self {
        ParseSourceFile { content, url }
    }
}

/// A location inside a source file. Lines and columns are zero-based,
/// `offset` is a byte offset into the UTF-8 content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, col: usize, offset: usize) -> Self {
        Position { line, col, offset }
    }

    /// Advance over a single character, tracking line breaks.
    pub fn advance(&mut self, ch: char) {
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A half-open byte range `[start, end)` in one source file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    pub fn at(pos: Position) -> Self {
        Span { start: pos, end: pos }
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start.offset..self.end.offset]
    }
}

/// Diagnostic severity. A unit succeeds iff it produced no `Error` or
/// `Fatal` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// Stable machine-readable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Lex / scan
    UnterminatedLiteral,
    InvalidCharacter,
    UnterminatedBlock,
    // Parse
    UnexpectedToken,
    MissingPunctuation,
    MalformedDeclaration,
    UnmatchedBrace,
    // Semantic
    UndefinedTemplate,
    UndefinedCustom,
    UndefinedOrigin,
    UndefinedVariable,
    NameConflict,
    ConstraintViolation,
    ScopeViolation,
    // Namespace
    ReservedName,
    UnresolvedReference,
    CrossNamespaceAmbiguity,
    // Module
    PathNotFound,
    Unreadable,
    CyclicDependency,
    VersionIncompatible,
    MalformedInfo,
    // Packaging
    InvalidStructure,
    EntryEscapesRoot,
    ChecksumMismatch,
    // I/O
    ReadFailure,
    WriteFailure,
    // Dispatcher
    Cancelled,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnterminatedLiteral => "unterminated-literal",
            DiagnosticCode::InvalidCharacter => "invalid-character",
            DiagnosticCode::UnterminatedBlock => "unterminated-block",
            DiagnosticCode::UnexpectedToken => "unexpected-token",
            DiagnosticCode::MissingPunctuation => "missing-punctuation",
            DiagnosticCode::MalformedDeclaration => "malformed-declaration",
            DiagnosticCode::UnmatchedBrace => "unmatched-brace",
            DiagnosticCode::UndefinedTemplate => "undefined-template",
            DiagnosticCode::UndefinedCustom => "undefined-custom",
            DiagnosticCode::UndefinedOrigin => "undefined-origin",
            DiagnosticCode::UndefinedVariable => "undefined-variable",
            DiagnosticCode::NameConflict => "name-conflict",
            DiagnosticCode::ConstraintViolation => "constraint-violation",
            DiagnosticCode::ScopeViolation => "scope-violation",
            DiagnosticCode::ReservedName => "reserved-name",
            DiagnosticCode::UnresolvedReference => "unresolved-reference",
            DiagnosticCode::CrossNamespaceAmbiguity => "cross-namespace-ambiguity",
            DiagnosticCode::PathNotFound => "path-not-found",
            DiagnosticCode::Unreadable => "unreadable",
            DiagnosticCode::CyclicDependency => "cyclic-dependency",
            DiagnosticCode::VersionIncompatible => "version-incompatible",
            DiagnosticCode::MalformedInfo => "malformed-info",
            DiagnosticCode::InvalidStructure => "invalid-structure",
            DiagnosticCode::EntryEscapesRoot => "entry-escapes-root",
            DiagnosticCode::ChecksumMismatch => "checksum-mismatch",
            DiagnosticCode::ReadFailure => "read-failure",
            DiagnosticCode::WriteFailure => "write-failure",
            DiagnosticCode::Cancelled => "cancelled",
        }
    }
}

/// A structured diagnostic: severity, stable code, human message, the
/// primary span it points at and free-form notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub file: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Diagnostic {
            severity,
            code,
            message: message.into(),
            file: String::new(),
            span,
            notes: Vec::new(),
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic::new(Severity::Error, code, message, span)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic::new(Severity::Warning, code, message, span)
    }

    pub fn fatal(code: DiagnosticCode, message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic::new(Severity::Fatal, code, message, span)
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        write!(f, "{}[{}]: {}", level, self.code.as_str(), self.message)?;
        if let Some(span) = &self.span {
            write!(f, " at {}", span.start)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        Ok(())
    }
}

/// Sort diagnostics into the canonical (source file, position) order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        let a_pos = a.span.map(|s| s.start.offset).unwrap_or(usize::MAX);
        let b_pos = b.span.map(|s| s.start.offset).unwrap_or(usize::MAX);
        a.file.cmp(&b.file).then(a_pos.cmp(&b_pos))
    });
}

/// True when any entry is `Error` or worse.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
