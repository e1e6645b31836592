//! Diagnostic records and the reporter that formats them.
//!
//! Diagnostics flow through a notifier chain: an optional custom observer
//! (tests hook in here) followed by the terminal [`Reporter`], which formats
//! the record with a caret-marked source excerpt and latches an error flag
//! for error-kind diagnostics.

use std::cell::{Cell, RefCell};

use crate::token::{Token, TokenType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    RuntimeError,
    SyntaxError,
    InternalError,
    Warning,
}

impl DiagnosticKind {
    pub fn is_error(self) -> bool {
        !matches!(self, DiagnosticKind::Warning)
    }

    pub fn text(self) -> &'static str {
        match self {
            DiagnosticKind::RuntimeError => "Runtime Error",
            DiagnosticKind::SyntaxError => "Syntax Error",
            DiagnosticKind::InternalError => "Internal Error",
            DiagnosticKind::Warning => "Warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub token: Token,
    /// Token the producer expected instead, if any ("Expected: ..." trailer).
    pub expected: Option<TokenType>,
    pub message: String,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, token: Token, message: impl Into<String>) -> Self {
        Self {
            token,
            expected: None,
            message: message.into(),
            kind,
        }
    }

    pub fn syntax_error(token: Token, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::SyntaxError, token, message)
    }

    pub fn runtime_error(token: Token, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::RuntimeError, token, message)
    }

    pub fn internal_error(token: Token, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::InternalError, token, message)
    }

    pub fn warning(token: Token, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, token, message)
    }

    pub fn with_expected(mut self, expected: TokenType) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }
}

/// Observer in the notifier chain. Non-terminal observers (test collectors)
/// see every diagnostic before the reporter formats it.
pub trait Notify {
    fn notify(&mut self, diag: &Diagnostic);
}

/// Formats a diagnostic as a line-anchored, caret-marked message:
///
/// ```text
/// Syntax Error: Unexpected token  '@'
///   3 | var x = @;
///     |         ^
///
/// script.tl
/// Expected: ';'
/// ```
pub fn format_diagnostic(diag: &Diagnostic) -> String {
    const QUOTE: char = '\'';
    const MARK: char = '^';

    let location = &diag.token.location;
    let line_start = location.line_start();
    let line_text = location.line_text();
    let marker_first = location.span.first.saturating_sub(line_start);
    let marker_extent = location.span.len();

    let marked = if marker_first >= line_text.len() {
        "[eof]"
    } else {
        let last = (marker_first + marker_extent).min(line_text.len());
        &line_text[marker_first..last]
    };

    let mut out = String::new();
    out.push_str(diag.kind.text());
    out.push_str(": ");
    out.push_str(&diag.message);
    out.push_str("  ");
    out.push(QUOTE);
    out.push_str(marked);
    out.push(QUOTE);
    out.push('\n');

    // Source line and caret underline, aligned through the gutter. Tabs in
    // the prefix are preserved so the carets line up on screen.
    let line_number = location.line.to_string();
    out.push_str("  ");
    out.push_str(&line_number);
    out.push_str(" | ");
    out.push_str(line_text);
    out.push('\n');
    out.push_str("  ");
    out.extend(std::iter::repeat(' ').take(line_number.len()));
    out.push_str(" | ");
    for c in line_text.chars().take(marker_first) {
        out.push(if c.is_whitespace() { c } else { ' ' });
    }
    out.extend(std::iter::repeat(MARK).take(marker_extent.max(1)));
    out.push('\n');
    out.push('\n');

    if !location.source.filename.is_empty() {
        out.push_str(&location.source.filename);
        out.push('\n');
    }
    if let Some(expected) = diag.expected {
        out.push_str("Expected: ");
        out.push(QUOTE);
        out.push_str(expected.text());
        out.push(QUOTE);
        out.push('\n');
    }
    out
}

/// Terminal notifier: prints formatted diagnostics (errors to stderr,
/// warnings to stdout) and latches an error flag.
///
/// Interior mutability keeps the reporter shareable between the scanner,
/// parser and interpreter in a single-threaded run.
#[derive(Default)]
pub struct Reporter {
    custom: RefCell<Option<Box<dyn Notify>>>,
    error: Cell<bool>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain a custom observer in front of the terminal reporter.
    pub fn with_notifier(custom: Box<dyn Notify>) -> Self {
        Self {
            custom: RefCell::new(Some(custom)),
            error: Cell::new(false),
        }
    }

    pub fn notify(&self, diag: &Diagnostic) {
        if let Some(custom) = self.custom.borrow_mut().as_mut() {
            custom.notify(diag);
        }
        if diag.is_error() {
            self.error.set(true);
        }
        let text = format_diagnostic(diag);
        if diag.is_error() {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
    }

    pub fn error(&self) -> bool {
        self.error.get()
    }

    pub fn set_error(&self) {
        self.error.set(true);
    }

    pub fn reset(&self) {
        self.error.set(false);
    }
}
