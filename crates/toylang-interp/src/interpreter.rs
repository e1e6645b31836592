//! The interpreter façade.
//!
//! Owns the environment, the reporter, the Media resolver, and the storage
//! pools for source texts and executed statements; drives the parser and
//! hands each top-level statement to the evaluator.

use std::io::Write;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::debug;

use toylang_ast::Stmt;
use toylang_lexer::{Diagnostic, Notify, Reporter, Source, Token, TokenType};
use toylang_parser::Parser;

use crate::env::Environment;
use crate::eval::Transfer;
use crate::intrinsics;
use crate::media::Media;
use crate::value::unescape;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugFlags: u32 {
        /// Print the value of every expression statement.
        const PRINT_STMT_EXPRS = 1 << 0;
    }
}

/// Retained program state. Executed statements are kept because invocables
/// hold their declarations and tokens hold their source handles; the pools
/// make both lifetimes explicit and give imports their at-most-once check.
#[derive(Default)]
struct Storage {
    texts: Vec<Source>,
    executed: Vec<Stmt>,
    imported: Vec<String>,
}

impl Storage {
    fn clear(&mut self) {
        self.texts.clear();
        self.executed.clear();
        self.imported.clear();
    }
}

pub struct Interpreter {
    pub media: Media,
    pub debug: DebugFlags,
    pub(crate) environment: Environment,
    reporter: Rc<Reporter>,
    storage: Storage,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_reporter(Rc::new(Reporter::new()))
    }

    /// An interpreter whose diagnostics are also observed by `custom`.
    pub fn with_notifier(custom: Box<dyn Notify>) -> Self {
        Self::with_reporter(Rc::new(Reporter::with_notifier(custom)))
    }

    fn with_reporter(reporter: Rc<Reporter>) -> Self {
        let mut interpreter = Self {
            media: Media::new(),
            debug: DebugFlags::empty(),
            environment: Environment::new(),
            reporter,
            storage: Storage::default(),
            out: Box::new(std::io::stdout()),
        };
        intrinsics::register(&mut interpreter);
        interpreter
    }

    /// Redirects `_print`/`_printf` and evaluation echoes (default: stdout).
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    pub fn environment(&mut self) -> &mut Environment {
        &mut self.environment
    }

    /// Runs a program: the import prologue first, then every statement in
    /// order. True iff no error was raised.
    pub fn execute(&mut self, source: Source) -> bool {
        if source.text.is_empty() {
            return true;
        }
        debug!(filename = %source.filename, bytes = source.text.len(), "execute");
        self.reporter.reset();
        self.storage.texts.push(source.clone());
        let mut parser = Parser::new(source, self.reporter.clone());
        while let Some(import) = parser.parse_import() {
            if !self.execute_import(&import.path) {
                return false;
            }
        }
        while let Some(stmt) = parser.parse_stmt() {
            self.exec_top(&stmt);
            self.storage.executed.push(stmt);
        }
        !self.is_errored()
    }

    /// Evaluates a stream of expressions, echoing each value. True iff no
    /// error was raised.
    pub fn evaluate(&mut self, expression: &str) -> bool {
        if expression.is_empty() {
            return false;
        }
        self.reporter.reset();
        let source = Source::anonymous(expression);
        self.storage.texts.push(source.clone());
        let mut parser = Parser::new(source, self.reporter.clone());
        while let Some(expr) = parser.parse_expr() {
            match self.eval_expr(&expr) {
                Ok(value) => {
                    let text = unescape(&value.to_string());
                    self.write_out(&format!("{text}\n"));
                }
                Err(transfer) => self.stray_transfer(transfer),
            }
        }
        !self.is_errored()
    }

    /// REPL entry: evaluates when the text is a single expression, executes
    /// otherwise.
    pub fn execute_or_evaluate(&mut self, source: Source) -> bool {
        if Parser::is_expression(&source.text) {
            return self.evaluate(&source.text);
        }
        self.execute(source)
    }

    pub fn runtime_error(&self, at: &Token, message: impl Into<String>) {
        self.reporter
            .notify(&Diagnostic::runtime_error(at.clone(), message));
    }

    pub(crate) fn runtime_error_expecting(
        &self,
        at: &Token,
        message: impl Into<String>,
        expected: TokenType,
    ) {
        self.reporter
            .notify(&Diagnostic::runtime_error(at.clone(), message).with_expected(expected));
    }

    pub(crate) fn internal_error(&self, at: &Token, message: impl Into<String>) {
        self.reporter
            .notify(&Diagnostic::internal_error(at.clone(), message));
    }

    /// Drops all bindings and retained programs, clears the error flag, and
    /// re-registers the intrinsics.
    pub fn clear_state(&mut self) {
        self.environment = Environment::new();
        self.storage.clear();
        self.reporter.reset();
        intrinsics::register(self);
    }

    pub(crate) fn is_errored(&self) -> bool {
        self.reporter.error()
    }

    pub(crate) fn set_error(&self) {
        self.reporter.set_error();
    }

    pub(crate) fn write_out(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn exec_top(&mut self, stmt: &Stmt) {
        if self.is_errored() {
            return;
        }
        match self.exec_stmt(stmt) {
            Ok(()) => {}
            Err(transfer) => self.stray_transfer(transfer),
        }
    }

    /// A break or return that escaped every loop and function.
    fn stray_transfer(&mut self, transfer: Transfer) {
        match transfer {
            Transfer::Break(token) => {
                self.runtime_error(&token, "Unexpected break outside of any loops");
            }
            Transfer::Return(token, _) => {
                self.runtime_error(&token, "Unexpected return outside of any functions");
            }
            Transfer::Halt => self.set_error(),
        }
    }

    /// Resolves and runs one import, at most once per URI.
    fn execute_import(&mut self, path: &Token) -> bool {
        let uri = path.lexeme().to_string();
        if self.storage.imported.contains(&uri) {
            return true;
        }
        let mut program = String::new();
        if !self.media.read_to(&mut program, &uri) {
            self.runtime_error(path, "File not found");
            return false;
        }
        debug!(%uri, "import");
        if self.execute(Source::new(&uri, &program)) {
            self.storage.imported.push(uri);
            return true;
        }
        false
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
