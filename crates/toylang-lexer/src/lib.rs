//! Toylang lexer
//!
//! Source text handles, byte-precise locations, the token set, the scanner,
//! and the diagnostic records it reports through.

mod diag;
mod scanner;
mod source;
mod token;

pub use diag::{format_diagnostic, Diagnostic, DiagnosticKind, Notify, Reporter};
pub use scanner::Scanner;
pub use source::{CharSpan, Location, Source};
pub use token::{Token, TokenType};
