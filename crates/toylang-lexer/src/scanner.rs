//! Byte-wise scanner.
//!
//! Maintains a `{first, last, line}` cursor over the source text. Each call
//! to [`Scanner::next_token`] scans one token and re-anchors the cursor;
//! once input is exhausted, Eof tokens are produced indefinitely. Invalid
//! input is reported through the notifier and scanning continues.

use std::rc::Rc;

use crate::diag::{Diagnostic, Reporter};
use crate::source::{CharSpan, Location, Source};
use crate::token::{Token, TokenType, KEYWORD_TOKENS, SINGLE_TOKENS};

pub struct Scanner {
    source: Source,
    span: CharSpan,
    line: u32,
    notifier: Option<Rc<Reporter>>,
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn starts_identifier(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn continues_identifier(c: u8) -> bool {
    starts_identifier(c) || is_digit(c)
}

impl Scanner {
    pub fn new(source: Source, notifier: Option<Rc<Reporter>>) -> Self {
        Self {
            source,
            span: CharSpan::default(),
            line: 1,
            notifier,
        }
    }

    pub fn next_token(&mut self) -> Token {
        let token = self.scan_token();
        self.span.first = self.span.last;
        token
    }

    /// Builds a syntax error anchored at `token`. The parser reuses this so
    /// its diagnostics carry the same shape as the scanner's.
    pub fn diagnostic(
        &self,
        token: &Token,
        message: impl Into<String>,
        expected: Option<TokenType>,
    ) -> Diagnostic {
        let mut diag = Diagnostic::syntax_error(token.clone(), message);
        diag.expected = expected;
        diag
    }

    fn notify(&self, diag: Diagnostic) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(&diag);
        }
    }

    fn text(&self) -> &str {
        &self.source.text
    }

    fn at_end(&self) -> bool {
        self.span.last >= self.text().len()
    }

    fn peek(&self) -> u8 {
        self.text().as_bytes().get(self.span.last).copied().unwrap_or(0)
    }

    fn peek_next(&self) -> u8 {
        self.text()
            .as_bytes()
            .get(self.span.last + 1)
            .copied()
            .unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.text().as_bytes()[self.span.last];
        self.span.last += 1;
        c
    }

    fn advance_if(&mut self, expected: u8) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.span.last += 1;
        true
    }

    fn location(&self) -> Location {
        Location {
            source: self.source.clone(),
            span: self.span,
            line: self.line,
        }
    }

    fn make_token(&self, ty: TokenType) -> Token {
        Token {
            ty,
            lexeme_span: self.span,
            location: self.location(),
        }
    }

    /// Consumes `keyword` if it prefixes the remaining text. Deliberately a
    /// prefix match, not a longest-munch: `format` scans as `for` + `mat`.
    fn munch(&mut self, keyword: &str, ty: TokenType) -> Option<Token> {
        let rest = &self.text()[self.span.first..];
        if !rest.starts_with(keyword) {
            return None;
        }
        self.span.last = self.span.first + keyword.len();
        Some(self.make_token(ty))
    }

    fn make_string(&mut self) -> Option<Token> {
        while self.peek() != b'"' && !self.at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.at_end() {
            let diag = self.diagnostic(&self.make_token(TokenType::String), "Unterminated string", None);
            self.notify(diag);
            return None;
        }
        // closing "
        self.advance();
        Some(Token {
            ty: TokenType::String,
            lexeme_span: CharSpan::new(self.span.first + 1, self.span.last - 1),
            location: self.location(),
        })
    }

    fn make_number(&mut self) -> Token {
        while is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == b'.' && is_digit(self.peek_next()) {
            // .
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        self.make_token(TokenType::Number)
    }

    fn make_identifier(&mut self) -> Token {
        for ty in KEYWORD_TOKENS {
            if let Some(token) = self.munch(ty.text(), ty) {
                return token;
            }
        }
        while !self.at_end() && continues_identifier(self.peek()) {
            self.advance();
        }
        self.make_token(TokenType::Identifier)
    }

    fn try_single(&self, c: u8) -> Option<Token> {
        SINGLE_TOKENS
            .into_iter()
            .find(|ty| ty.text().as_bytes()[0] == c)
            .map(|ty| self.make_token(ty))
    }

    fn try_double(&mut self, c: u8) -> Option<Token> {
        let ty = match c {
            b'!' => {
                if self.advance_if(b'=') {
                    TokenType::BangEq
                } else {
                    TokenType::Bang
                }
            }
            b'=' => {
                if self.advance_if(b'=') {
                    TokenType::EqEq
                } else {
                    TokenType::Eq
                }
            }
            b'<' => {
                if self.advance_if(b'=') {
                    TokenType::Le
                } else {
                    TokenType::Lt
                }
            }
            b'>' => {
                if self.advance_if(b'=') {
                    TokenType::Ge
                } else {
                    TokenType::Gt
                }
            }
            _ => return None,
        };
        Some(self.make_token(ty))
    }

    fn ignore(&mut self, c: u8) -> bool {
        match c {
            b' ' | b'\t' => {
                self.span.first += 1;
                true
            }
            b'\n' => {
                self.span.first += 1;
                self.line += 1;
                true
            }
            _ => false,
        }
    }

    fn skip_comment(&mut self) -> bool {
        if !self.advance_if(b'/') {
            return false;
        }
        while self.peek() != b'\n' && !self.at_end() {
            self.advance();
        }
        true
    }

    fn scan_token(&mut self) -> Token {
        while !self.at_end() {
            let c = self.advance();
            if self.ignore(c) {
                continue;
            }
            if c == b'"' {
                match self.make_string() {
                    Some(token) => return token,
                    None => continue,
                }
            }
            if c == b'/' {
                if self.skip_comment() {
                    self.span.first = self.span.last;
                    continue;
                }
                return self.make_token(TokenType::Slash);
            }
            if let Some(token) = self.try_single(c) {
                return token;
            }
            if let Some(token) = self.try_double(c) {
                return token;
            }
            if is_digit(c) {
                return self.make_number();
            }
            if starts_identifier(c) {
                return self.make_identifier();
            }
            let diag = self.diagnostic(&self.make_token(TokenType::Eof), "Unexpected token", None);
            self.notify(diag);
            self.span.first = self.span.last;
        }
        self.make_token(TokenType::Eof)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::diag::{DiagnosticKind, Notify};

    #[derive(Default, Clone)]
    struct Collect(Rc<RefCell<Vec<Diagnostic>>>);

    impl Notify for Collect {
        fn notify(&mut self, diag: &Diagnostic) {
            self.0.borrow_mut().push(diag.clone());
        }
    }

    fn scan_all(text: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(Source::anonymous(text), None);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.next_token();
            if token.is_eof() {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    fn types(tokens: &[Token]) -> Vec<TokenType> {
        tokens.iter().map(|t| t.ty).collect()
    }

    #[test]
    fn scans_punctuation_and_operators() {
        let tokens = scan_all("+ - * / , . ; { } ( ) ! != = == > >= < <=");
        assert_eq!(
            types(&tokens),
            vec![
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::Comma,
                TokenType::Dot,
                TokenType::Semicolon,
                TokenType::BraceL,
                TokenType::BraceR,
                TokenType::ParenL,
                TokenType::ParenR,
                TokenType::Bang,
                TokenType::BangEq,
                TokenType::Eq,
                TokenType::EqEq,
                TokenType::Gt,
                TokenType::Ge,
                TokenType::Lt,
                TokenType::Le,
            ]
        );
    }

    #[test]
    fn scans_var_declaration() {
        let tokens = scan_all("var answer = 42;");
        assert_eq!(
            types(&tokens),
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Eq,
                TokenType::Number,
                TokenType::Semicolon,
            ]
        );
        assert_eq!(tokens[1].lexeme(), "answer");
        assert_eq!(tokens[3].lexeme(), "42");
    }

    #[test]
    fn keywords_match_by_prefix() {
        // The keyword table is attempted as prefix matches, so an identifier
        // starting with a keyword splits at the keyword boundary.
        let tokens = scan_all("format");
        assert_eq!(types(&tokens), vec![TokenType::For, TokenType::Identifier]);
        assert_eq!(tokens[0].lexeme(), "for");
        assert_eq!(tokens[1].lexeme(), "mat");
    }

    #[test]
    fn number_dot_without_digit_is_not_consumed() {
        let tokens = scan_all("1.foo");
        assert_eq!(
            types(&tokens),
            vec![TokenType::Number, TokenType::Dot, TokenType::Identifier]
        );
        assert_eq!(tokens[0].lexeme(), "1");
    }

    #[test]
    fn scans_fractional_number() {
        let tokens = scan_all("3.25");
        assert_eq!(types(&tokens), vec![TokenType::Number]);
        assert_eq!(tokens[0].lexeme(), "3.25");
    }

    #[test]
    fn string_lexeme_excludes_quotes() {
        let tokens = scan_all("\"hello world\"");
        assert_eq!(types(&tokens), vec![TokenType::String]);
        assert_eq!(tokens[0].lexeme(), "hello world");
        assert_eq!(tokens[0].location.span, CharSpan::new(0, 13));
    }

    #[test]
    fn string_counts_embedded_newlines() {
        let mut scanner = Scanner::new(Source::anonymous("\"a\nb\" x"), None);
        let string = scanner.next_token();
        assert_eq!(string.ty, TokenType::String);
        assert_eq!(string.location.line, 2);
        let ident = scanner.next_token();
        assert_eq!(ident.location.line, 2);
    }

    #[test]
    fn unterminated_string_reports_once_then_eof() {
        let seen = Collect::default();
        let reporter = Rc::new(Reporter::with_notifier(Box::new(seen.clone())));
        let mut scanner = Scanner::new(Source::anonymous("\"oops"), Some(reporter));
        assert!(scanner.next_token().is_eof());
        assert!(scanner.next_token().is_eof());
        let diags = seen.0.borrow();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::SyntaxError);
        assert_eq!(diags[0].message, "Unterminated string");
    }

    #[test]
    fn unexpected_byte_reports_and_resumes() {
        let seen = Collect::default();
        let reporter = Rc::new(Reporter::with_notifier(Box::new(seen.clone())));
        let mut scanner = Scanner::new(Source::anonymous("@ 1"), Some(reporter));
        let token = scanner.next_token();
        assert_eq!(token.ty, TokenType::Number);
        assert_eq!(seen.0.borrow().len(), 1);
        assert_eq!(seen.0.borrow()[0].message, "Unexpected token");
    }

    #[test]
    fn comments_and_newlines_are_skipped() {
        let tokens = scan_all("1 // one\n2 / 3");
        assert_eq!(
            types(&tokens),
            vec![
                TokenType::Number,
                TokenType::Number,
                TokenType::Slash,
                TokenType::Number,
            ]
        );
        assert_eq!(tokens[1].location.line, 2);
    }

    #[test]
    fn eof_is_produced_indefinitely() {
        let mut scanner = Scanner::new(Source::anonymous(""), None);
        for _ in 0..4 {
            assert!(scanner.next_token().is_eof());
        }
    }

    #[test]
    fn lexeme_matches_location_span() {
        for token in scan_all("var x = 1 + 2.5; _print(\"a\");") {
            let text = token.location.source.text.clone();
            if token.ty == TokenType::String {
                let inner = CharSpan::new(token.location.span.first + 1, token.location.span.last - 1);
                assert_eq!(token.lexeme(), inner.view(&text));
            } else {
                assert_eq!(token.lexeme(), token.location.span.view(&text));
            }
        }
    }

    #[test]
    fn rescan_of_joined_lexemes_matches() {
        // Scanning then joining lexemes with spaces reproduces the source
        // modulo whitespace and comments.
        let source = "var a=1; // trailing\nif (a >= 1) { _print(a); }";
        let first = scan_all(source);
        let joined = first
            .iter()
            .map(|t| {
                if t.ty == TokenType::String {
                    format!("\"{}\"", t.lexeme())
                } else {
                    t.lexeme().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let second = scan_all(&joined);
        assert_eq!(types(&first), types(&second));
        let lexemes = |tokens: &[Token]| {
            tokens
                .iter()
                .map(|t| t.lexeme().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(lexemes(&first), lexemes(&second));
    }

    proptest! {
        #[test]
        fn lexeme_location_invariant_holds(parts in proptest::collection::vec(
            prop_oneof![
                Just("var".to_string()),
                Just(";".to_string()),
                Just("==".to_string()),
                Just("(".to_string()),
                Just(")".to_string()),
                "[a-z]{1,6}",
                "[0-9]{1,4}",
                "[0-9]{1,3}\\.[0-9]{1,3}",
            ],
            0..24,
        )) {
            let text = parts.join(" ");
            for token in scan_all(&text) {
                let full = token.location.source.text.clone();
                prop_assert_eq!(token.lexeme(), token.location.span.view(&full));
            }
        }
    }
}
