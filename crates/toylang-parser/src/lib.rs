//! Toylang parser
//!
//! Recursive descent over the scanner's token stream with one token of
//! lookahead. Parse errors are reported through the notifier and recovered
//! with panic-mode synchronization (skip to the next `;` or Eof); the public
//! entry points keep producing statements until the stream is exhausted.

use std::rc::Rc;

use toylang_ast::{Expr, FnDecl, Import, Lit, Stmt, VarDecl, MAX_ARGS};
use toylang_lexer::{Diagnostic, Reporter, Scanner, Source, Token, TokenType};

/// Internal unwind signal for panic-mode recovery. Carries no payload; the
/// diagnostic has already been reported when this is raised.
struct Unwind;

type PResult<T> = Result<T, Unwind>;

pub struct Parser {
    scanner: Scanner,
    current: Token,
    previous: Token,
    notifier: Option<Rc<Reporter>>,
    /// True while parsing inside a block; `fn` declarations are rejected.
    scoped: bool,
}

impl Parser {
    pub fn new(source: Source, notifier: Rc<Reporter>) -> Self {
        Self::with_notifier(source, Some(notifier))
    }

    /// A parser that swallows diagnostics; used by [`Parser::is_expression`].
    pub fn quiet(source: Source) -> Self {
        Self::with_notifier(source, None)
    }

    fn with_notifier(source: Source, notifier: Option<Rc<Reporter>>) -> Self {
        let mut scanner = Scanner::new(source, notifier.clone());
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            previous: Token::default(),
            notifier,
            scoped: false,
        }
    }

    /// True iff `text` parses as a single expression followed by Eof. The
    /// REPL uses this to decide between evaluating and executing a line.
    pub fn is_expression(text: &str) -> bool {
        let mut parser = Self::quiet(Source::anonymous(text));
        parser.parse_expr().is_some() && parser.at_end()
    }

    /// Quietly parses `text` as a single expression.
    pub fn quiet_expression(text: &str) -> Option<Expr> {
        Self::quiet(Source::anonymous(text)).parse_expr()
    }

    /// Consumes one `import "<path>";` of the prologue, if present.
    pub fn parse_import(&mut self) -> Option<Import> {
        if !self.advance_if(&[TokenType::Import]) {
            return None;
        }
        self.finish_import().ok()
    }

    fn finish_import(&mut self) -> PResult<Import> {
        let path = self.consume(TokenType::String)?;
        self.consume(TokenType::Semicolon)?;
        Ok(Import { path })
    }

    /// Produces the next top-level statement, synchronizing past errors.
    /// Returns `None` once the token stream is exhausted.
    pub fn parse_stmt(&mut self) -> Option<Stmt> {
        while !self.at_end() {
            match self.declaration() {
                Ok(stmt) => return Some(stmt),
                Err(Unwind) => self.synchronize(),
            }
        }
        None
    }

    /// Produces the next expression. Entry is at the equality level: the
    /// expression form used by `evaluate` and the REPL does not accept
    /// assignment or logical operators at the top.
    pub fn parse_expr(&mut self) -> Option<Expr> {
        self.equality().ok()
    }

    pub fn at_end(&self) -> bool {
        self.current.is_eof()
    }

    // --- expression grammar, lowest to highest precedence ---

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.expr_or()?;
        if self.advance_if(&[TokenType::Eq]) {
            let eq = self.previous.clone();
            let value = self.assignment()?;
            return Ok(match expr {
                Expr::Var { name } => Expr::Assign {
                    name,
                    value: Box::new(value),
                },
                Expr::Get { obj, name } => Expr::Set {
                    obj,
                    name,
                    value: Box::new(value),
                },
                other => {
                    self.report(self.scanner.diagnostic(&eq, "Invalid assignment target", None));
                    other
                }
            });
        }
        Ok(expr)
    }

    fn expr_or(&mut self) -> PResult<Expr> {
        let mut expr = self.expr_and()?;
        while self.advance_if(&[TokenType::Or]) {
            let op = self.previous.clone();
            let rhs = self.expr_and()?;
            expr = Expr::Logical {
                lhs: Box::new(expr),
                op,
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn expr_and(&mut self) -> PResult<Expr> {
        let mut expr = self.equality()?;
        while self.advance_if(&[TokenType::And]) {
            let op = self.previous.clone();
            let rhs = self.equality()?;
            expr = Expr::Logical {
                lhs: Box::new(expr),
                op,
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> PResult<Expr> {
        let mut expr = self.comparison()?;
        while self.advance_if(&[TokenType::BangEq, TokenType::EqEq]) {
            let op = self.previous.clone();
            let rhs = self.comparison()?;
            expr = binary(expr, op, rhs);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut expr = self.term()?;
        while self.advance_if(&[TokenType::Gt, TokenType::Ge, TokenType::Lt, TokenType::Le]) {
            let op = self.previous.clone();
            let rhs = self.term()?;
            expr = binary(expr, op, rhs);
        }
        Ok(expr)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut expr = self.factor()?;
        while self.advance_if(&[TokenType::Minus, TokenType::Plus]) {
            let op = self.previous.clone();
            let rhs = self.factor()?;
            expr = binary(expr, op, rhs);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> PResult<Expr> {
        let mut expr = self.unary()?;
        while self.advance_if(&[TokenType::Slash, TokenType::Star]) {
            let op = self.previous.clone();
            let rhs = self.unary()?;
            expr = binary(expr, op, rhs);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.advance_if(&[TokenType::Bang, TokenType::Minus]) {
            let op = self.previous.clone();
            let rhs = self.unary()?;
            return Ok(Expr::Unary {
                op,
                rhs: Box::new(rhs),
            });
        }
        self.invoke()
    }

    fn invoke(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.advance_if(&[TokenType::ParenL]) {
                expr = self.finish_invoke(expr)?;
                continue;
            }
            if self.advance_if(&[TokenType::Dot]) {
                let name = self.consume(TokenType::Identifier)?;
                expr = Expr::Get {
                    obj: Box::new(expr),
                    name,
                };
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.at_end() {
            return Err(Unwind);
        }
        if self.advance_if(&[TokenType::False]) {
            return Ok(literal(Lit::Bool(false), self.previous.clone()));
        }
        if self.advance_if(&[TokenType::True]) {
            return Ok(literal(Lit::Bool(true), self.previous.clone()));
        }
        if self.advance_if(&[TokenType::Null]) {
            return Ok(literal(Lit::Null, self.previous.clone()));
        }
        if self.advance_if(&[TokenType::Number]) {
            let token = self.previous.clone();
            let value = token.lexeme().parse::<f64>().unwrap_or(0.0);
            return Ok(literal(Lit::Number(value), token));
        }
        if self.advance_if(&[TokenType::String]) {
            let token = self.previous.clone();
            let value = Lit::Str(token.lexeme().to_string());
            return Ok(literal(value, token));
        }
        if self.advance_if(&[TokenType::Identifier]) {
            return Ok(Expr::Var {
                name: self.previous.clone(),
            });
        }
        if self.advance_if(&[TokenType::ParenL]) {
            if self.at_end() {
                return self.unwind(Some(TokenType::ParenR), "Unexpected EOF", None);
            }
            let expr = self.expression()?;
            self.consume(TokenType::ParenR)?;
            return Ok(Expr::Group(Box::new(expr)));
        }
        self.report(
            self.scanner
                .diagnostic(&self.current, "Unexpected token", None),
        );
        Err(Unwind)
    }

    // --- statement grammar ---

    fn declaration(&mut self) -> PResult<Stmt> {
        if self.advance_if(&[TokenType::Struct]) {
            return self.decl_struct();
        }
        if self.advance_if(&[TokenType::Fn]) {
            return self.decl_fn();
        }
        if self.advance_if(&[TokenType::Var]) {
            return Ok(Stmt::Var(self.decl_var()?));
        }
        self.statement()
    }

    fn decl_fn(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenType::Identifier)?;
        let mut params = Vec::new();
        let mut arity = 0usize;
        self.consume(TokenType::ParenL)?;
        if !self.check(TokenType::ParenR) {
            loop {
                let param = self.consume(TokenType::Identifier)?;
                if params.len() < MAX_ARGS {
                    params.push(param);
                }
                arity += 1;
                if !self.advance_if(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::ParenR)?;
        self.consume(TokenType::BraceL)?;
        if self.scoped {
            return self.unwind(None, "fn only permitted in global scope", Some(name));
        }
        let body = self.block_body()?;
        if arity > MAX_ARGS {
            let message = args_overflow_message("parameters", arity);
            return self.unwind(Some(TokenType::ParenR), &message, None);
        }
        Ok(Stmt::Fn(Rc::new(FnDecl { name, params, body })))
    }

    fn decl_var(&mut self) -> PResult<VarDecl> {
        let name = self.consume(TokenType::Identifier)?;
        if name.lexeme().starts_with('_') {
            self.report(self.scanner.diagnostic(
                &name,
                "Identifiers starting with _ are reserved",
                None,
            ));
            return Err(Unwind);
        }
        let initializer = if self.advance_if(&[TokenType::Eq]) {
            self.expression()?
        } else {
            literal(Lit::Null, self.current.clone())
        };
        self.consume(TokenType::Semicolon)?;
        Ok(VarDecl { name, initializer })
    }

    fn decl_struct(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenType::Identifier)?;
        let mut fields = Vec::new();
        self.consume(TokenType::BraceL)?;
        if !self.advance_if(&[TokenType::BraceR]) {
            loop {
                if self.advance_if(&[TokenType::Fn]) {
                    let token = self.previous.clone();
                    self.decl_fn()?;
                    self.report(Diagnostic::warning(token, "fn not allowed in structs"));
                } else if self.advance_if(&[TokenType::Var]) {
                    fields.push(self.decl_var()?);
                } else {
                    return self.unwind(None, "Invalid statement in struct declaration", None);
                }
                if self.check(TokenType::BraceR) {
                    break;
                }
            }
            self.consume(TokenType::BraceR)?;
        }
        Ok(Stmt::Struct { name, fields })
    }

    fn statement(&mut self) -> PResult<Stmt> {
        if self.advance_if(&[TokenType::For]) {
            return self.stmt_for();
        }
        if self.advance_if(&[TokenType::If]) {
            return self.stmt_if();
        }
        if self.advance_if(&[TokenType::While]) {
            return self.stmt_while();
        }
        if self.advance_if(&[TokenType::BraceL]) {
            return Ok(Stmt::Block(self.block_body()?));
        }
        if self.advance_if(&[TokenType::Break]) {
            return self.stmt_break();
        }
        if self.advance_if(&[TokenType::Return]) {
            return self.stmt_return();
        }
        self.stmt_expr()
    }

    fn stmt_expr(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon)?;
        Ok(Stmt::Expr(expr))
    }

    fn stmt_break(&mut self) -> PResult<Stmt> {
        let token = self.previous.clone();
        self.consume(TokenType::Semicolon)?;
        Ok(Stmt::Break(token))
    }

    fn stmt_return(&mut self) -> PResult<Stmt> {
        let token = self.previous.clone();
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon)?;
        Ok(Stmt::Return { token, value })
    }

    fn stmt_if(&mut self) -> PResult<Stmt> {
        self.consume(TokenType::ParenL)?;
        let condition = self.expression()?;
        self.consume(TokenType::ParenR)?;
        if !self.advance_if(&[TokenType::BraceL]) {
            return self.unwind(Some(TokenType::BraceL), "Block required after if", None);
        }
        let then_branch = Stmt::Block(self.block_body()?);
        let else_branch = if self.advance_if(&[TokenType::Else]) {
            if !self.advance_if(&[TokenType::BraceL]) {
                return self.unwind(Some(TokenType::BraceL), "Block required after else", None);
            }
            Some(Box::new(Stmt::Block(self.block_body()?)))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn stmt_while(&mut self) -> PResult<Stmt> {
        self.consume(TokenType::ParenL)?;
        let condition = self.expression()?;
        self.consume(TokenType::ParenR)?;
        if !self.advance_if(&[TokenType::BraceL]) {
            return self.unwind(Some(TokenType::BraceL), "Block required after while", None);
        }
        let body = Stmt::Block(self.block_body()?);
        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    /// Desugars `for (init; cond; incr) stmt` into
    /// `{ init; while (cond) { stmt; incr; } }`.
    fn stmt_for(&mut self) -> PResult<Stmt> {
        self.consume(TokenType::ParenL)?;
        let mut outer = Vec::new();
        if !self.advance_if(&[TokenType::Semicolon]) {
            if self.advance_if(&[TokenType::Var]) {
                outer.push(Stmt::Var(self.decl_var()?));
            } else {
                outer.push(self.stmt_expr()?);
            }
        }
        let condition = if self.check(TokenType::Semicolon) {
            literal(Lit::Bool(true), Token::default())
        } else {
            self.expression()?
        };
        self.consume(TokenType::Semicolon)?;
        let increment = if self.check(TokenType::ParenR) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::ParenR)?;
        let mut inner = vec![self.statement()?];
        if let Some(increment) = increment {
            inner.push(Stmt::Expr(increment));
        }
        outer.push(Stmt::While {
            condition,
            body: Box::new(Stmt::Block(inner)),
        });
        Ok(Stmt::Block(outer))
    }

    fn block_body(&mut self) -> PResult<Vec<Stmt>> {
        let enclosing = self.scoped;
        self.scoped = true;
        let result = self.block_statements();
        self.scoped = enclosing;
        result
    }

    fn block_statements(&mut self) -> PResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.at_end() && !self.check(TokenType::BraceR) {
            statements.push(self.declaration()?);
        }
        self.consume(TokenType::BraceR)?;
        Ok(statements)
    }

    fn finish_invoke(&mut self, callee: Expr) -> PResult<Expr> {
        let mut args = Vec::new();
        let mut arity = 0usize;
        if !self.check(TokenType::ParenR) {
            loop {
                let arg = self.expression()?;
                if args.len() < MAX_ARGS {
                    args.push(arg);
                }
                arity += 1;
                if !self.advance_if(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        let close_paren = self.consume(TokenType::ParenR)?;
        if arity > MAX_ARGS {
            let message = args_overflow_message("arguments", arity);
            self.report(self.scanner.diagnostic(&close_paren, message, None));
        }
        Ok(Expr::Invoke {
            callee: Box::new(callee),
            close_paren,
            args,
        })
    }

    // --- token plumbing ---

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.scanner.next_token());
    }

    fn check(&self, ty: TokenType) -> bool {
        self.current.ty == ty
    }

    fn advance_if(&mut self, any_of: &[TokenType]) -> bool {
        if any_of.iter().any(|ty| self.check(*ty)) {
            self.advance();
            return true;
        }
        false
    }

    fn consume(&mut self, ty: TokenType) -> PResult<Token> {
        if self.check(ty) {
            self.advance();
            return Ok(self.previous.clone());
        }
        self.unwind(Some(ty), "Unexpected token", None)
    }

    /// Reports a diagnostic at `at` (the current token when absent) and
    /// raises the unwind signal.
    fn unwind<T>(
        &mut self,
        expected: Option<TokenType>,
        message: &str,
        at: Option<Token>,
    ) -> PResult<T> {
        let at = at.unwrap_or_else(|| self.current.clone());
        self.report(self.scanner.diagnostic(&at, message, expected));
        Err(Unwind)
    }

    fn report(&self, diag: Diagnostic) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(&diag);
        }
    }

    /// Panic-mode recovery: discard tokens until a `;` has been consumed or
    /// the stream ends.
    fn synchronize(&mut self) {
        self.advance();
        while !self.at_end() && self.previous.ty != TokenType::Semicolon {
            self.advance();
        }
    }
}

fn literal(value: Lit, token: Token) -> Expr {
    Expr::Literal { value, token }
}

fn binary(lhs: Expr, op: Token, rhs: Expr) -> Expr {
    Expr::Binary {
        lhs: Box::new(lhs),
        op,
        rhs: Box::new(rhs),
    }
}

fn args_overflow_message(kind: &str, arity: usize) -> String {
    format!("Too many {kind}: {arity} (max: {MAX_ARGS})")
}

#[cfg(test)]
mod tests;
