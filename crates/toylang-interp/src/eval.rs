//! Expression evaluation and statement execution.
//!
//! Non-local control transfers are modeled as outcomes carried in `Result`:
//! loops convert `Break` back to normal completion, calls convert `Return`
//! into the call's value, and `Halt` (a reported evaluation error) unwinds
//! to the nearest statement boundary where the error flag is latched.

use std::cmp::Ordering;
use std::rc::Rc;

use toylang_ast::{Expr, FnDecl, Stmt};
use toylang_lexer::{Token, TokenType};

use crate::interpreter::{DebugFlags, Interpreter};
use crate::value::{CallContext, Callable, Invocable, StructDef, Value};

#[derive(Debug, Clone)]
pub enum Transfer {
    Break(Token),
    Return(Token, Option<Value>),
    /// An evaluation error whose diagnostic has already been reported;
    /// unwinds to the top-level statement boundary.
    Halt,
}

pub type EvalResult = Result<Value, Transfer>;
pub type ExecResult = Result<(), Transfer>;

impl Interpreter {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal { value, .. } => Ok(Value::from_lit(value)),
            Expr::Group(inner) => self.eval_expr(inner),
            Expr::Unary { op, rhs } => self.eval_unary(op, rhs),
            Expr::Binary { lhs, op, rhs } => self.eval_binary(lhs, op, rhs),
            Expr::Var { name } => self.eval_var(name),
            Expr::Assign { name, value } => self.eval_assign(name, value),
            Expr::Logical { lhs, op, rhs } => self.eval_logical(lhs, op, rhs),
            Expr::Invoke {
                callee,
                close_paren,
                args,
            } => self.eval_invoke(callee, close_paren, args),
            Expr::Get { obj, name } => self.eval_get(obj, name),
            Expr::Set { obj, name, value } => self.eval_set(obj, name, value),
        }
    }

    fn eval_unary(&mut self, op: &Token, rhs: &Expr) -> EvalResult {
        let value = self.eval_expr(rhs)?;
        match op.ty {
            TokenType::Minus => match value {
                Value::Number(d) => Ok(Value::Number(-d)),
                _ => {
                    self.runtime_error_expecting(
                        op,
                        "Invalid operand to unary expression",
                        TokenType::Number,
                    );
                    Err(Transfer::Halt)
                }
            },
            TokenType::Bang => Ok(Value::Bool(!value.is_truthy())),
            _ => {
                self.internal_error(op, "Unexpected unary operator");
                Ok(Value::Null)
            }
        }
    }

    fn eval_binary(&mut self, lhs: &Expr, op: &Token, rhs: &Expr) -> EvalResult {
        let lhs = self.eval_expr(lhs)?;
        let rhs = self.eval_expr(rhs)?;
        match op.ty {
            TokenType::Minus => {
                let (l, r) = self.expect_numbers(op, &lhs, &rhs)?;
                Ok(Value::Number(l - r))
            }
            TokenType::Star => {
                let (l, r) = self.expect_numbers(op, &lhs, &rhs)?;
                Ok(Value::Number(l * r))
            }
            TokenType::Slash => {
                // Division by zero follows IEEE-754; no diagnostic.
                let (l, r) = self.expect_numbers(op, &lhs, &rhs)?;
                Ok(Value::Number(l / r))
            }
            TokenType::Plus => match (lhs, rhs) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::Str(l), Value::Str(r)) => Ok(Value::Str(l + &r)),
                _ => {
                    self.runtime_error(op, "Invalid operands to binary expression");
                    Err(Transfer::Halt)
                }
            },
            TokenType::EqEq => Ok(Value::Bool(lhs == rhs)),
            TokenType::BangEq => Ok(Value::Bool(lhs != rhs)),
            TokenType::Lt => Ok(Value::Bool(matches!(
                self.compare(op, &lhs, &rhs)?,
                Some(Ordering::Less)
            ))),
            TokenType::Le => Ok(Value::Bool(matches!(
                self.compare(op, &lhs, &rhs)?,
                Some(Ordering::Less | Ordering::Equal)
            ))),
            TokenType::Gt => Ok(Value::Bool(matches!(
                self.compare(op, &lhs, &rhs)?,
                Some(Ordering::Greater)
            ))),
            TokenType::Ge => Ok(Value::Bool(matches!(
                self.compare(op, &lhs, &rhs)?,
                Some(Ordering::Greater | Ordering::Equal)
            ))),
            _ => {
                self.internal_error(op, "Unexpected binary operator");
                Ok(Value::Null)
            }
        }
    }

    fn expect_numbers(
        &mut self,
        op: &Token,
        lhs: &Value,
        rhs: &Value,
    ) -> Result<(f64, f64), Transfer> {
        match (lhs, rhs) {
            (Value::Number(l), Value::Number(r)) => Ok((*l, *r)),
            _ => {
                self.runtime_error_expecting(
                    op,
                    "Invalid operands to binary expression",
                    TokenType::Number,
                );
                Err(Transfer::Halt)
            }
        }
    }

    /// Numbers compare numerically (NaN is unordered), strings
    /// lexicographically; anything else is a runtime error.
    fn compare(
        &mut self,
        op: &Token,
        lhs: &Value,
        rhs: &Value,
    ) -> Result<Option<Ordering>, Transfer> {
        match (lhs, rhs) {
            (Value::Number(l), Value::Number(r)) => Ok(l.partial_cmp(r)),
            (Value::Str(l), Value::Str(r)) => Ok(Some(l.cmp(r))),
            _ => {
                self.runtime_error(op, "Invalid operands to binary expression");
                Err(Transfer::Halt)
            }
        }
    }

    fn eval_var(&mut self, name: &Token) -> EvalResult {
        if let Some(value) = self.environment.find(name.lexeme()) {
            return Ok(value.clone());
        }
        self.runtime_error(name, "Undefined variable");
        Err(Transfer::Halt)
    }

    fn eval_assign(&mut self, name: &Token, value: &Expr) -> EvalResult {
        if self.environment.find(name.lexeme()).is_none() {
            self.runtime_error(name, "Undefined variable");
            return Ok(Value::Null);
        }
        let value = self.eval_expr(value)?;
        self.expect_assignable(name, &value)?;
        self.environment.assign(name.lexeme(), value.clone());
        Ok(value)
    }

    fn eval_logical(&mut self, lhs: &Expr, op: &Token, rhs: &Expr) -> EvalResult {
        let lhs = self.eval_expr(lhs)?;
        match op.ty {
            TokenType::Or if lhs.is_truthy() => Ok(lhs),
            TokenType::And if !lhs.is_truthy() => Ok(lhs),
            _ => self.eval_expr(rhs),
        }
    }

    fn eval_invoke(&mut self, callee: &Expr, close_paren: &Token, args: &[Expr]) -> EvalResult {
        let callee = self.eval_expr(callee)?;
        match callee {
            Value::Invocable(invocable) => {
                let args = self.eval_args(args)?;
                let ctx = CallContext {
                    callee: close_paren.clone(),
                    args,
                };
                match invocable.callable {
                    Callable::Native(callback) => Ok(callback(self, ctx)),
                    Callable::Script(decl) => self.call_script(&decl, ctx),
                }
            }
            Value::StructDef(def) => {
                self.eval_args(args)?;
                Ok(Value::StructInst(def.instance()))
            }
            _ => {
                self.runtime_error(close_paren, "Invalid callee");
                Ok(Value::Null)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, Transfer> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg)?);
        }
        Ok(values)
    }

    fn call_script(&mut self, decl: &Rc<FnDecl>, ctx: CallContext) -> EvalResult {
        self.environment.push_frame();
        let result = self.run_call(decl, ctx);
        self.environment.pop_frame();
        result
    }

    fn run_call(&mut self, decl: &FnDecl, ctx: CallContext) -> EvalResult {
        if decl.params.len() != ctx.args.len() {
            self.runtime_error(
                &ctx.callee,
                format!(
                    "Mismatched argument count: expected {} passed: {}",
                    decl.params.len(),
                    ctx.args.len()
                ),
            );
            return Ok(Value::Null);
        }
        for (param, value) in decl.params.iter().zip(ctx.args) {
            self.environment.define(param.lexeme(), value);
        }
        match self.exec_block(&decl.body) {
            Ok(()) => Ok(Value::Null),
            Err(Transfer::Return(_, value)) => Ok(value.unwrap_or_default()),
            Err(other) => Err(other),
        }
    }

    fn eval_get(&mut self, obj: &Expr, name: &Token) -> EvalResult {
        let value = self.eval_expr(obj)?;
        let Value::StructInst(instance) = value else {
            self.runtime_error(name, "Only instances have properties");
            return Err(Transfer::Halt);
        };
        match instance.get(name.lexeme()) {
            Some(field) => Ok(field),
            None => {
                self.runtime_error(name, "Undefined property");
                Err(Transfer::Halt)
            }
        }
    }

    fn eval_set(&mut self, obj: &Expr, name: &Token, value: &Expr) -> EvalResult {
        let obj = self.eval_expr(obj)?;
        let Value::StructInst(instance) = obj else {
            self.runtime_error(name, "Only instances have fields");
            return Err(Transfer::Halt);
        };
        let value = self.eval_expr(value)?;
        if !instance.set(name.lexeme(), value.clone()) {
            self.runtime_error(name, "Undefined property");
            return Err(Transfer::Halt);
        }
        Ok(value)
    }

    fn expect_assignable(&mut self, name: &Token, value: &Value) -> ExecResult {
        if matches!(value, Value::StructDef(_)) {
            self.runtime_error(name, "Cannot initialize variable as a struct");
            return Err(Transfer::Halt);
        }
        Ok(())
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> ExecResult {
        match stmt {
            Stmt::Expr(expr) => {
                let value = self.eval_expr(expr)?;
                if self.debug.contains(DebugFlags::PRINT_STMT_EXPRS) {
                    self.write_out(&format!("[Debug] {value}\n"));
                }
                Ok(())
            }
            Stmt::Var(decl) => {
                let value = self.eval_expr(&decl.initializer)?;
                self.expect_assignable(&decl.name, &value)?;
                self.environment.define(decl.name.lexeme(), value);
                Ok(())
            }
            Stmt::Block(statements) => {
                self.environment.begin_scope();
                let result = self.exec_block(statements);
                self.environment.end_scope();
                result
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.exec_stmt(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => loop {
                if !self.eval_expr(condition)?.is_truthy() {
                    return Ok(());
                }
                match self.exec_stmt(body) {
                    Ok(()) => {}
                    Err(Transfer::Break(_)) => return Ok(()),
                    Err(other) => return Err(other),
                }
            },
            Stmt::Break(token) => Err(Transfer::Break(token.clone())),
            Stmt::Fn(decl) => {
                let invocable = Invocable {
                    def: decl.name.clone(),
                    callable: Callable::Script(decl.clone()),
                };
                self.environment
                    .define(decl.name.lexeme(), Value::Invocable(invocable));
                Ok(())
            }
            Stmt::Return { token, value } => {
                let value = match value {
                    Some(value) => Some(self.eval_expr(value)?),
                    None => None,
                };
                Err(Transfer::Return(token.clone(), value))
            }
            Stmt::Struct { name, fields } => {
                // Field initializers are parsed but ignored; instances start
                // with every field null.
                let def = StructDef {
                    name: Rc::from(name.lexeme()),
                    fields: fields
                        .iter()
                        .map(|field| Rc::from(field.name.lexeme()))
                        .collect::<Vec<_>>()
                        .into(),
                };
                self.environment
                    .define(name.lexeme(), Value::StructDef(def));
                Ok(())
            }
        }
    }

    /// Runs a statement list in order. Once the error flag latches, the
    /// remaining statements are skipped; Break/Return/Halt all unwind the
    /// list (enclosing scopes and frames are released by their owners).
    pub(crate) fn exec_block(&mut self, statements: &[Stmt]) -> ExecResult {
        for stmt in statements {
            if self.is_errored() {
                break;
            }
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }
}
