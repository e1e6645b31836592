//! Intrinsic functions.
//!
//! Host-implemented invocables bound in the global scope under reserved
//! `_`-prefixed names at interpreter construction. The parser keeps user
//! declarations out of that namespace.

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use toylang_lexer::{CharSpan, Location, Source, Token, TokenType};

use crate::interpreter::Interpreter;
use crate::value::{unescape, CallContext, Callable, Invocable, Value};

pub(crate) fn register(interpreter: &mut Interpreter) {
    define(interpreter, "_print", print);
    define(interpreter, "_printf", printf);
    define(interpreter, "_clone", clone);
    define(interpreter, "_str", str_);
    define(interpreter, "_now", now);
    define(interpreter, "_file", file);
    debug!("intrinsics registered");
}

fn define(
    interpreter: &mut Interpreter,
    name: &str,
    callback: fn(&mut Interpreter, CallContext) -> Value,
) {
    let invocable = Invocable {
        def: intrinsic_token(name),
        callable: Callable::Native(Rc::new(callback)),
    };
    interpreter
        .environment
        .define(name, Value::Invocable(invocable));
}

/// A synthesized defining token so intrinsics display as `<fn _name>`.
fn intrinsic_token(name: &str) -> Token {
    let source = Source::anonymous(name);
    let span = CharSpan::new(0, name.len());
    Token {
        ty: TokenType::Identifier,
        lexeme_span: span,
        location: Location {
            source,
            span,
            line: 1,
        },
    }
}

fn check_arg_count(
    interpreter: &mut Interpreter,
    ctx: &CallContext,
    name: &str,
    count: usize,
) -> bool {
    if ctx.args.len() != count {
        interpreter.runtime_error(&ctx.callee, format!("{name} requires {count} argument(s)"));
        return false;
    }
    true
}

/// `_print(...)`: space-joined arguments plus a newline; returns the
/// argument count.
fn print(interpreter: &mut Interpreter, ctx: CallContext) -> Value {
    let mut text = ctx
        .args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    text.push('\n');
    interpreter.write_out(&unescape(&text));
    Value::Number(ctx.args.len() as f64)
}

/// `_printf(fmt, ...)`: substitutes `{}` placeholders left to right;
/// placeholders beyond the argument list stay literal. Returns the number
/// of substitutions, -1 on a bad format.
fn printf(interpreter: &mut Interpreter, mut ctx: CallContext) -> Value {
    if ctx.args.is_empty() {
        return Value::Number(0.0);
    }
    let Value::Str(fmt) = ctx.args.remove(0) else {
        interpreter.runtime_error(&ctx.callee, "printf: Invalid fmt");
        return Value::Number(-1.0);
    };
    let mut out = String::new();
    let mut substituted = 0usize;
    let mut args = ctx.args.iter();
    let mut rest = fmt.as_str();
    while !rest.is_empty() {
        let Some(lbrace) = rest.find('{') else {
            out.push_str(rest);
            break;
        };
        let Some(rbrace) = rest[lbrace..].find('}') else {
            interpreter.runtime_error(&ctx.callee, "printf: Unterminated '{'");
            return Value::Number(-1.0);
        };
        out.push_str(&rest[..lbrace]);
        match args.next() {
            Some(value) => {
                out.push_str(&value.to_string());
                substituted += 1;
            }
            None => out.push_str("{}"),
        }
        rest = &rest[lbrace + rbrace + 1..];
    }
    interpreter.write_out(&unescape(&out));
    Value::Number(substituted as f64)
}

/// `_clone(v)`: deep copy of a struct instance's field map; other values
/// are returned unchanged.
fn clone(interpreter: &mut Interpreter, ctx: CallContext) -> Value {
    if !check_arg_count(interpreter, &ctx, "_clone", 1) {
        return Value::Null;
    }
    match &ctx.args[0] {
        Value::StructInst(instance) => Value::StructInst(instance.deep_clone()),
        other => other.clone(),
    }
}

/// `_str(v)`: the display string of the value.
fn str_(interpreter: &mut Interpreter, ctx: CallContext) -> Value {
    if !check_arg_count(interpreter, &ctx, "_str", 1) {
        return Value::Null;
    }
    Value::Str(ctx.args[0].to_string())
}

/// `_now()`: seconds since the epoch.
fn now(interpreter: &mut Interpreter, ctx: CallContext) -> Value {
    if !check_arg_count(interpreter, &ctx, "_now", 0) {
        return Value::Null;
    }
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Value::Number(seconds)
}

/// `_file(op, path, ...)`: `"read"` returns the contents (empty string when
/// unreadable), `"write"` and `"remove"` return success booleans.
fn file(interpreter: &mut Interpreter, ctx: CallContext) -> Value {
    if ctx.args.len() < 2 {
        interpreter.runtime_error(&ctx.callee, "_file: Requires at least two arguments");
        return Value::Null;
    }
    let (Value::Str(op), Value::Str(path)) = (&ctx.args[0], &ctx.args[1]) else {
        interpreter.runtime_error(&ctx.callee, "_file: Requires (string, string) arguments");
        return Value::Null;
    };
    match op.as_str() {
        "read" => Value::Str(std::fs::read_to_string(path).unwrap_or_default()),
        "write" => {
            if ctx.args.len() < 3 {
                interpreter
                    .runtime_error(&ctx.callee, "_file.write: Requires (string, string, string) arguments");
                return Value::Null;
            }
            let Value::Str(contents) = &ctx.args[2] else {
                interpreter.runtime_error(&ctx.callee, "_file.write: Invalid contents");
                return Value::Null;
            };
            Value::Bool(std::fs::write(path, contents).is_ok())
        }
        "remove" => Value::Bool(std::fs::remove_file(path).is_ok()),
        _ => {
            interpreter.runtime_error(&ctx.callee, "_file: Invalid operation");
            Value::Null
        }
    }
}
