//! Fully-parenthesized expression printer.
//!
//! The output re-parses to an equivalent tree (same shape ignoring groups),
//! which the round-trip tests rely on.

use crate::{Expr, Lit};

/// Renders `expr` with explicit parentheses, e.g. `((1 + 2) * x)`.
pub fn expr_to_string(expr: &Expr) -> String {
    let mut out = String::new();
    append_expr(&mut out, expr);
    out
}

fn fmt_number(d: f64) -> String {
    let i = d as i64;
    if i as f64 == d {
        i.to_string()
    } else {
        d.to_string()
    }
}

fn append_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Literal { value, .. } => match value {
            Lit::Null => out.push_str("null"),
            Lit::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Lit::Number(d) => out.push_str(&fmt_number(*d)),
            Lit::Str(s) => {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
        },
        Expr::Group(inner) => {
            out.push('(');
            append_expr(out, inner);
            out.push(')');
        }
        Expr::Unary { op, rhs } => {
            out.push('(');
            out.push_str(op.lexeme());
            append_expr(out, rhs);
            out.push(')');
        }
        Expr::Binary { lhs, op, rhs } | Expr::Logical { lhs, op, rhs } => {
            out.push('(');
            append_expr(out, lhs);
            out.push(' ');
            out.push_str(op.lexeme());
            out.push(' ');
            append_expr(out, rhs);
            out.push(')');
        }
        Expr::Var { name } => out.push_str(name.lexeme()),
        Expr::Assign { name, value } => {
            out.push('(');
            out.push_str(name.lexeme());
            out.push_str(" = ");
            append_expr(out, value);
            out.push(')');
        }
        Expr::Invoke { callee, args, .. } => {
            append_expr(out, callee);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                append_expr(out, arg);
            }
            out.push(')');
        }
        Expr::Get { obj, name } => {
            append_expr(out, obj);
            out.push('.');
            out.push_str(name.lexeme());
        }
        Expr::Set { obj, name, value } => {
            out.push('(');
            append_expr(out, obj);
            out.push('.');
            out.push_str(name.lexeme());
            out.push_str(" = ");
            append_expr(out, value);
            out.push(')');
        }
    }
}
