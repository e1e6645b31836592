//! Runtime values.
//!
//! A tagged union over the seven value kinds. Struct instances share their
//! field map between aliases; invocables carry either a native callback or
//! the function declaration they were built from. Everything is reference
//! counted for single-threaded sharing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use toylang_ast::{FnDecl, Lit};
use toylang_lexer::Token;

use crate::interpreter::Interpreter;

/// Arguments to an invocable, anchored at the call's closing parenthesis
/// (or the callee token for intrinsic-reported errors).
pub struct CallContext {
    pub callee: Token,
    pub args: Vec<Value>,
}

/// Host callback backing an intrinsic.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, CallContext) -> Value>;

#[derive(Clone)]
pub enum Callable {
    Native(NativeFn),
    Script(Rc<FnDecl>),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => f.write_str("Native"),
            Callable::Script(decl) => write!(f, "Script({})", decl.name.lexeme()),
        }
    }
}

/// A callable value: a `fn` declaration or a registered intrinsic.
#[derive(Debug, Clone)]
pub struct Invocable {
    pub def: Token,
    pub callable: Callable,
}

/// A struct definition: a name plus the declared field names.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: Rc<str>,
    pub fields: Rc<[Rc<str>]>,
}

impl StructDef {
    /// A fresh instance with every declared field set to null.
    pub fn instance(&self) -> StructInst {
        let fields = self
            .fields
            .iter()
            .map(|name| (name.clone(), Value::Null))
            .collect();
        StructInst {
            def: self.clone(),
            fields: Rc::new(RefCell::new(fields)),
        }
    }
}

/// A struct instance. The field map is shared by reference among aliases;
/// `deep_clone` is the only way to fork it.
#[derive(Debug, Clone)]
pub struct StructInst {
    pub def: StructDef,
    pub fields: Rc<RefCell<HashMap<Rc<str>, Value>>>,
}

impl StructInst {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// Overwrites a declared field; false when the field does not exist.
    pub fn set(&self, name: &str, value: Value) -> bool {
        match self.fields.borrow_mut().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn deep_clone(&self) -> StructInst {
        StructInst {
            def: self.def.clone(),
            fields: Rc::new(RefCell::new(self.fields.borrow().clone())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Invocable(Invocable),
    StructDef(StructDef),
    StructInst(StructInst),
}

impl Value {
    /// Converts a parsed literal; string literals are unescaped here.
    pub fn from_lit(lit: &Lit) -> Value {
        match lit {
            Lit::Null => Value::Null,
            Lit::Bool(b) => Value::Bool(*b),
            Lit::Number(d) => Value::Number(*d),
            Lit::Str(s) => Value::Str(unescape(s)),
        }
    }

    /// Null and false are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }
}

pub(crate) fn fmt_number(d: f64) -> String {
    let i = d as i64;
    if i as f64 == d {
        i.to_string()
    } else {
        d.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Number(d) => f.write_str(&fmt_number(*d)),
            Value::Str(s) => f.write_str(s),
            Value::Invocable(i) => write!(f, "<fn {}>", i.def.lexeme()),
            Value::StructDef(d) => f.write_str(&d.name),
            Value::StructInst(i) => write!(f, "{} instance", i.def.name),
        }
    }
}

/// Heterogeneous equality, driven by the left operand's kind. Strings only
/// compare to strings; bools and numbers fall back to comparing truthiness
/// against non-string, non-matching kinds; instances compare by definition
/// name plus field-map identity (an aliasing test).
impl PartialEq for Value {
    fn eq(&self, rhs: &Value) -> bool {
        match self {
            Value::Null => matches!(rhs, Value::Null),
            Value::Bool(b) => {
                if matches!(rhs, Value::Str(_)) {
                    return false;
                }
                *b == rhs.is_truthy()
            }
            Value::Number(ld) => match rhs {
                Value::Number(rd) => ld == rd,
                Value::Str(_) => false,
                _ => rhs.is_truthy(),
            },
            Value::Str(ls) => matches!(rhs, Value::Str(rs) if ls == rs),
            Value::Invocable(li) => {
                matches!(rhs, Value::Invocable(ri) if li.def.lexeme() == ri.def.lexeme())
            }
            Value::StructDef(ld) => matches!(rhs, Value::StructDef(rd) if ld.name == rd.name),
            Value::StructInst(li) => matches!(
                rhs,
                Value::StructInst(ri)
                    if li.def.name == ri.def.name && Rc::ptr_eq(&li.fields, &ri.fields)
            ),
        }
    }
}

/// Resolves `\n` and `\t`; any other backslash escape keeps the escaped
/// character with the backslash dropped.
pub fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
