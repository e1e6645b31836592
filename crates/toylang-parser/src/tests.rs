use std::cell::RefCell;

use pretty_assertions::assert_eq;

use super::*;
use toylang_lexer::{DiagnosticKind, Notify};

#[derive(Default, Clone)]
struct Collect(Rc<RefCell<Vec<Diagnostic>>>);

impl Notify for Collect {
    fn notify(&mut self, diag: &Diagnostic) {
        self.0.borrow_mut().push(diag.clone());
    }
}

fn parser_for(text: &str) -> (Parser, Collect) {
    let seen = Collect::default();
    let reporter = Rc::new(Reporter::with_notifier(Box::new(seen.clone())));
    (Parser::new(Source::anonymous(text), reporter), seen)
}

fn parse_all(text: &str) -> (Vec<Stmt>, Vec<Diagnostic>) {
    let (mut parser, seen) = parser_for(text);
    let mut statements = Vec::new();
    while let Some(stmt) = parser.parse_stmt() {
        statements.push(stmt);
    }
    let diags = seen.0.borrow().clone();
    (statements, diags)
}

fn parse_clean(text: &str) -> Vec<Stmt> {
    let (statements, diags) = parse_all(text);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    statements
}

#[test]
fn parses_var_with_initializer() {
    let statements = parse_clean("var x = 1 + 2;");
    let [Stmt::Var(decl)] = statements.as_slice() else {
        panic!("expected var, got {statements:?}");
    };
    assert_eq!(decl.name.lexeme(), "x");
    assert!(matches!(decl.initializer, Expr::Binary { .. }));
}

#[test]
fn var_without_initializer_defaults_to_null() {
    let statements = parse_clean("var x;");
    let [Stmt::Var(decl)] = statements.as_slice() else {
        panic!("expected var");
    };
    assert!(matches!(
        decl.initializer,
        Expr::Literal {
            value: Lit::Null,
            ..
        }
    ));
}

#[test]
fn reserved_identifier_is_rejected() {
    let (statements, diags) = parse_all("var _x = 1;");
    assert!(statements.is_empty());
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::SyntaxError);
    assert_eq!(diags[0].message, "Identifiers starting with _ are reserved");
}

#[test]
fn parses_function_declaration() {
    let statements = parse_clean("fn add(a, b) { return a + b; }");
    let [Stmt::Fn(decl)] = statements.as_slice() else {
        panic!("expected fn");
    };
    assert_eq!(decl.name.lexeme(), "add");
    assert_eq!(decl.params.len(), 2);
    assert_eq!(decl.body.len(), 1);
    assert!(matches!(decl.body[0], Stmt::Return { .. }));
}

#[test]
fn fn_inside_block_is_rejected() {
    let (statements, diags) = parse_all("{ fn f() { } }");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "fn only permitted in global scope");
    assert!(statements.is_empty() || !matches!(statements[0], Stmt::Fn(_)));
}

#[test]
fn fn_after_nested_block_is_still_rejected() {
    let (_, diags) = parse_all("{ { var a; } fn f() { } }");
    assert!(diags
        .iter()
        .any(|d| d.message == "fn only permitted in global scope"));
}

#[test]
fn struct_collects_field_names() {
    let statements = parse_clean("struct Point { var x; var y = 2; }");
    let [Stmt::Struct { name, fields }] = statements.as_slice() else {
        panic!("expected struct");
    };
    assert_eq!(name.lexeme(), "Point");
    let names: Vec<_> = fields.iter().map(|f| f.name.lexeme()).collect();
    assert_eq!(names, vec!["x", "y"]);
}

#[test]
fn fn_in_struct_warns_and_is_discarded() {
    let (statements, diags) = parse_all("struct P { var x; fn f() { } var y; }");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::Warning);
    assert_eq!(diags[0].message, "fn not allowed in structs");
    let [Stmt::Struct { fields, .. }] = statements.as_slice() else {
        panic!("expected struct");
    };
    assert_eq!(fields.len(), 2);
}

#[test]
fn empty_struct_parses() {
    let statements = parse_clean("struct Empty { }");
    let [Stmt::Struct { fields, .. }] = statements.as_slice() else {
        panic!("expected struct");
    };
    assert!(fields.is_empty());
}

#[test]
fn if_requires_block() {
    let (_, diags) = parse_all("if (true) var x = 1;");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "Block required after if");
    assert_eq!(diags[0].expected, Some(TokenType::BraceL));
}

#[test]
fn parses_if_else() {
    let statements = parse_clean("if (a > 1) { b = 2; } else { b = 3; }");
    let [Stmt::If {
        else_branch: Some(_),
        ..
    }] = statements.as_slice()
    else {
        panic!("expected if/else, got {statements:?}");
    };
}

#[test]
fn for_desugars_to_while() {
    let statements = parse_clean("for (var i = 0; i < 3; i = i + 1) { _print(i); }");
    let [Stmt::Block(outer)] = statements.as_slice() else {
        panic!("expected block");
    };
    assert_eq!(outer.len(), 2);
    assert!(matches!(outer[0], Stmt::Var(_)));
    let Stmt::While { body, .. } = &outer[1] else {
        panic!("expected while, got {:?}", outer[1]);
    };
    let Stmt::Block(inner) = body.as_ref() else {
        panic!("expected block body");
    };
    // loop body then increment
    assert_eq!(inner.len(), 2);
    assert!(matches!(inner[1], Stmt::Expr(Expr::Assign { .. })));
}

#[test]
fn for_without_clauses_loops_forever() {
    let statements = parse_clean("for (;;) { break; }");
    let [Stmt::Block(outer)] = statements.as_slice() else {
        panic!("expected block");
    };
    let [Stmt::While { condition, body }] = outer.as_slice() else {
        panic!("expected bare while");
    };
    assert!(matches!(
        condition,
        Expr::Literal {
            value: Lit::Bool(true),
            ..
        }
    ));
    let Stmt::Block(inner) = body.as_ref() else {
        panic!("expected block body");
    };
    assert_eq!(inner.len(), 1);
}

#[test]
fn assignment_is_right_associative() {
    let statements = parse_clean("a = b = 1;");
    let [Stmt::Expr(Expr::Assign { name, value })] = statements.as_slice() else {
        panic!("expected assignment");
    };
    assert_eq!(name.lexeme(), "a");
    assert!(matches!(value.as_ref(), Expr::Assign { .. }));
}

#[test]
fn assignment_to_get_becomes_set() {
    let statements = parse_clean("p.x = 3;");
    let [Stmt::Expr(Expr::Set { name, .. })] = statements.as_slice() else {
        panic!("expected set, got {statements:?}");
    };
    assert_eq!(name.lexeme(), "x");
}

#[test]
fn invalid_assignment_target_keeps_lhs() {
    let (statements, diags) = parse_all("1 = 2;");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "Invalid assignment target");
    let [Stmt::Expr(Expr::Literal {
        value: Lit::Number(n),
        ..
    })] = statements.as_slice()
    else {
        panic!("expected the untouched left side, got {statements:?}");
    };
    assert_eq!(*n, 1.0);
}

#[test]
fn synchronizes_after_error() {
    let (statements, diags) = parse_all("var = 1; var ok = 2;");
    assert!(!diags.is_empty());
    assert_eq!(statements.len(), 1);
    let Stmt::Var(decl) = &statements[0] else {
        panic!("expected var");
    };
    assert_eq!(decl.name.lexeme(), "ok");
}

#[test]
fn import_prologue_stops_at_first_statement() {
    let (mut parser, seen) = parser_for("import \"a.tl\";\nimport \"b.tl\";\nvar x = 1;");
    let first = parser.parse_import().expect("first import");
    assert_eq!(first.path.lexeme(), "a.tl");
    let second = parser.parse_import().expect("second import");
    assert_eq!(second.path.lexeme(), "b.tl");
    assert!(parser.parse_import().is_none());
    assert!(parser.parse_stmt().is_some());
    assert!(seen.0.borrow().is_empty());
}

#[test]
fn too_many_arguments_diagnosed_but_node_produced() {
    let args = (0..65).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let (statements, diags) = parse_all(&format!("f({args});"));
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "Too many arguments: 65 (max: 64)");
    let [Stmt::Expr(Expr::Invoke { args, .. })] = statements.as_slice() else {
        panic!("expected invoke");
    };
    assert_eq!(args.len(), MAX_ARGS);
}

#[test]
fn is_expression_distinguishes_statements() {
    assert!(Parser::is_expression("1 + 2 * 3"));
    assert!(Parser::is_expression("f(1).field"));
    assert!(!Parser::is_expression("var x = 1;"));
    assert!(!Parser::is_expression("1 + 2;"));
    assert!(!Parser::is_expression("a = 1"));
    assert!(!Parser::is_expression(""));
}

#[test]
fn logical_operators_nest_with_precedence() {
    let statements = parse_clean("a or b and c;");
    let [Stmt::Expr(Expr::Logical { op, rhs, .. })] = statements.as_slice() else {
        panic!("expected logical");
    };
    assert_eq!(op.ty, TokenType::Or);
    assert!(matches!(rhs.as_ref(), Expr::Logical { .. }));
}

#[test]
fn group_parses_nested_expression() {
    let statements = parse_clean("(1 + 2) * 3;");
    let [Stmt::Expr(Expr::Binary { lhs, .. })] = statements.as_slice() else {
        panic!("expected binary");
    };
    assert!(matches!(lhs.as_ref(), Expr::Group(_)));
}

#[test]
fn unexpected_eof_in_group_is_reported() {
    let (_, diags) = parse_all("(");
    assert!(!diags.is_empty());
    assert_eq!(diags[0].message, "Unexpected EOF");
}
