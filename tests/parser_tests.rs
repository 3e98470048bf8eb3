use conjure::ast::nodes::{BinaryOp, CompareOp, Expr, Literal, Statement, Target, UnaryOp};
use conjure::lexer::tokenize;
use conjure::parser::{parse, parse_expression};

fn parse_program(source: &str) -> conjure::ast::nodes::Program {
    let tokens = tokenize(source).expect("tokenize");
    parse(&tokens).expect("parse")
}

fn parse_expr(source: &str) -> Expr {
    let tokens = tokenize(source).expect("tokenize");
    parse_expression(&tokens).expect("parse expression")
}

#[test]
fn function_signature_and_docstring() {
    let program = parse_program(
        "def scale(values: list[float], factor=2.0) -> list[float]:\n    \"\"\"Scale values.\"\"\"\n    return [v * factor for v in values]\n",
    );
    let function = program.function("scale").expect("scale");

    assert_eq!(function.docstring.as_deref(), Some("Scale values."));
    assert_eq!(function.params.len(), 2);
    assert_eq!(function.params[0].name, "values");
    assert!(matches!(function.params[0].annotation, Some(Expr::Index { .. })));
    assert!(function.params[1].annotation.is_none());
    assert!(matches!(
        function.params[1].default,
        Some(Expr::Literal(Literal::Float(f))) if f == 2.0
    ));
    assert!(function.returns.is_some());
    assert_eq!(function.body.statements.len(), 1);
    assert!(matches!(
        function.body.statements[0],
        Statement::Return(Some(Expr::ListComp { .. }))
    ));
}

#[test]
fn several_functions_keep_declaration_order() {
    let program = parse_program("def a():\n    pass\n\ndef b():\n    return a()\n");
    let names: Vec<&str> = program.functions().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert!(program.function("c").is_none());
}

#[test]
fn arithmetic_precedence() {
    match parse_expr("1 + 2 * 3") {
        Expr::Binary {
            op: BinaryOp::Add,
            right,
            ..
        } => assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. })),
        other => panic!("unexpected expression {other:?}"),
    }
}

#[test]
fn unary_minus_binds_looser_than_power() {
    match parse_expr("-2 ** 2") {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => assert!(matches!(*operand, Expr::Binary { op: BinaryOp::Pow, .. })),
        other => panic!("unexpected expression {other:?}"),
    }
}

#[test]
fn comparisons_chain() {
    match parse_expr("0 <= x < 10 not in y") {
        Expr::Compare { rest, .. } => {
            let ops: Vec<CompareOp> = rest.iter().map(|(op, _)| *op).collect();
            assert_eq!(ops, [CompareOp::LtEq, CompareOp::Lt, CompareOp::NotIn]);
        }
        other => panic!("unexpected expression {other:?}"),
    }
}

#[test]
fn generator_arguments_become_comprehensions() {
    match parse_expr("sum(x * x for x in xs if x > 0)") {
        Expr::Call { args, kwargs, .. } => {
            assert!(kwargs.is_empty());
            match &args[..] {
                [Expr::ListComp { clauses, .. }] => {
                    assert_eq!(clauses.len(), 1);
                    assert_eq!(clauses[0].conditions.len(), 1);
                }
                other => panic!("unexpected arguments {other:?}"),
            }
        }
        other => panic!("unexpected expression {other:?}"),
    }
}

#[test]
fn keyword_arguments_and_slices() {
    match parse_expr("sorted(items[1:], key=lambda p: p.x, reverse=True)") {
        Expr::Call { args, kwargs, .. } => {
            assert!(matches!(args[0], Expr::Slice { ref stop, .. } if stop.is_none()));
            let names: Vec<&str> = kwargs.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(names, ["key", "reverse"]);
            assert!(matches!(kwargs[0].1, Expr::Lambda { .. }));
        }
        other => panic!("unexpected expression {other:?}"),
    }
}

#[test]
fn control_flow_statements() {
    let source = "\
def classify(n):
    if n < 0:
        return 'negative'
    elif n == 0:
        return 'zero'
    else:
        for i, c in enumerate('ab'):
            n += i
        while n > 100:
            n //= 2
    return n
";
    let program = parse_program(source);
    let body = &program.function("classify").expect("classify").body.statements;
    match &body[0] {
        Statement::If {
            elif_blocks,
            else_block: Some(else_block),
            ..
        } => {
            assert_eq!(elif_blocks.len(), 1);
            assert!(matches!(
                else_block.statements[0],
                Statement::For {
                    target: Target::Tuple(ref names),
                    ..
                } if names.len() == 2
            ));
            assert!(matches!(
                else_block.statements[1],
                Statement::While { .. }
            ));
        }
        other => panic!("unexpected statement {other:?}"),
    }
}

#[test]
fn imports_and_assignments() {
    let source = "\
def f(p):
    import math as m
    from math import floor, pi as PI
    a = b = 1
    p.total += a
    return m.floor(PI)
";
    let program = parse_program(source);
    let body = &program.function("f").expect("f").body.statements;
    assert!(matches!(
        body[0],
        Statement::Import { ref module, alias: Some(ref alias), .. } if module == "math" && alias == "m"
    ));
    match &body[1] {
        Statement::FromImport { names, .. } => {
            assert_eq!(
                names,
                &vec![
                    ("floor".to_string(), None),
                    ("pi".to_string(), Some("PI".to_string())),
                ]
            );
        }
        other => panic!("unexpected statement {other:?}"),
    }
    assert!(matches!(body[2], Statement::Assign { ref targets, .. } if targets.len() == 2));
    assert!(matches!(
        body[3],
        Statement::AugAssign {
            target: Target::Attribute { .. },
            op: BinaryOp::Add,
            ..
        }
    ));
}

#[test]
fn malformed_input_reports_errors() {
    let tokens = tokenize("def f():\n    return 1 +\n").expect("tokenize");
    let errors = parse(&tokens).expect_err("dangling operator");
    assert!(!errors.is_empty());
}
