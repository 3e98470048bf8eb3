use conjure::lexer::tokenize;
use conjure::parser::parse;
use conjure::runtime::{check_program, materialize, CheckError, Environment, ExecutionLimits, MaterializeError};
use conjure::utils::errors::render_diagnostics;

fn check(source: &str) -> Result<(), Vec<CheckError>> {
    let tokens = tokenize(source).expect("tokenize");
    let program = parse(&tokens).expect("parse");
    let mut env = Environment::new();
    for function in program.functions() {
        env.define_function(function);
    }
    check_program(&program, &env)
}

fn first_error(source: &str) -> CheckError {
    check(source).expect_err("check should fail").remove(0)
}

#[test]
fn well_formed_bodies_pass() {
    let source = "\
def tally(items):
    import math
    seen = set()
    total = 0
    for item in items:
        if item in seen:
            continue
        seen.add(item)
        total += math.floor(item)
    later = [x for x in items]
    return total + len(later)
";
    assert!(check(source).is_ok());
}

#[test]
fn names_assigned_later_in_the_function_are_local() {
    let source = "\
def f(n):
    while n > 0:
        if n == 1:
            result = 'one'
        n -= 1
    return result
";
    assert!(check(source).is_ok());
}

#[test]
fn undefined_names_get_suggestions() {
    match first_error("def f(values):\n    return sum(valuse)\n") {
        CheckError::UndefinedName {
            name, suggestion, ..
        } => {
            assert_eq!(name, "valuse");
            assert_eq!(suggestion.as_deref(), Some("did you mean `values`?"));
        }
        other => panic!("expected undefined name, got {other:?}"),
    }
}

#[test]
fn math_without_import_suggests_the_import() {
    match first_error("def f(x):\n    return math.sqrt(x)\n") {
        CheckError::UndefinedName { suggestion, .. } => {
            assert_eq!(
                suggestion.as_deref(),
                Some("add `import math` at the top of the function body")
            );
        }
        other => panic!("expected undefined name, got {other:?}"),
    }
}

#[test]
fn only_math_may_be_imported() {
    assert!(matches!(
        first_error("def f():\n    import os\n    return 1\n"),
        CheckError::DisallowedImport { module, .. } if module == "os"
    ));
    assert!(matches!(
        first_error("def f():\n    from math import nonsense\n    return 1\n"),
        CheckError::UnknownMathMember { name, .. } if name == "nonsense"
    ));
}

#[test]
fn dunder_access_is_rejected() {
    assert!(matches!(
        first_error("def f(x):\n    return x.__class__\n"),
        CheckError::DunderAttribute { attr, .. } if attr == "__class__"
    ));
}

#[test]
fn loop_control_outside_loops_is_rejected() {
    assert!(matches!(
        first_error("def f():\n    break\n"),
        CheckError::LoopControlOutsideLoop { keyword: "break", .. }
    ));
    let nested = "\
def f(xs):
    for x in xs:
        def g():
            continue
    return 0
";
    assert!(matches!(
        first_error(nested),
        CheckError::LoopControlOutsideLoop { keyword: "continue", .. }
    ));
}

#[test]
fn comprehension_variables_do_not_leak() {
    assert!(matches!(
        first_error("def f(xs):\n    ys = [x for x in xs]\n    return x\n"),
        CheckError::UndefinedName { name, .. } if name == "x"
    ));
}

#[test]
fn materialize_reports_each_stage() {
    let limits = ExecutionLimits::default();
    let lex = materialize("def f():\n    return 'open\n", "f", Environment::new(), limits)
        .expect_err("lex error");
    assert!(matches!(lex, MaterializeError::Lex(_)));
    assert!(lex.to_string().starts_with("lexing failed: "));

    let parse = materialize("def f():\n    return 1 +\n", "f", Environment::new(), limits)
        .expect_err("parse error");
    assert!(matches!(parse, MaterializeError::Parse(_)));

    let missing = materialize("def g():\n    return 1\n", "f", Environment::new(), limits)
        .expect_err("missing definition");
    assert_eq!(missing.to_string(), "source does not define function `f`");

    let source = "def f():\n    return undefined_thing\n";
    let checked = materialize(source, "f", Environment::new(), limits).expect_err("check error");
    assert!(checked.to_string().starts_with("check failed: name `undefined_thing`"));

    let report = render_diagnostics(&checked.diagnostics("<f>"), source);
    assert!(report.contains("undefined_thing"));
}
