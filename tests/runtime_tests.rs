use std::sync::Arc;

use conjure::runtime::{materialize, CompiledFunction, Environment, ExecutionLimits, RuntimeError, Value};
use conjure::schema::{RecordSchema, TypeRef};

fn compile_with(source: &str, name: &str, env: Environment, limits: ExecutionLimits) -> CompiledFunction {
    materialize(source, name, env, limits).expect("source should materialize")
}

fn compile(source: &str, name: &str) -> CompiledFunction {
    compile_with(source, name, Environment::new(), ExecutionLimits::default())
}

fn call(function: &CompiledFunction, args: Vec<Value>) -> Value {
    function.call(args, Vec::new()).expect("call should succeed")
}

#[test]
fn recursion_through_the_function_name() {
    let fib = compile(
        "def fib(n: int) -> int:\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\n",
        "fib",
    );
    assert_eq!(call(&fib, vec![Value::Int(20)]), Value::Int(6765));
}

#[test]
fn nested_functions_capture_enclosing_values() {
    let source = "\
def scaled(values, factor):
    def scale(v):
        return v * factor
    return [scale(v) for v in values if v % 2 == 0]
";
    let scaled = compile(source, "scaled");
    let values = Value::from(vec![1i64, 2, 3, 4]);
    assert_eq!(
        call(&scaled, vec![values, Value::Int(10)]),
        Value::from(vec![20i64, 40])
    );
}

#[test]
fn helper_functions_in_the_same_source_are_callable() {
    let source = "\
def _square(x):
    return x * x

def sum_squares(xs):
    return sum(_square(x) for x in xs)
";
    let sum_squares = compile(source, "sum_squares");
    let xs = Value::from(vec![1i64, 2, 3]);
    assert_eq!(call(&sum_squares, vec![xs]), Value::Int(14));
}

#[test]
fn python_division_semantics() {
    let source = "\
def arith(a, b):
    return (a // b, a % b, a / b, -a // b, a ** 2)
";
    let arith = compile(source, "arith");
    let result = call(&arith, vec![Value::Int(7), Value::Int(2)]);
    assert_eq!(result.repr(), "(3, 1, 3.5, -4, 49)");
}

#[test]
fn optional_arguments_by_position_or_keyword() {
    let source = "\
def parse(digits):
    labelled = [(i, d) for i, d in enumerate(digits, 1)]
    keyed = list(enumerate(digits, start=10))
    return (labelled[0], keyed[-1], int('ff', 16), int('101', base=2))
";
    let parse = compile(source, "parse");
    let result = call(&parse, vec![Value::str("ab")]);
    assert_eq!(result.repr(), "((1, 'a'), (11, 'b'), 255, 5)");
}

#[test]
fn strings_and_fstrings() {
    let source = "\
def describe(name, score):
    words = name.strip().split()
    initials = ''.join(w[0].upper() for w in words)
    return f\"{initials}: {score:.2f} ({len(words)} words)\"
";
    let describe = compile(source, "describe");
    let result = call(&describe, vec![Value::str("  ada lovelace "), Value::Float(9.5)]);
    assert_eq!(result, Value::str("AL: 9.50 (2 words)"));
}

#[test]
fn dicts_keep_insertion_order() {
    let source = "\
def histogram(words):
    counts = {}
    for word in words:
        counts[word] = counts.get(word, 0) + 1
    return sorted(counts.items(), key=lambda item: (-item[1], item[0]))
";
    let histogram = compile(source, "histogram");
    let words = Value::from(vec!["b", "a", "b", "c", "a", "b"]);
    assert_eq!(
        call(&histogram, vec![words]).repr(),
        "[('b', 3), ('a', 2), ('c', 1)]"
    );
}

#[test]
fn math_module_requires_an_import() {
    let source = "\
def hypotenuse(a, b):
    import math
    return math.sqrt(a * a + b * b)
";
    let hypotenuse = compile(source, "hypotenuse");
    assert_eq!(
        call(&hypotenuse, vec![Value::Int(3), Value::Int(4)]),
        Value::Float(5.0)
    );

    let source = "def floor_of(x):\n    from math import floor\n    return floor(x)\n";
    let floor_of = compile(source, "floor_of");
    assert_eq!(call(&floor_of, vec![Value::Float(2.7)]), Value::Int(2));
}

#[test]
fn keyword_arguments_and_call_time_defaults() {
    let source = "\
def greet(name, greeting='Hello', punctuation='!'):
    return greeting + ', ' + name + punctuation
";
    let greet = compile(source, "greet");
    let result = greet
        .call(
            vec![Value::str("Ada")],
            vec![("punctuation".to_string(), Value::str("?"))],
        )
        .expect("call");
    assert_eq!(result, Value::str("Hello, Ada?"));

    let err = greet
        .call(Vec::new(), vec![("nickname".to_string(), Value::str("x"))])
        .expect_err("unexpected keyword");
    assert_eq!(err.kind(), Some("TypeError"));
}

#[test]
fn raised_exceptions_surface_as_runtime_errors() {
    let source = "\
def checked_sqrt(x):
    if x < 0:
        raise ValueError('negative input')
    return x ** 0.5
";
    let checked_sqrt = compile(source, "checked_sqrt");
    let err = checked_sqrt
        .call(vec![Value::Int(-1)], Vec::new())
        .expect_err("should raise");
    assert_eq!(
        err,
        RuntimeError::exception("ValueError", "negative input")
    );
    assert_eq!(call(&checked_sqrt, vec![Value::Int(9)]), Value::Float(3.0));
}

#[test]
fn integer_overflow_is_an_error() {
    let double = compile("def double(x):\n    return x * 2\n", "double");
    let err = double
        .call(vec![Value::Int(i64::MAX)], Vec::new())
        .expect_err("overflow");
    assert_eq!(err.kind(), Some("OverflowError"));
}

#[test]
fn oversized_results_raise_memory_error() {
    let cases = [
        "def f():\n    return [0] * 100000000000\n",
        "def f():\n    return 'ab' * 100000000000\n",
        "def f():\n    return f'{1:99999999999}'\n",
        "def f():\n    return '7'.zfill(99999999999)\n",
        "def f():\n    return 'x'.center(99999999999)\n",
        "def f():\n    return list(range(100000000000))\n",
    ];
    for source in cases {
        let f = compile(source, "f");
        let err = f.call(Vec::new(), Vec::new()).expect_err(source);
        assert_eq!(err.kind(), Some("MemoryError"), "{source}");
    }
}

#[test]
fn doubling_a_string_stops_at_the_length_cap() {
    let grow = compile(
        "def grow(rounds):\n    s = 'ab'\n    for _ in range(rounds):\n        s = s + s\n    return len(s)\n",
        "grow",
    );
    assert_eq!(call(&grow, vec![Value::Int(21)]), Value::Int(1 << 22));
    let err = grow.call(vec![Value::Int(40)], Vec::new()).expect_err("cap");
    assert_eq!(err.kind(), Some("MemoryError"));
}

#[test]
fn step_budget_stops_runaway_loops() {
    let limits = ExecutionLimits {
        max_steps: 10_000,
        max_depth: 64,
    };
    let spin = compile_with(
        "def spin():\n    while True:\n        pass\n",
        "spin",
        Environment::new(),
        limits,
    );
    let err = spin.call(Vec::new(), Vec::new()).expect_err("budget");
    assert_eq!(err, RuntimeError::StepLimitExceeded { limit: 10_000 });
}

#[test]
fn call_depth_is_bounded() {
    let limits = ExecutionLimits {
        max_steps: 1_000_000,
        max_depth: 32,
    };
    let dive = compile_with(
        "def dive(n):\n    return dive(n + 1)\n",
        "dive",
        Environment::new(),
        limits,
    );
    let err = dive.call(vec![Value::Int(0)], Vec::new()).expect_err("depth");
    assert_eq!(err, RuntimeError::RecursionLimitExceeded { limit: 32 });
}

#[test]
fn default_depth_limit_trips_before_the_native_stack() {
    let count = compile(
        "def count(n):\n    return 0 if n == 0 else count(n - 1) + 1\n",
        "count",
    );
    assert_eq!(call(&count, vec![Value::Int(100)]), Value::Int(100));

    // A small worker stack must not matter; each call brings its own.
    let worker = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || count.call(vec![Value::Int(10_000)], Vec::new()))
        .expect("spawn");
    let err = worker.join().expect("worker finished").expect_err("depth");
    assert_eq!(err, RuntimeError::RecursionLimitExceeded { limit: 128 });
}

#[test]
fn records_are_constructed_with_coercion() {
    let point = Arc::new(
        RecordSchema::new("Point")
            .field("x", TypeRef::Float, "X")
            .field("y", TypeRef::Float, "Y"),
    );
    let source = "\
def shift(p, dx):
    moved = Point(x=p.x + dx, y=p.y)
    moved.y += 1
    return moved
";
    let shift = compile_with(
        source,
        "shift",
        Environment::with_records([point.clone()]),
        ExecutionLimits::default(),
    );
    let origin = Value::from_json_typed(
        &serde_json::json!({ "x": 0, "y": 0 }),
        &TypeRef::Record(point),
    )
    .expect("record");
    let moved = call(&shift, vec![origin, Value::Int(2)]);
    assert_eq!(
        moved.to_json().expect("json"),
        serde_json::json!({ "x": 2.0, "y": 1.0 })
    );
}

#[test]
fn lists_are_shared_references() {
    let source = "\
def fill(out, n):
    for i in range(n):
        out.append(i)
    out += [n]
    return len(out)
";
    let fill = compile(source, "fill");
    let out = Value::list(Vec::new());
    assert_eq!(call(&fill, vec![out.clone(), Value::Int(3)]), Value::Int(4));
    assert_eq!(out.repr(), "[0, 1, 2, 3]");
}

#[test]
fn tuple_unpacking_in_loops() {
    let source = "\
def pair_sums(xs, ys):
    total = []
    for i, (x, y) in enumerate(zip(xs, ys)):
        total.append(i + x + y)
    return total
";
    let pair_sums = compile(source, "pair_sums");
    let result = call(
        &pair_sums,
        vec![Value::from(vec![1i64, 2]), Value::from(vec![10i64, 20])],
    );
    assert_eq!(result.repr(), "[11, 23]");
}
