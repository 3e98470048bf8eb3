mod common;

use std::sync::{Arc, Barrier};

use serde::{Deserialize, Serialize};

use common::{fresh_cache, synthesizer, ScriptedClient};
use conjure::args;
use conjure::dispatch::{AiFunction, CallError};
use conjure::runtime::RuntimeError;
use conjure::schema::{Record, RecordSchema, TypeRef};
use conjure::stub::{FunctionStub, Param};
use conjure::synth::{AttemptError, SynthesisError};
use conjure::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

impl Record for Point {
    fn schema() -> RecordSchema {
        RecordSchema::new("Point")
            .describe("A point in the plane.")
            .field("x", TypeRef::Float, "X coordinate")
            .field("y", TypeRef::Float, "Y coordinate")
    }
}

fn add_stub() -> FunctionStub {
    FunctionStub::new("add")
        .doc("Add two numbers.")
        .param(Param::new("a", TypeRef::Int).describe("First number"))
        .param(Param::new("b", TypeRef::Int).describe("Second number"))
        .returns(TypeRef::Int)
}

#[test]
fn synthesizes_once_and_reuses_the_implementation() {
    let client = ScriptedClient::new(["```python\nreturn a + b\n```"]);
    let cache = fresh_cache();
    let add = AiFunction::new(add_stub(), synthesizer(&client, 3), Arc::clone(&cache));

    assert_eq!(add.call(args![2, 3]).expect("first call"), Value::Int(5));
    assert_eq!(add.call(args![10; b = 20]).expect("second call"), Value::Int(30));
    assert_eq!(add.call(args![; a = 1, b = 1]).expect("third call"), Value::Int(2));
    assert_eq!(client.calls(), 1);
    let cache_stats = cache.stats();
    assert_eq!((cache_stats.syntheses, cache_stats.hits), (1, 2));

    let stats = add.stats().expect("stats");
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.model, "gpt-5-mini");

    let prompt = &client.prompts()[0];
    assert!(prompt.contains("  - a: int -- First number"));
    assert!(prompt.contains("  - b: int -- Second number"));
}

#[test]
fn indented_completions_are_dedented() {
    let client = ScriptedClient::new([
        "    total = 0\n    for x in xs:\n        total += x\n    return total",
    ]);
    let total = AiFunction::new(
        FunctionStub::new("total")
            .param(Param::new("xs", "list[int]"))
            .returns(TypeRef::Int),
        synthesizer(&client, 3),
        fresh_cache(),
    );

    let xs = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(total.call(args![xs]).expect("call"), Value::Int(6));
    assert_eq!(client.calls(), 1);
}

#[test]
fn invalid_completion_is_retried() {
    let client = ScriptedClient::new(["return a +", "return a * b"]);
    let multiply = AiFunction::new(add_stub(), synthesizer(&client, 3), fresh_cache());

    assert_eq!(multiply.call(args![4, 5]).expect("call"), Value::Int(20));
    assert_eq!(client.calls(), 2);
    assert_eq!(multiply.stats().expect("stats").attempts, 2);
    assert!(multiply
        .implementation()
        .expect("cached")
        .source
        .contains("    return a * b\n"));
}

#[test]
fn exhausted_retries_leave_the_cache_empty() {
    let client = ScriptedClient::new(["this is not ( valid"]);
    let broken = AiFunction::new(add_stub(), synthesizer(&client, 3), fresh_cache());

    let err = broken.call(args![1, 2]).expect_err("exhausted");
    match &err {
        CallError::Synthesis(SynthesisError::Exhausted {
            function,
            attempts,
            source,
        }) => {
            assert_eq!(function, "add");
            assert_eq!(*attempts, 3);
            assert!(matches!(source, AttemptError::Materialize(_)));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "failed to generate implementation for add after 3 attempts"
    );
    assert_eq!(client.calls(), 3);
    assert!(broken.stats().is_none());

    broken.call(args![1, 2]).expect_err("still exhausted");
    assert_eq!(client.calls(), 6);
}

#[test]
fn transport_failures_count_as_attempts() {
    let client = ScriptedClient::failing("connection refused");
    let add = AiFunction::new(add_stub(), synthesizer(&client, 2), fresh_cache());

    let err = add.call(args![1, 2]).expect_err("transport failure");
    assert!(matches!(
        err,
        CallError::Synthesis(SynthesisError::Exhausted {
            attempts: 2,
            source: AttemptError::Transport(_),
            ..
        })
    ));
    assert_eq!(client.calls(), 2);
}

#[test]
fn records_cross_the_boundary_both_ways() {
    let client = ScriptedClient::new([
        "return Point(x=(a.x + b.x) / 2, y=(a.y + b.y) / 2)",
    ]);
    let stub = FunctionStub::new("midpoint")
        .doc("Midpoint of two points.")
        .param(Param::new("a", TypeRef::of_record::<Point>()))
        .param(Param::new("b", "Point"))
        .returns("Point")
        .register::<Point>();
    let midpoint = AiFunction::new(stub, synthesizer(&client, 3), fresh_cache());

    let a = Value::from_record(&Point { x: 0.0, y: 0.0 }).expect("record");
    let b = Value::from_record(&Point { x: 4.0, y: 2.0 }).expect("record");
    let result: Point = midpoint.call_as(args![a, b]).expect("call");
    assert_eq!(result, Point { x: 2.0, y: 1.0 });

    let prompt = &client.prompts()[0];
    assert!(prompt.contains("  - a: Point\n    Schema: {"));
    assert!(prompt.contains("\"title\": \"Point\""));
    assert!(prompt.contains("\nReturn type: Point\n  Schema: {"));
    assert!(prompt.contains("Point(x, y)"));
}

#[test]
fn same_name_at_different_sites_does_not_share_an_entry() {
    let client = ScriptedClient::new(["return 1", "return 2"]);
    let cache = fresh_cache();
    let first = AiFunction::new(
        FunctionStub::new("pick").returns(TypeRef::Int),
        synthesizer(&client, 1),
        cache.clone(),
    );
    let second = AiFunction::new(
        FunctionStub::new("pick").returns(TypeRef::Int),
        synthesizer(&client, 1),
        cache.clone(),
    );

    assert_ne!(first.key(), second.key());
    assert_eq!(first.call(args![]).expect("first"), Value::Int(1));
    assert_eq!(second.call(args![]).expect("second"), Value::Int(2));
    assert_eq!(first.call(args![]).expect("first again"), Value::Int(1));
    assert_eq!(client.calls(), 2);
    assert_eq!(cache.stats().entries, 2);
}

#[test]
fn concurrent_first_calls_synthesize_once() {
    let client = ScriptedClient::new(["return n * n"]);
    let square = AiFunction::new(
        FunctionStub::new("square")
            .param(Param::new("n", TypeRef::Int))
            .returns(TypeRef::Int),
        synthesizer(&client, 3),
        fresh_cache(),
    );
    let barrier = Arc::new(Barrier::new(8));

    std::thread::scope(|scope| {
        for n in 0..8i64 {
            let square = square.clone();
            let barrier = barrier.clone();
            scope.spawn(move || {
                barrier.wait();
                assert_eq!(square.call(args![n]).expect("call"), Value::Int(n * n));
            });
        }
    });
    assert_eq!(client.calls(), 1);
}

#[test]
fn runtime_errors_propagate_without_evicting() {
    let client = ScriptedClient::new(["return 100 // divisor"]);
    let divide = AiFunction::new(
        FunctionStub::new("divide")
            .param(Param::new("divisor", TypeRef::Int))
            .returns(TypeRef::Int),
        synthesizer(&client, 3),
        fresh_cache(),
    );

    let err = divide.call(args![0]).expect_err("division by zero");
    assert!(matches!(
        err,
        CallError::Runtime(RuntimeError::Exception { ref kind, .. }) if kind == "ZeroDivisionError"
    ));
    assert_eq!(divide.call(args![7]).expect("call"), Value::Int(14));
    assert_eq!(client.calls(), 1);
}

#[test]
fn unresolvable_signatures_fail_without_calling_the_model() {
    let client = ScriptedClient::new(["return x"]);
    let stub = FunctionStub::new("f").param(Param::new("x", "Widget"));
    let f = AiFunction::new(stub, synthesizer(&client, 3), fresh_cache());

    let err = f.call(args![1]).expect_err("unknown type");
    assert!(matches!(
        err,
        CallError::Synthesis(SynthesisError::Resolve(_))
    ));
    assert_eq!(client.calls(), 0);
}

#[test]
fn invalidate_forces_a_new_synthesis() {
    let client = ScriptedClient::new(["return 'first'", "return 'second'"]);
    let f = AiFunction::new(FunctionStub::new("label"), synthesizer(&client, 1), fresh_cache());

    assert_eq!(f.call(args![]).expect("call"), Value::str("first"));
    assert!(f.invalidate());
    assert_eq!(f.call(args![]).expect("call"), Value::str("second"));
    assert_eq!(client.calls(), 2);
}
