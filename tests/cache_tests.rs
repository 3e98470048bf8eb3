mod common;

use std::sync::{Arc, Barrier};
use std::time::Duration;

use common::{synthesizer, ScriptedClient};
use conjure::cache::{CacheStats, ImplementationCache};
use conjure::stub::{DeclarationSite, FunctionStub, StubKey};
use conjure::synth::{Implementation, SynthesisError};
use conjure::Value;

fn constant_stub() -> FunctionStub {
    FunctionStub::new("constant")
}

fn key(index: usize) -> StubKey {
    StubKey::new("constant", &DeclarationSite::manifest("cache.yaml", index))
}

fn synthesize(client: &Arc<ScriptedClient>) -> Result<Implementation, SynthesisError> {
    synthesizer(client, 1).synthesize(&constant_stub())
}

#[test]
fn second_lookup_is_a_hit() {
    let client = ScriptedClient::new(["return 42"]);
    let cache = ImplementationCache::new();

    let first = cache
        .get_or_synthesize(&key(0), || synthesize(&client))
        .expect("synthesized");
    let second = cache
        .get_or_synthesize(&key(0), || synthesize(&client))
        .expect("cached");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.call(Vec::new(), Vec::new()).expect("call"), Value::Int(42));
    assert_eq!(client.calls(), 1);
    assert_eq!(
        cache.stats(),
        CacheStats {
            entries: 1,
            hits: 1,
            syntheses: 1,
            failures: 0,
        }
    );
}

#[test]
fn failures_are_not_cached() {
    let client = ScriptedClient::new(["return (", "return 7"]);
    let cache = ImplementationCache::new();

    let err = cache
        .get_or_synthesize(&key(0), || synthesize(&client))
        .expect_err("first attempt is malformed");
    assert!(matches!(err, SynthesisError::Exhausted { attempts: 1, .. }));
    assert!(!cache.contains(&key(0)));
    assert_eq!(cache.stats().entries, 0);

    let implementation = cache
        .get_or_synthesize(&key(0), || synthesize(&client))
        .expect("second synthesis succeeds");
    assert_eq!(
        implementation.call(Vec::new(), Vec::new()).expect("call"),
        Value::Int(7)
    );
    let stats = cache.stats();
    assert_eq!((stats.failures, stats.syntheses, stats.entries), (1, 1, 1));
}

#[test]
fn keys_are_independent() {
    let client = ScriptedClient::new(["return 1", "return 2"]);
    let cache = ImplementationCache::new();

    cache
        .get_or_synthesize(&key(0), || synthesize(&client))
        .expect("first");
    cache
        .get_or_synthesize(&key(1), || synthesize(&client))
        .expect("second");

    let value = |index| {
        cache
            .get(&key(index))
            .expect("present")
            .call(Vec::new(), Vec::new())
            .expect("call")
    };
    assert_eq!(value(0), Value::Int(1));
    assert_eq!(value(1), Value::Int(2));
    assert!(cache.get(&key(2)).is_none());
}

#[test]
fn remove_and_clear_evict_entries() {
    let client = ScriptedClient::new(["return 0"]);
    let cache = ImplementationCache::new();
    for index in 0..3 {
        cache
            .get_or_synthesize(&key(index), || synthesize(&client))
            .expect("synthesized");
    }

    assert!(cache.remove(&key(0)).is_some());
    assert!(cache.remove(&key(0)).is_none());
    assert_eq!(cache.stats().entries, 2);

    cache.clear();
    assert_eq!(cache.stats().entries, 0);
    assert!(!cache.contains(&key(1)));
}

#[test]
fn concurrent_callers_share_one_synthesis() {
    let client = ScriptedClient::new(["return 'shared'"]);
    let cache = ImplementationCache::new();
    let barrier = Barrier::new(6);

    std::thread::scope(|scope| {
        for _ in 0..6 {
            scope.spawn(|| {
                barrier.wait();
                cache
                    .get_or_synthesize(&key(0), || {
                        // Widen the window in which other callers arrive.
                        std::thread::sleep(Duration::from_millis(20));
                        synthesize(&client)
                    })
                    .expect("synthesized");
            });
        }
    });

    assert_eq!(client.calls(), 1);
    let stats = cache.stats();
    assert_eq!(stats.syntheses, 1);
    assert_eq!(stats.hits, 5);
}
