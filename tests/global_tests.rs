mod common;

use common::{synthesizer, ScriptedClient};
use conjure::args;
use conjure::cache::ImplementationCache;
use conjure::dispatch::{ai_implement, set_global_synthesizer};
use conjure::stub::{FunctionStub, Param};
use conjure::{TypeRef, Value};

fn int_pair(name: &str) -> FunctionStub {
    FunctionStub::new(name)
        .param(Param::new("a", TypeRef::Int))
        .param(Param::new("b", TypeRef::Int))
        .returns(TypeRef::Int)
}

// One test per binary: the global synthesizer can be installed only once.
#[test]
fn ai_implement_uses_the_installed_global_synthesizer() {
    let client = ScriptedClient::new(["return a + b", "return a +", "return a - b"]);
    set_global_synthesizer(synthesizer(&client, 3)).expect("first install");
    assert!(set_global_synthesizer(synthesizer(&client, 3)).is_err());

    let add = ai_implement(int_pair("add"));
    assert_eq!(add.call(args![1, 2]).expect("add"), Value::Int(3));
    assert_eq!(add.call(args![5, 5]).expect("add again"), Value::Int(10));
    assert_eq!(client.calls(), 1);

    let sub = ai_implement(int_pair("sub"));
    assert_eq!(sub.call(args![9, 4]).expect("sub"), Value::Int(5));
    assert_eq!(client.calls(), 3);
    assert_eq!(sub.stats().expect("stats").attempts, 2);

    let stats = ImplementationCache::global().stats();
    assert_eq!((stats.entries, stats.syntheses, stats.hits), (2, 2, 1));
    assert!(ImplementationCache::global().contains(add.key()));
}
