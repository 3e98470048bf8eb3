//! Talks to the real completion service. Run with
//! `OPENAI_API_KEY=... cargo test --test live_tests -- --ignored`.

use conjure::{ai_implement, args, FunctionStub, Param, TypeRef, Value};

#[test]
#[ignore = "calls the completion service; needs OPENAI_API_KEY"]
fn live_is_odd() {
    if std::env::var_os("OPENAI_API_KEY").is_none() {
        eprintln!("OPENAI_API_KEY not set; skipping");
        return;
    }
    let is_odd = ai_implement(
        FunctionStub::new("is_odd")
            .doc("Check if number is odd.")
            .param(Param::new("n", TypeRef::Int))
            .returns(TypeRef::Bool),
    );

    assert_eq!(is_odd.call(args![3]).expect("is_odd(3)"), Value::Bool(true));
    assert_eq!(is_odd.call(args![4]).expect("is_odd(4)"), Value::Bool(false));
}
