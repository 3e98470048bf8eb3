use conjure::prompt::compose_prompt;
use conjure::schema::{FieldSchema, RecordSchema, TypeRef};
use conjure::stub::{FieldInfo, FunctionStub, Metadata, Param, TypeHint};

fn line_item() -> RecordSchema {
    RecordSchema::new("LineItem")
        .field("sku", TypeRef::Str, "Stock keeping unit")
        .field("quantity", TypeRef::Int, "Units ordered")
}

fn order() -> RecordSchema {
    RecordSchema::new("Order")
        .describe("A customer order.")
        .field("items", TypeRef::list(TypeRef::record(line_item())), "Ordered items")
        .with_field(
            FieldSchema::new("note", TypeRef::optional(TypeRef::Str))
                .default_value(serde_json::Value::Null),
        )
}

fn total_stub() -> FunctionStub {
    FunctionStub::new("order_total")
        .doc(
            "
            Total number of units in an order.

            Ignores items with non-positive quantities.
            ",
        )
        .param(Param::new("order", TypeRef::record(order())).describe("The order to sum"))
        .param(Param::new("minimum", TypeRef::Int).default(0i64))
        .param(Param::untyped("label").default("units"))
        .returns(TypeHint::annotated(
            TypeRef::Int,
            vec![Metadata::Field(FieldInfo::describe("Total units"))],
        ))
}

#[test]
fn composition_is_deterministic() {
    let first = compose_prompt(&total_stub()).expect("prompt");
    let second = compose_prompt(&total_stub()).expect("prompt");
    assert_eq!(first, second);
}

#[test]
fn prompt_follows_the_documented_layout() {
    let prompt = compose_prompt(&total_stub()).expect("prompt").into_string();
    let lines: Vec<&str> = prompt.lines().collect();

    assert_eq!(lines[0], "Implement this Python function:");
    assert_eq!(lines[1], "");
    assert_eq!(
        lines[2],
        "def order_total(order: Annotated[Order, 'The order to sum'], minimum: int = 0, label='units') -> Annotated[int, Field(description='Total units')]:"
    );
    assert_eq!(
        lines[3],
        "    \"\"\"Total number of units in an order."
    );
    assert!(prompt.contains("Ignores items with non-positive quantities.\"\"\"\n"));

    let order_line = prompt
        .find("  - order: Order -- The order to sum\n    Schema: {")
        .expect("order parameter");
    let minimum_line = prompt
        .find("  - minimum: int (default: 0)")
        .expect("minimum parameter");
    let label_line = prompt
        .find("  - label: Any (default: 'units')")
        .expect("label parameter");
    assert!(order_line < minimum_line && minimum_line < label_line);

    assert!(prompt.contains("\nReturn type: int\n  Description: Total units\n"));
    assert!(prompt.ends_with(
        "\n\nReturn ONLY the function body. No def line, no docstring, no markdown."
    ));
}

#[test]
fn nested_records_are_hoisted_into_defs() {
    let prompt = compose_prompt(&total_stub()).expect("prompt").into_string();
    assert!(prompt.contains("\"$defs\": {"));
    assert!(prompt.contains("\"$ref\": \"#/$defs/LineItem\""));
    assert!(prompt.contains("\"required\": [\n"));
    assert!(prompt.contains("LineItem(sku, quantity)"));
    assert!(prompt.contains("Order(items, note)"));
}

#[test]
fn dialect_rules_precede_the_directive() {
    let prompt = compose_prompt(&FunctionStub::new("noop")).expect("prompt").into_string();
    let rules = prompt.find("restricted Python subset").expect("rules");
    let directive = prompt.find("Return ONLY the function body").expect("directive");
    assert!(rules < directive);
    assert!(prompt.contains("\nParameter details:\n\nReturn type: Any\n"));
}
