use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value as Json};

use super::types::TypeRef;

/// Capability implemented by structured-record types: describe your fields.
///
/// Implementors also round-trip through serde so values can cross the
/// interpreter boundary as JSON.
pub trait Record: Serialize + DeserializeOwned {
    fn schema() -> RecordSchema;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub ty: TypeRef,
    pub description: Option<String>,
    pub default: Option<Json>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            description: None,
            default: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a described field.
    pub fn field(self, name: impl Into<String>, ty: TypeRef, description: impl Into<String>) -> Self {
        self.with_field(FieldSchema::new(name, ty).describe(description))
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// JSON-schema document in the shape pydantic emits: sorted keys, declaration-ordered
    /// properties, nested records hoisted into `$defs`.
    pub fn json_schema(&self) -> Json {
        let mut defs: Vec<Arc<RecordSchema>> = Vec::new();
        for field in &self.fields {
            field.ty.collect_records(&mut defs);
        }
        defs.retain(|schema| schema.name != self.name);
        defs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut document = self.object_schema();
        if !defs.is_empty() {
            let defs_map: Map<String, Json> = defs
                .iter()
                .map(|schema| (schema.name.clone(), schema.object_schema()))
                .collect();
            document = sorted_object(
                [("$defs".to_string(), Json::Object(defs_map))]
                    .into_iter()
                    .chain(into_pairs(document)),
            );
        }
        document
    }

    fn object_schema(&self) -> Json {
        let properties: Map<String, Json> = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), field_schema(field)))
            .collect();
        let required: Vec<Json> = self
            .fields
            .iter()
            .filter(|field| field.is_required())
            .map(|field| Json::String(field.name.clone()))
            .collect();

        let mut pairs = vec![
            ("properties".to_string(), Json::Object(properties)),
            ("title".to_string(), Json::String(self.name.clone())),
            ("type".to_string(), json!("object")),
        ];
        if !required.is_empty() {
            pairs.push(("required".to_string(), Json::Array(required)));
        }
        if let Some(description) = &self.description {
            pairs.push(("description".to_string(), Json::String(description.clone())));
        }
        sorted_object(pairs)
    }
}

fn field_schema(field: &FieldSchema) -> Json {
    let mut pairs = into_pairs(type_schema(&field.ty));
    if !pairs.iter().any(|(key, _)| key == "$ref") {
        pairs.push(("title".to_string(), Json::String(title_case(&field.name))));
    }
    if let Some(description) = &field.description {
        pairs.push(("description".to_string(), Json::String(description.clone())));
    }
    if let Some(default) = &field.default {
        pairs.push(("default".to_string(), default.clone()));
    }
    sorted_object(pairs)
}

/// Schema fragment for a type, with records referenced through `$ref`.
pub fn type_schema(ty: &TypeRef) -> Json {
    match ty {
        TypeRef::Any => json!({}),
        TypeRef::None => json!({ "type": "null" }),
        TypeRef::Int => json!({ "type": "integer" }),
        TypeRef::Float => json!({ "type": "number" }),
        TypeRef::Str => json!({ "type": "string" }),
        TypeRef::Bool => json!({ "type": "boolean" }),
        TypeRef::List(item) => sorted_object([
            ("items".to_string(), type_schema(item)),
            ("type".to_string(), json!("array")),
        ]),
        TypeRef::Dict(_, value) => sorted_object([
            ("additionalProperties".to_string(), type_schema(value)),
            ("type".to_string(), json!("object")),
        ]),
        TypeRef::Optional(inner) => json!({ "anyOf": [type_schema(inner), { "type": "null" }] }),
        TypeRef::Record(schema) => json!({ "$ref": format!("#/$defs/{}", schema.name) }),
    }
}

fn into_pairs(value: Json) -> Vec<(String, Json)> {
    match value {
        Json::Object(map) => map.into_iter().collect(),
        _ => Vec::new(),
    }
}

fn sorted_object(pairs: impl IntoIterator<Item = (String, Json)>) -> Json {
    let mut pairs: Vec<(String, Json)> = pairs.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    Json::Object(pairs.into_iter().collect())
}

/// `max_items` -> `Max Items`
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> RecordSchema {
        RecordSchema::new("Point")
            .field("x", TypeRef::Float, "X coordinate")
            .field("y", TypeRef::Float, "Y coordinate")
    }

    #[test]
    fn flat_record_schema_matches_pydantic_shape() {
        let schema = point().json_schema();
        assert_eq!(
            schema,
            json!({
                "properties": {
                    "x": { "description": "X coordinate", "title": "X", "type": "number" },
                    "y": { "description": "Y coordinate", "title": "Y", "type": "number" }
                },
                "required": ["x", "y"],
                "title": "Point",
                "type": "object"
            })
        );
        let keys: Vec<&String> = schema.as_object().map(|m| m.keys().collect()).unwrap_or_default();
        assert_eq!(keys, ["properties", "required", "title", "type"]);
    }

    #[test]
    fn nested_records_are_hoisted_into_defs() {
        let segment = RecordSchema::new("LineSegment")
            .field("start", TypeRef::record(point()), "Start point")
            .field("end", TypeRef::record(point()), "End point");
        let schema = segment.json_schema();

        assert_eq!(schema["$defs"]["Point"]["title"], "Point");
        assert_eq!(
            schema["properties"]["start"],
            json!({ "$ref": "#/$defs/Point", "description": "Start point" })
        );
    }

    #[test]
    fn defaulted_fields_are_not_required() {
        let schema = RecordSchema::new("Config")
            .with_field(FieldSchema::new("max_items", TypeRef::Int).default_value(json!(10)))
            .json_schema();
        assert!(schema.get("required").is_none());
        assert_eq!(schema["properties"]["max_items"]["title"], "Max Items");
        assert_eq!(schema["properties"]["max_items"]["default"], 10);
    }
}
