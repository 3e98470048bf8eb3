//! YAML stub manifests: records and stubs declared outside Rust source.
//!
//! ```yaml
//! records:
//!   - name: Point
//!     fields:
//!       - { name: x, type: float, description: X coordinate }
//!       - { name: y, type: float, default: 0.0 }
//! stubs:
//!   - name: distance
//!     doc: Euclidean distance between two points.
//!     params:
//!       - { name: a, type: Point }
//!       - { name: b, type: Point }
//!     returns: float
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as Json;
use thiserror::Error;

use crate::runtime::Value;
use crate::schema::{FieldSchema, RecordSchema};
use crate::stub::{
    resolve_type_expression, DeclarationSite, FunctionStub, Param, ResolveError, TypeHint,
};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("record `{record}`: {source}")]
    Record {
        record: String,
        #[source]
        source: ResolveError,
    },
    #[error("records form a cycle or reference unknown types: {}", .0.join(", "))]
    UnresolvedRecords(Vec<String>),
    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: &'static str, name: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    records: Vec<RawRecord>,
    #[serde(default)]
    stubs: Vec<RawStub>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecord {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: String,
    #[serde(rename = "type", default = "any_type")]
    ty: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default: Option<Json>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStub {
    name: String,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    params: Vec<RawParam>,
    #[serde(default)]
    returns: Option<String>,
    #[serde(default)]
    returns_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParam {
    name: String,
    #[serde(rename = "type", default)]
    ty: Option<String>,
    #[serde(default)]
    description: Option<String>,
    /// Present-but-null means a `None` default.
    #[serde(default, deserialize_with = "present")]
    default: Option<Json>,
}

fn any_type() -> String {
    "Any".to_string()
}

fn present<'de, D>(deserializer: D) -> Result<Option<Json>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Json::deserialize(deserializer).map(Some)
}

/// A loaded manifest: resolved records and the stubs that use them.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: String,
    records: Vec<Arc<RecordSchema>>,
    stubs: Vec<FunctionStub>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml_str(&contents, display)
    }

    /// Parses manifest text; `path` identifies the declaration site of each stub.
    pub fn from_yaml_str(contents: &str, path: impl Into<String>) -> Result<Self, ManifestError> {
        let path = path.into();
        let raw: RawManifest =
            serde_yaml::from_str(contents).map_err(|source| ManifestError::Yaml {
                path: path.clone(),
                source,
            })?;

        let records = resolve_records(raw.records)?;
        let mut stubs: Vec<FunctionStub> = Vec::with_capacity(raw.stubs.len());
        for (index, stub) in raw.stubs.into_iter().enumerate() {
            if stubs.iter().any(|known| known.name() == stub.name) {
                return Err(ManifestError::Duplicate {
                    kind: "stub",
                    name: stub.name,
                });
            }
            stubs.push(build_stub(stub, &records, DeclarationSite::manifest(&path, index)));
        }

        Ok(Self {
            path,
            records,
            stubs,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn records(&self) -> &[Arc<RecordSchema>] {
        &self.records
    }

    pub fn stubs(&self) -> &[FunctionStub] {
        &self.stubs
    }

    pub fn stub(&self, name: &str) -> Option<&FunctionStub> {
        self.stubs.iter().find(|stub| stub.name() == name)
    }
}

fn build_stub(raw: RawStub, records: &[Arc<RecordSchema>], site: DeclarationSite) -> FunctionStub {
    let mut stub = FunctionStub::at(raw.name, site);
    if let Some(doc) = raw.doc {
        stub = stub.doc(doc);
    }
    for record in records {
        stub = stub.with_record(Arc::clone(record));
    }
    for param in raw.params {
        let mut built = match param.ty {
            Some(ty) => Param::new(param.name, ty),
            None => Param::untyped(param.name),
        };
        if let Some(description) = param.description {
            built = built.describe(description);
        }
        if let Some(default) = param.default {
            built = built.default(Value::from_json(&default));
        }
        stub = stub.param(built);
    }

    let mut returns = raw.returns.map(TypeHint::Named).unwrap_or(TypeHint::Missing);
    if let Some(description) = raw.returns_description {
        returns = returns.describe(description);
    }
    stub.returns(returns)
}

/// Resolves records in dependency order so fields may name records declared later.
fn resolve_records(raw: Vec<RawRecord>) -> Result<Vec<Arc<RecordSchema>>, ManifestError> {
    let mut resolved: Vec<Arc<RecordSchema>> = Vec::with_capacity(raw.len());
    let mut pending: Vec<RawRecord> = Vec::with_capacity(raw.len());
    for record in raw {
        if pending.iter().any(|known| known.name == record.name) {
            return Err(ManifestError::Duplicate {
                kind: "record",
                name: record.name,
            });
        }
        pending.push(record);
    }
    let pending_names: Vec<String> = pending.iter().map(|record| record.name.clone()).collect();

    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for record in pending {
            match build_record(&record, &resolved) {
                Ok(schema) => resolved.push(Arc::new(schema)),
                Err(ResolveError::UnknownType { name, .. }) if pending_names.contains(&name) => {
                    deferred.push(record);
                }
                Err(source) => {
                    return Err(ManifestError::Record {
                        record: record.name,
                        source,
                    });
                }
            }
        }
        if deferred.len() == before {
            return Err(ManifestError::UnresolvedRecords(
                deferred.into_iter().map(|record| record.name).collect(),
            ));
        }
        pending = deferred;
    }
    Ok(resolved)
}

fn build_record(
    raw: &RawRecord,
    resolved: &[Arc<RecordSchema>],
) -> Result<RecordSchema, ResolveError> {
    let mut schema = RecordSchema::new(&raw.name);
    if let Some(description) = &raw.description {
        schema = schema.describe(description);
    }
    for field in &raw.fields {
        let ty = resolve_type_expression(&field.ty, resolved, &raw.name)?;
        let mut built = FieldSchema::new(&field.name, ty);
        if let Some(description) = &field.description {
            built = built.describe(description);
        }
        if let Some(default) = &field.default {
            built = built.default_value(default.clone());
        }
        schema = schema.with_field(built);
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeRef;
    use crate::stub::introspect;

    const MANIFEST: &str = r#"
records:
  - name: Segment
    fields:
      - { name: start, type: Point }
      - { name: end, type: Point }
  - name: Point
    description: A point in the plane.
    fields:
      - { name: x, type: float, description: X coordinate }
      - { name: y, type: float, default: 0.0 }
stubs:
  - name: length
    doc: Length of a segment.
    params:
      - { name: segment, type: Segment, description: The segment }
      - { name: scale, type: float, default: 1.0 }
      - { name: label, default: null }
    returns: float
"#;

    #[test]
    fn records_resolve_regardless_of_order() {
        let manifest = Manifest::from_yaml_str(MANIFEST, "shapes.yaml").expect("manifest");
        let names: Vec<&str> = manifest.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Point", "Segment"]);
        let segment = &manifest.records()[1];
        assert!(matches!(&segment.fields[0].ty, TypeRef::Record(point) if point.name == "Point"));
        assert!(!manifest.records()[0].fields[1].is_required());
    }

    #[test]
    fn stubs_carry_manifest_sites_and_defaults() {
        let manifest = Manifest::from_yaml_str(MANIFEST, "shapes.yaml").expect("manifest");
        let stub = manifest.stub("length").expect("stub");
        assert_eq!(stub.site().to_string(), "shapes.yaml#stubs[0]");
        assert_eq!(stub.params()[1].default, Some(Value::Float(1.0)));
        assert_eq!(stub.params()[2].default, Some(Value::None));

        let signature = introspect(stub).expect("introspect");
        assert_eq!(signature.params[0].type_name, "Segment");
        assert_eq!(signature.params[0].description.as_deref(), Some("The segment"));
        assert_eq!(signature.params[2].type_name, "Any");
        assert!(signature.params[0].schema.is_some());
    }

    #[test]
    fn cyclic_records_are_rejected() {
        let text = r#"
records:
  - name: A
    fields: [{ name: b, type: B }]
  - name: B
    fields: [{ name: a, type: A }]
"#;
        let err = Manifest::from_yaml_str(text, "cycle.yaml").expect_err("cycle");
        assert!(matches!(err, ManifestError::UnresolvedRecords(names) if names.len() == 2));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Manifest::from_yaml_str("stubs:\n  - name: f\n    body: x\n", "bad.yaml")
            .expect_err("unknown key");
        assert!(matches!(err, ManifestError::Yaml { .. }));
    }
}
