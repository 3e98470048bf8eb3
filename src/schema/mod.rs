pub mod record;
pub mod types;

pub use record::{type_schema, FieldSchema, Record, RecordSchema};
pub use types::TypeRef;
