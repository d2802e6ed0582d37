//! JSON schema generation for OpenAI structured outputs.
//!
//! Strict `json_schema` mode only accepts a subset of JSON Schema: every object
//! must be closed (`additionalProperties: false`), every property must be
//! listed in `required` (nullable ones included) and `$ref` pointers are not
//! followed. [`StructuredOutput::openai_schema`] rewrites the `schemars`
//! output into that subset.
//!
//! ```rust,ignore
//! #[derive(Deserialize, JsonSchema)]
//! struct Reply {
//!     items: Vec<Item>,
//! }
//!
//! let schema = Reply::openai_schema();
//! ```

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A type that can be requested as an OpenAI structured output.
///
/// Blanket-implemented for every `JsonSchema + DeserializeOwned` type.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Schema accepted by OpenAI's strict structured-output mode.
    fn openai_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        let definitions = match &mut value {
            Value::Object(root) => {
                root.remove("$schema");
                root.remove("definitions")
            }
            _ => None,
        };

        if let Some(definitions) = definitions {
            inline_refs(&mut value, &definitions);
        }
        close_objects(&mut value);

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Replace every `#/definitions/*` pointer with the definition it names.
fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|path| path.strip_prefix("#/definitions/"))
                .and_then(|name| definitions.get(name))
                .cloned();

            if let Some(definition) = target {
                *value = definition;
                inline_refs(value, definitions);
                return;
            }

            for nested in map.values_mut() {
                inline_refs(nested, definitions);
            }
        }
        Value::Array(items) => {
            for item in items {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}

/// Close every object schema and mark all of its properties required.
fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) {
                map.insert("additionalProperties".into(), Value::Bool(false));

                let required: Vec<Value> = map
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| props.keys().cloned().map(Value::String).collect())
                    .unwrap_or_default();
                map.insert("required".into(), Value::Array(required));
            }

            for nested in map.values_mut() {
                close_objects(nested);
            }
        }
        Value::Array(items) => {
            for item in items {
                close_objects(item);
            }
        }
        _ => {}
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds.iter().any(|k| k == "object"),
        _ => false,
    }
}
