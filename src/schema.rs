//! # Config Schema Validation
//!
//! Config documents are checked with a compiled `jsonschema::Validator`.
//! Older schema files mark mandatory fields with `"required": true` on the
//! property schema instead of the standard `required` array; those flags are
//! lifted out before compiling and checked in a separate pass.

use jsonschema::Validator;
use serde_json::Value;

/// Schema bundled with the binary
pub const BUNDLED_SCHEMA: &str = include_str!("../schemas/assetpressrc.schema.json");

/// A compiled config schema
pub struct ConfigSchema {
    validator: Validator,
    /// Property paths flagged with the boolean `required` form
    legacy_required: Vec<Vec<String>>,
}

impl ConfigSchema {
    /// Compile the schema shipped with the binary
    pub fn bundled() -> Result<Self, String> {
        let schema: Value = serde_json::from_str(BUNDLED_SCHEMA).map_err(|e| e.to_string())?;
        Self::compile(&schema)
    }

    pub fn compile(schema: &Value) -> Result<Self, String> {
        let mut schema = schema.clone();
        let mut legacy_required = Vec::new();
        lift_legacy_required(&mut schema, &mut Vec::new(), &mut legacy_required);

        let validator = Validator::new(&schema).map_err(|e| e.to_string())?;
        Ok(Self {
            validator,
            legacy_required,
        })
    }

    /// One message per violation; empty when `document` is valid
    pub fn validate(&self, document: &Value) -> Vec<String> {
        let mut errors: Vec<String> = self
            .validator
            .iter_errors(document)
            .map(|error| error.to_string())
            .collect();

        for path in &self.legacy_required {
            let (name, parents) = match path.split_last() {
                Some(split) => split,
                None => continue,
            };
            // Only checked where the enclosing object is present
            let parent = parents
                .iter()
                .try_fold(document, |value, key| value.get(key));
            if let Some(parent) = parent.filter(|p| p.is_object()) {
                if parent.get(name).is_none() {
                    errors.push(format!("\"{}\" is a required property", path.join(".")));
                }
            }
        }

        errors
    }
}

/// Removes `"required": <bool>` from property schemas, recording the path of
/// every property that was marked `true`
fn lift_legacy_required(schema: &mut Value, path: &mut Vec<String>, found: &mut Vec<Vec<String>>) {
    let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) else {
        return;
    };

    for (name, property) in properties.iter_mut() {
        path.push(name.clone());
        if let Some(object) = property.as_object_mut() {
            if let Some(Value::Bool(required)) = object.get("required") {
                if *required {
                    found.push(path.clone());
                }
                object.remove("required");
            }
        }
        lift_legacy_required(property, path, found);
        path.pop();
    }
}
