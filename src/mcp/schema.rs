//! Tool descriptors and typed parameter coercion.
//!
//! A server's tool-listing response carries a JSON-Schema-like
//! `inputSchema` per tool. The raw schema is kept verbatim (it is embedded
//! into the chat system prompt and shown in listings), and the common
//! `properties`/`required` shape is additionally normalized into a flat
//! parameter list with a typed kind per parameter so interactive input can
//! be coerced before dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error raised when raw text cannot be coerced to a parameter's type.
#[derive(Debug, Error)]
#[error("Invalid {kind} value for '{param}': {raw}")]
pub struct CoercionError {
    /// Parameter name.
    pub param: String,
    /// Expected kind, for the message.
    pub kind: &'static str,
    /// The rejected input.
    pub raw: String,
}

/// Declared type of a tool parameter.
///
/// Unknown or complex schema shapes (arrays, nested objects, unions) fall
/// back to [`ParamKind::Opaque`], which passes raw text through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    #[default]
    Opaque,
}

impl ParamKind {
    /// Map a JSON-Schema `type` string to a kind.
    pub fn from_schema_type(schema_type: Option<&str>) -> Self {
        match schema_type {
            Some("string") => Self::String,
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("boolean") => Self::Boolean,
            _ => Self::Opaque,
        }
    }

    /// Human label used in prompts and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Opaque => "value",
        }
    }

    /// Coerce raw text into a JSON value of this kind.
    pub fn coerce(&self, param: &str, raw: &str) -> Result<Value, CoercionError> {
        let reject = || CoercionError {
            param: param.to_string(),
            kind: self.label(),
            raw: raw.to_string(),
        };

        match self {
            Self::String => Ok(Value::String(raw.to_string())),
            Self::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| reject()),
            Self::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(reject),
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err(reject()),
            },
            Self::Opaque => Ok(Value::String(raw.to_string())),
        }
    }
}

/// One normalized parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
}

/// A tool exposed by one server: name, description, and input schema.
///
/// Immutable once fetched; a re-fetch replaces the whole set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// The server's schema, verbatim.
    pub input_schema: Value,
    /// Flattened view of `input_schema.properties`, sorted by name.
    #[serde(default)]
    pub params: Vec<ToolParam>,
}

impl ToolDescriptor {
    /// Build a descriptor from the raw pieces of a tool-listing response.
    pub fn from_listing(name: String, description: String, input_schema: Value) -> Self {
        let params = normalize_params(&input_schema);
        Self {
            name,
            description,
            input_schema,
            params,
        }
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ToolParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Names of the required parameters.
    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }
}

/// Flatten a JSON-Schema object's `properties`/`required` into parameters.
///
/// The result is sorted by parameter name (`serde_json::Map` iterates in
/// key order). Schemas without a `properties` object produce an empty list.
fn normalize_params(schema: &Value) -> Vec<ToolParam> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| ToolParam {
            name: name.clone(),
            description: prop
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            kind: ParamKind::from_schema_type(prop.get("type").and_then(Value::as_str)),
            required: required.contains(&name.as_str()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "description": "First operand"},
                "b": {"type": "number", "description": "Second operand"}
            },
            "required": ["a", "b"]
        })
    }

    #[test]
    fn test_normalize_params() {
        let desc =
            ToolDescriptor::from_listing("add".into(), "Add two numbers".into(), add_schema());

        assert_eq!(desc.params.len(), 2);
        let a = desc.param("a").unwrap();
        assert_eq!(a.kind, ParamKind::Number);
        assert!(a.required);
        assert_eq!(a.description, "First operand");
        assert_eq!(desc.required_params().count(), 2);
    }

    #[test]
    fn test_params_sorted_by_name() {
        let schema = json!({
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "string"},
                "mid": {"type": "string"}
            }
        });
        let desc = ToolDescriptor::from_listing("t".into(), String::new(), schema);
        let names: Vec<_> = desc.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_schema_without_properties() {
        let desc = ToolDescriptor::from_listing("ping".into(), String::new(), json!({}));
        assert!(desc.params.is_empty());
    }

    #[test]
    fn test_unknown_type_is_opaque() {
        let schema = json!({"properties": {"blob": {"type": "array"}}});
        let desc = ToolDescriptor::from_listing("t".into(), String::new(), schema);
        assert_eq!(desc.param("blob").unwrap().kind, ParamKind::Opaque);
        assert!(!desc.param("blob").unwrap().required);
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(
            ParamKind::Integer.coerce("days", " 5 ").unwrap(),
            json!(5i64)
        );
        assert!(ParamKind::Integer.coerce("days", "five").is_err());
        assert!(ParamKind::Integer.coerce("days", "5.5").is_err());
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(ParamKind::Number.coerce("a", "5").unwrap(), json!(5.0));
        assert_eq!(ParamKind::Number.coerce("a", "2.5").unwrap(), json!(2.5));
        assert!(ParamKind::Number.coerce("a", "NaN").is_err());
        assert!(ParamKind::Number.coerce("a", "abc").is_err());
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(
            ParamKind::Boolean.coerce("degrees", "Yes").unwrap(),
            json!(true)
        );
        assert_eq!(
            ParamKind::Boolean.coerce("degrees", "0").unwrap(),
            json!(false)
        );
        assert!(ParamKind::Boolean.coerce("degrees", "maybe").is_err());
    }

    #[test]
    fn test_coerce_opaque_passthrough() {
        assert_eq!(
            ParamKind::Opaque.coerce("blob", "[1,2]").unwrap(),
            json!("[1,2]")
        );
    }

    #[test]
    fn test_coercion_error_message() {
        let err = ParamKind::Number.coerce("a", "abc").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("number"));
        assert!(msg.contains("'a'"));
        assert!(msg.contains("abc"));
    }
}
