//! Tool contract: typed parameter metadata and argument validation.
//!
//! A [`ToolSpec`] describes one tool's name, description and parameters.
//! [`ToolSpec::validate`] checks raw JSON arguments against it (presence,
//! type, enum membership, inclusive numeric bounds), fills defaults and hands
//! back the normalized object. Unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

use crate::envelope::ResultEnvelope;

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Object,
    Array,
    StringList,
    Enum(Vec<String>),
}

impl ParamType {
    /// Enum over the given string values.
    pub fn one_of(values: &[&str]) -> Self {
        ParamType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// Check a JSON value against this parameter type.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            ParamType::String => expect(value.is_string(), "string", value),
            ParamType::Integer => expect(value.is_i64() || value.is_u64(), "integer", value),
            ParamType::Boolean => expect(value.is_boolean(), "boolean", value),
            ParamType::Object => expect(value.is_object(), "object", value),
            ParamType::Array => expect(value.is_array(), "array", value),
            ParamType::StringList => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| format!("expected array, got {}", value_type_name(value)))?;
                for (i, item) in arr.iter().enumerate() {
                    if !item.is_string() {
                        return Err(format!(
                            "expected string at index {}, got {}",
                            i,
                            value_type_name(item)
                        ));
                    }
                }
                Ok(())
            }
            ParamType::Enum(variants) => {
                let s = value.as_str().ok_or_else(|| {
                    format!("expected string for enum, got {}", value_type_name(value))
                })?;
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(format!(
                        "invalid value '{}', expected one of: {}",
                        s,
                        variants.join(", ")
                    ))
                }
            }
        }
    }

    /// JSON-Schema fragment for this type.
    fn json_schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::Object => json!({"type": "object"}),
            ParamType::Array => json!({"type": "array"}),
            ParamType::StringList => json!({"type": "array", "items": {"type": "string"}}),
            ParamType::Enum(variants) => json!({"type": "string", "enum": variants}),
        }
    }
}

fn expect(ok: bool, expected: &str, value: &Value) -> Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(format!("expected {}, got {}", expected, value_type_name(value)))
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Inclusive numeric bounds.
    pub fn with_range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        self.param_type.validate(value)?;

        if self.required && self.param_type == ParamType::String {
            if value.as_str().is_some_and(|s| s.trim().is_empty()) {
                return Err("must not be empty".to_string());
            }
        }

        if let Some(n) = value.as_i64() {
            if let Some(min) = self.minimum {
                if n < min {
                    return Err(self.range_message(n));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    return Err(self.range_message(n));
                }
            }
        } else if value.is_u64() && self.maximum.is_some() {
            // Larger than i64::MAX, so above any declared maximum.
            return Err(format!("{} is out of range", value));
        }

        Ok(())
    }

    fn range_message(&self, n: i64) -> String {
        match (self.minimum, self.maximum) {
            (Some(min), Some(max)) => format!("must be between {min} and {max}, got {n}"),
            (Some(min), None) => format!("must be at least {min}, got {n}"),
            (None, Some(max)) => format!("must be at most {max}, got {n}"),
            (None, None) => format!("{n} is out of range"),
        }
    }

    fn json_schema(&self) -> Value {
        let mut schema = self.param_type.json_schema();
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("description".into(), json!(self.description));
            if let Some(default) = &self.default {
                obj.insert("default".into(), default.clone());
            }
            if let Some(min) = self.minimum {
                obj.insert("minimum".into(), json!(min));
            }
            if let Some(max) = self.maximum {
                obj.insert("maximum".into(), json!(max));
            }
        }
        schema
    }
}

// =============================================================================
// Validation errors
// =============================================================================

/// One rejected argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// All problems found in one argument object, rendered `"a: x; b: y"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.0))]
pub struct ValidationError(pub Vec<FieldError>);

fn render(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn single(field: &str, reason: impl Into<String>) -> Self {
        Self(vec![FieldError {
            field: field.to_string(),
            reason: reason.into(),
        }])
    }
}

impl From<ValidationError> for ResultEnvelope {
    fn from(err: ValidationError) -> Self {
        ResultEnvelope::validation(err.to_string())
    }
}

// =============================================================================
// Tool spec
// =============================================================================

/// Complete tool metadata entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, parameters: Vec<ParamDef>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Validate raw arguments and fill defaults.
    ///
    /// `null` is treated as an empty object. Every failure is collected so the
    /// caller sees all of them at once.
    pub fn validate(&self, raw: &Value) -> Result<Map<String, Value>, ValidationError> {
        let mut args = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ValidationError::single(
                    "arguments",
                    format!("expected object, got {}", value_type_name(other)),
                ))
            }
        };

        let mut errors = Vec::new();
        for param in &self.parameters {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => errors.push(FieldError {
                    field: param.name.clone(),
                    reason: "missing required field".to_string(),
                }),
                None | Some(Value::Null) => {
                    if let Some(default) = &param.default {
                        args.insert(param.name.clone(), default.clone());
                    } else {
                        args.remove(&param.name);
                    }
                }
                Some(value) => {
                    if let Err(reason) = param.check(value) {
                        errors.push(FieldError {
                            field: param.name.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(args)
        } else {
            Err(ValidationError(errors))
        }
    }

    /// JSON-Schema object advertised to callers.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Listing entry: `{name, description, inputSchema}`.
    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_spec() -> ToolSpec {
        ToolSpec::new(
            "get_executions",
            "Get execution history",
            vec![
                ParamDef::required("workflow_id", ParamType::String, "Workflow to inspect"),
                ParamDef::optional(
                    "status",
                    ParamType::one_of(&["success", "error", "waiting", "all"]),
                    "Status filter",
                )
                .with_default(json!("all")),
                ParamDef::optional("limit", ParamType::Integer, "Maximum results")
                    .with_default(json!(20))
                    .with_range(1, 250),
                ParamDef::optional("tags", ParamType::StringList, "Tags"),
            ],
        )
    }

    #[test]
    fn test_validate_fills_defaults() {
        let args = sample_spec().validate(&json!({"workflow_id": "7"})).unwrap();
        assert_eq!(args["status"], "all");
        assert_eq!(args["limit"], 20);
        assert!(!args.contains_key("tags"));
    }

    #[test]
    fn test_validate_keeps_provided_values() {
        let args = sample_spec()
            .validate(&json!({"workflow_id": "7", "limit": 5}))
            .unwrap();
        assert_eq!(args["limit"], 5);
    }

    #[test]
    fn test_null_arguments_treated_as_empty() {
        let err = sample_spec().validate(&Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "workflow_id: missing required field");
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let err = sample_spec().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "arguments: expected object, got array");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let args = sample_spec()
            .validate(&json!({"workflow_id": "7", "bogus": true}))
            .unwrap();
        assert_eq!(args["bogus"], true);
    }

    #[test]
    fn test_all_failures_reported() {
        let err = sample_spec()
            .validate(&json!({"status": "bad", "limit": 0, "tags": [1]}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "workflow_id: missing required field; \
             status: invalid value 'bad', expected one of: success, error, waiting, all; \
             limit: must be between 1 and 250, got 0; \
             tags: expected string at index 0, got number"
        );
    }

    #[test]
    fn test_bounds_inclusive() {
        let spec = sample_spec();
        assert!(spec.validate(&json!({"workflow_id": "7", "limit": 1})).is_ok());
        assert!(spec.validate(&json!({"workflow_id": "7", "limit": 250})).is_ok());
        assert!(spec.validate(&json!({"workflow_id": "7", "limit": 251})).is_err());
        assert!(spec.validate(&json!({"workflow_id": "7", "limit": 2.5})).is_err());
    }

    #[test]
    fn test_empty_required_string_rejected() {
        let err = sample_spec().validate(&json!({"workflow_id": "  "})).unwrap_err();
        assert_eq!(err.to_string(), "workflow_id: must not be empty");
    }

    #[test]
    fn test_input_schema_shape() {
        let schema = sample_spec().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["workflow_id"]));
        assert_eq!(schema["properties"]["limit"]["minimum"], 1);
        assert_eq!(schema["properties"]["limit"]["default"], 20);
        assert_eq!(
            schema["properties"]["status"]["enum"],
            json!(["success", "error", "waiting", "all"])
        );
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "string");
    }

    #[test]
    fn test_validation_error_envelope() {
        let env: ResultEnvelope = ValidationError::single("confirm", "must be true").into();
        assert_eq!(
            env.error().unwrap().to_string(),
            "Error (validation_error): confirm: must be true"
        );
    }
}
