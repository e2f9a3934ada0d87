//! Parameter validation helpers.
//!
//! This module validates caller arguments against a resource [`Schema`] before
//! any network traffic happens, and gives detailed error messages.
//!
//! # Example
//!
//! ```
//! use vrest_reconcile::schema::{Parameter, Schema};
//! use vrest_reconcile::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .with_parameter("vm", Parameter::required_string())
//!     .with_parameter("pci_slot_number", Parameter::optional_int64());
//!
//! let args = json!({"vm": "vm-42", "pci_slot_number": 4});
//! assert!(validate(&schema, args.as_object().unwrap()).is_empty());
//!
//! let args = json!({"vm": "vm-42", "pci_slot_number": "four"});
//! let diagnostics = validate(&schema, args.as_object().unwrap());
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("pci_slot_number".to_string()));
//! ```

use crate::schema::{Diagnostic, DiagnosticSeverity, Parameter, ParameterType, Schema};
use serde_json::{Map, Value};

/// Validate caller arguments against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the arguments are valid.
///
/// # Validation Rules
///
/// - Required parameters must be present and non-null
/// - Null means "unset" and is accepted for optional parameters
/// - Set values must match the declared type
/// - Parameters with choices must take one of them
/// - Parameters the schema does not declare are rejected
pub fn validate(schema: &Schema, params: &Map<String, Value>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (name, parameter) in &schema.parameters {
        validate_parameter(parameter, params.get(name), name, &mut diagnostics);
    }

    for name in params.keys() {
        if !schema.contains(name) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported parameter '{}'", name))
                    .with_detail("The resource schema does not declare this parameter")
                    .with_attribute(name.as_str()),
            );
        }
    }

    diagnostics
}

/// Validate arguments, returning Ok if valid or Err with diagnostics.
///
/// This is a convenience wrapper around [`validate`] that returns a Result.
pub fn validate_result(schema: &Schema, params: &Map<String, Value>) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, params);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if arguments are valid against a schema.
///
/// Use [`validate`] to get detailed error information.
pub fn is_valid(schema: &Schema, params: &Map<String, Value>) -> bool {
    validate(schema, params).is_empty()
}

fn validate_parameter(
    parameter: &Parameter,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if parameter.flags.required && parameter.default.is_none() {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required parameter '{}'", path))
                        .with_detail("This parameter is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_type(&parameter.param_type, v, path, diagnostics);
            if diagnostics.len() == before && !parameter.choices.is_empty() {
                validate_choice(parameter, v, path, diagnostics);
            }
        },
    }
}

fn validate_type(
    param_type: &ParameterType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match param_type {
        ParameterType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        ParameterType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        ParameterType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        ParameterType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
        ParameterType::Dict => {
            if !value.is_object() {
                diagnostics.push(type_error(path, "dict", value));
            }
        },
        ParameterType::Dynamic => {},
    }
}

fn validate_choice(
    parameter: &Parameter,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    for candidate in candidates {
        let accepted = candidate
            .as_str()
            .map(|s| parameter.choices.iter().any(|c| c == s))
            .unwrap_or(false);
        if !accepted {
            diagnostics.push(
                Diagnostic::error(format!("Invalid value for parameter '{}'", path))
                    .with_detail(format!(
                        "Expected one of: {}, got {}",
                        parameter.choices.join(", "),
                        candidate
                    ))
                    .with_attribute(path),
            );
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.as_i64().is_some()
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for parameter '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Parameter, ParameterFlags, Schema};
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::new().with_parameter("vm", Parameter::required_string());

        assert!(validate(&schema, &args(json!({"vm": "vm-1"}))).is_empty());

        let diagnostics = validate(&schema, &args(json!({})));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("vm".to_string()));

        let diagnostics = validate(&schema, &args(json!({"vm": null})));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &args(json!({"vm": 123})));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_required_with_default_may_be_omitted() {
        let schema = Schema::new().with_parameter(
            "state",
            Parameter::required_string().with_default(json!("present")),
        );
        assert!(validate(&schema, &args(json!({}))).is_empty());
    }

    #[test]
    fn test_validate_optional_parameter() {
        let schema = Schema::new().with_parameter("port", Parameter::optional_int64());

        assert!(validate(&schema, &args(json!({"port": 443}))).is_empty());
        assert!(validate(&schema, &args(json!({}))).is_empty());
        assert!(validate(&schema, &args(json!({"port": null}))).is_empty());
        assert_eq!(validate(&schema, &args(json!({"port": "443"}))).len(), 1);
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::new().with_parameter("size_MiB", Parameter::optional_int64());

        assert!(validate(&schema, &args(json!({"size_MiB": 1024}))).is_empty());
        assert!(validate(&schema, &args(json!({"size_MiB": 1024.0}))).is_empty());
        assert_eq!(validate(&schema, &args(json!({"size_MiB": 10.5}))).len(), 1);
        assert_eq!(validate(&schema, &args(json!({"size_MiB": u64::MAX}))).len(), 1);
    }

    #[test]
    fn test_validate_bool() {
        let schema = Schema::new().with_parameter("start_connected", Parameter::optional_bool());

        assert!(validate(&schema, &args(json!({"start_connected": false}))).is_empty());
        assert_eq!(
            validate(&schema, &args(json!({"start_connected": "true"}))).len(),
            1
        );
    }

    #[test]
    fn test_validate_list() {
        let schema = Schema::new().with_parameter(
            "filter_spec.users",
            Parameter::optional_list(ParameterType::String),
        );

        assert!(validate(&schema, &args(json!({"filter_spec.users": ["a", "b"]}))).is_empty());
        assert!(validate(&schema, &args(json!({"filter_spec.users": []}))).is_empty());

        let diagnostics = validate(&schema, &args(json!({"filter_spec.users": ["a", 1]})));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("filter_spec.users.1".to_string())
        );

        assert_eq!(
            validate(&schema, &args(json!({"filter_spec.users": "a"}))).len(),
            1
        );
    }

    #[test]
    fn test_validate_dict() {
        let schema = Schema::new().with_parameter("backing", Parameter::optional_dict());

        assert!(validate(
            &schema,
            &args(json!({"backing": {"type": "STANDARD_PORTGROUP", "network": "net-1"}}))
        )
        .is_empty());
        assert_eq!(validate(&schema, &args(json!({"backing": "net-1"}))).len(), 1);
    }

    #[test]
    fn test_validate_choices() {
        let schema = Schema::new().with_parameter(
            "mac_type",
            Parameter::optional_string().with_choices(["ASSIGNED", "GENERATED", "MANUAL"]),
        );

        assert!(validate(&schema, &args(json!({"mac_type": "MANUAL"}))).is_empty());

        let diagnostics = validate(&schema, &args(json!({"mac_type": "RANDOM"})));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("ASSIGNED, GENERATED, MANUAL"));
    }

    #[test]
    fn test_validate_list_choices() {
        let schema = Schema::new().with_parameter(
            "filter_spec.status",
            Parameter::optional_list(ParameterType::String)
                .with_choices(["PENDING", "RUNNING", "SUCCEEDED", "FAILED"]),
        );

        assert!(validate(&schema, &args(json!({"filter_spec.status": ["RUNNING"]}))).is_empty());
        assert_eq!(
            validate(&schema, &args(json!({"filter_spec.status": ["RUNNING", "LOST"]}))).len(),
            1
        );
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let schema = Schema::new().with_parameter("vm", Parameter::required_string());

        let diagnostics = validate(&schema, &args(json!({"vm": "vm-1", "colour": "red"})));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Unsupported parameter"));
    }

    #[test]
    fn test_validate_dynamic_type() {
        let schema = Schema::new().with_parameter(
            "extra",
            Parameter::new(ParameterType::Dynamic, ParameterFlags::required()),
        );

        assert!(validate(&schema, &args(json!({"extra": "string"}))).is_empty());
        assert!(validate(&schema, &args(json!({"extra": [1, 2, 3]}))).is_empty());
    }

    #[test]
    fn test_validate_multiple_errors() {
        let schema = Schema::new()
            .with_parameter("vm", Parameter::required_string())
            .with_parameter("port", Parameter::optional_int64())
            .with_parameter("force_add", Parameter::optional_bool());

        let diagnostics = validate(
            &schema,
            &args(json!({"vm": 1, "port": "x", "force_add": "yes"})),
        );
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::new().with_parameter("vm", Parameter::required_string());

        assert!(is_valid(&schema, &args(json!({"vm": "vm-1"}))));
        assert!(!is_valid(&schema, &args(json!({}))));
        assert!(validate_result(&schema, &args(json!({"vm": "vm-1"}))).is_ok());
        assert_eq!(validate_result(&schema, &args(json!({}))).unwrap_err().len(), 1);
    }
}
