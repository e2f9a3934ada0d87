//! Schema types for describing resource parameters.
//!
//! Every resource type declares the parameters a caller may set. The schema
//! drives argument validation and tells the descriptor builder which field
//! names the routing tables may reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The type of a parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A boolean value.
    Bool,
    /// A list of values of a single type.
    List(Box<ParameterType>),
    /// A free-form mapping (nested specs such as `backing`).
    Dict,
    /// A dynamic type that can hold any value (use sparingly).
    Dynamic,
}

impl ParameterType {
    /// Create a list type.
    pub fn list(element_type: ParameterType) -> Self {
        Self::List(Box::new(element_type))
    }
}

/// Describes how a parameter can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParameterFlags {
    /// The parameter must be set by the caller.
    #[serde(default)]
    pub required: bool,
    /// The parameter carries a secret and must never be logged.
    #[serde(default)]
    pub sensitive: bool,
}

impl ParameterFlags {
    /// Create flags for a required parameter.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional parameter.
    pub fn optional() -> Self {
        Self::default()
    }

    /// Mark the parameter as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Describes a single parameter in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// The type of the parameter.
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Flags describing how the parameter can be used.
    #[serde(flatten)]
    pub flags: ParameterFlags,
    /// Human-readable description of the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Closed set of accepted values, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Default value applied when the caller leaves the parameter unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Parameter {
    /// Create a new parameter with the given type and flags.
    pub fn new(param_type: ParameterType, flags: ParameterFlags) -> Self {
        Self {
            param_type,
            flags,
            description: None,
            choices: Vec::new(),
            default: None,
        }
    }

    /// Create a required string parameter.
    pub fn required_string() -> Self {
        Self::new(ParameterType::String, ParameterFlags::required())
    }

    /// Create an optional string parameter.
    pub fn optional_string() -> Self {
        Self::new(ParameterType::String, ParameterFlags::optional())
    }

    /// Create an optional int64 parameter.
    pub fn optional_int64() -> Self {
        Self::new(ParameterType::Int64, ParameterFlags::optional())
    }

    /// Create an optional bool parameter.
    pub fn optional_bool() -> Self {
        Self::new(ParameterType::Bool, ParameterFlags::optional())
    }

    /// Create a required dict parameter.
    pub fn required_dict() -> Self {
        Self::new(ParameterType::Dict, ParameterFlags::required())
    }

    /// Create an optional dict parameter.
    pub fn optional_dict() -> Self {
        Self::new(ParameterType::Dict, ParameterFlags::optional())
    }

    /// Create an optional list parameter with the given element type.
    pub fn optional_list(element_type: ParameterType) -> Self {
        Self::new(ParameterType::list(element_type), ParameterFlags::optional())
    }

    /// Set the description for this parameter.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict the parameter to a closed set of values.
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Set a default value for this parameter.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark this parameter as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// Parameter schema for one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Parameters keyed by name.
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the schema.
    pub fn with_parameter(mut self, name: impl Into<String>, parameter: Parameter) -> Self {
        self.parameters.insert(name.into(), parameter);
        self
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Whether the schema declares a parameter with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Whether the named parameter is marked sensitive.
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.parameters
            .get(name)
            .map(|p| p.flags.sensitive)
            .unwrap_or(false)
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A diagnostic message produced while checking caller input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The parameter path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the parameter path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameter_flags() {
        let required = ParameterFlags::required();
        assert!(required.required);
        assert!(!required.sensitive);

        let optional = ParameterFlags::optional();
        assert!(!optional.required);

        let sensitive = ParameterFlags::required().sensitive();
        assert!(sensitive.sensitive);
    }

    #[test]
    fn test_parameter_builders() {
        let param = Parameter::optional_string()
            .with_description("MAC address type")
            .with_choices(["ASSIGNED", "GENERATED", "MANUAL"]);

        assert_eq!(param.param_type, ParameterType::String);
        assert!(!param.flags.required);
        assert_eq!(param.description.as_deref(), Some("MAC address type"));
        assert_eq!(param.choices.len(), 3);
    }

    #[test]
    fn test_schema_builder() {
        let schema = Schema::new()
            .with_parameter("vm", Parameter::required_string())
            .with_parameter("password", Parameter::optional_string().sensitive())
            .with_parameter("backing", Parameter::optional_dict());

        assert!(schema.contains("vm"));
        assert!(schema.contains("backing"));
        assert!(!schema.contains("nic"));
        assert!(schema.is_sensitive("password"));
        assert!(!schema.is_sensitive("vm"));
        assert!(!schema.is_sensitive("missing"));
    }

    #[test]
    fn test_schema_serde_shape() {
        let schema = Schema::new().with_parameter(
            "state",
            Parameter::optional_string()
                .with_choices(["present", "absent"])
                .with_default(json!("present")),
        );

        let encoded = serde_json::to_value(&schema).unwrap();
        assert_eq!(encoded["parameters"]["state"]["type"], "string");
        assert_eq!(encoded["parameters"]["state"]["default"], "present");

        let decoded: Schema = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, schema);
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid value")
            .with_detail("Expected one of: present, absent")
            .with_attribute("state");

        assert!(err.is_error());
        assert_eq!(err.summary, "Invalid value");
        assert_eq!(err.attribute, Some("state".to_string()));
        assert!(!Diagnostic::warning("heads up").is_error());
    }
}
