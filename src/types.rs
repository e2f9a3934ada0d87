//! Core data types shared by the engine, the resolver and the reporter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The lifecycle verb a caller asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// The resource must exist with the desired attributes.
    #[default]
    Present,
    /// The resource must not exist.
    Absent,
    /// A named, non-idempotent action such as `connect` or `publish`.
    Action(String),
}

impl LifecycleState {
    /// Create an action state.
    pub fn action(name: impl Into<String>) -> Self {
        Self::Action(name.into())
    }

    /// The verb as it appears in caller arguments.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Action(name) => name,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<&str> for LifecycleState {
    fn from(s: &str) -> Self {
        match s {
            "" | "present" => Self::Present,
            "absent" => Self::Absent,
            other => Self::Action(other.to_string()),
        }
    }
}

impl Serialize for LifecycleState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LifecycleState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Caller-supplied target configuration for one resource.
///
/// A field that is absent or `null` is *unset*: it is excluded from diffs and
/// outgoing payloads. `false`, `""` and `0` are ordinary values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DesiredState {
    /// Parameter values keyed by name.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// The requested lifecycle verb.
    #[serde(default)]
    pub state: LifecycleState,
}

impl DesiredState {
    /// Create an empty desired state for the given verb.
    pub fn new(state: LifecycleState) -> Self {
        Self {
            params: Map::new(),
            state,
        }
    }

    /// Create a desired state from a JSON object of parameters.
    ///
    /// Non-object values produce an empty parameter set.
    pub fn from_params(params: Value, state: LifecycleState) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { params, state }
    }

    /// Set a parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a parameter in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    /// Get a parameter, treating `null` as unset.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    /// Get a parameter as a string slice.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Whether the parameter has a value.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over set parameters only.
    pub fn iter_set(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params.iter().filter(|(_, v)| !v.is_null())
    }
}

/// A resource as currently held by the remote API.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Identifier within the collection, when one could be determined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Current remote attribute values.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl RemoteItem {
    /// Create an item from its parts.
    pub fn new(id: Option<String>, attributes: Map<String, Value>) -> Self {
        Self { id, attributes }
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// The attributes as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.attributes.clone())
    }

    /// Consume the item into its attributes as a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.attributes)
    }
}

/// The uniform result envelope returned for every reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeResult {
    /// Normalized resource attributes (or a list of them for reads).
    pub value: Value,
    /// Resource identifier, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the invocation is believed to have mutated remote state.
    pub changed: bool,
    /// HTTP status of the decisive call.
    pub status: u16,
    /// The operation label (`get`, `create`, `update`, `delete` or an action).
    pub operation: String,
}

impl ChangeResult {
    /// A result that reports no change.
    pub fn unchanged(value: Value, status: u16, operation: impl Into<String>) -> Self {
        Self {
            value,
            id: None,
            changed: false,
            status,
            operation: operation.into(),
        }
    }

    /// Attach an identifier.
    pub fn with_id(mut self, id: Option<String>) -> Self {
        if id.is_some() {
            self.id = id;
        }
        self
    }
}
