//! Static description of one REST resource type.
//!
//! A [`ResourceDescriptor`] captures everything that differs between resource
//! types: URL templates, the operations that exist, and which desired
//! parameters go into the path, the query string and the body of each call.
//! Descriptors are validated once at construction so that a bad routing
//! table or an unknown operation name fails at load time, never halfway
//! through a reconciliation.
//!
//! # Example
//!
//! ```
//! use vrest_reconcile::descriptor::{FieldRouting, Operation, OperationSpec, ResourceDescriptor};
//! use vrest_reconcile::schema::{Parameter, Schema};
//! use vrest_reconcile::transport::HttpMethod;
//!
//! let schema = Schema::new()
//!     .with_parameter("library_id", Parameter::optional_string())
//!     .with_parameter("name", Parameter::optional_string());
//!
//! let descriptor = ResourceDescriptor::builder("content_locallibrary", schema)
//!     .id_param("library_id")
//!     .unicity_key("name")
//!     .operation(
//!         OperationSpec::new(Operation::Create, HttpMethod::Post, "/api/content/local-library")
//!             .with_routing(FieldRouting::new().body(["name"])),
//!     )
//!     .operation(
//!         OperationSpec::new(Operation::Get, HttpMethod::Get, "/api/content/local-library/{library_id}")
//!             .with_routing(FieldRouting::new().path(["library_id"])),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(descriptor.item_path(), Some("/api/content/local-library/{library_id}"));
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReconcileError, Result};
use crate::payload::placeholders;
use crate::schema::{Parameter, Schema};
use crate::transport::HttpMethod;
use crate::types::LifecycleState;

/// Verbs that cannot be used as action names.
pub const RESERVED_VERBS: &[&str] = &[
    "create", "get", "list", "update", "delete", "present", "absent",
];

/// Name of the lifecycle parameter every descriptor schema carries.
pub const STATE_PARAM: &str = "state";

/// An operation a resource type supports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// Create a new item in the collection.
    Create,
    /// Read a single item.
    Get,
    /// List the collection.
    List,
    /// Modify an existing item.
    Update,
    /// Remove an item.
    Delete,
    /// A named action such as `connect` or `publish`.
    Action(String),
}

impl Operation {
    /// Create an action operation.
    pub fn action(name: impl Into<String>) -> Self {
        Self::Action(name.into())
    }

    /// The operation name, also used as the result label.
    pub fn name(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Action(name) => name,
        }
    }

    /// Parse an operation name. Unknown names become actions.
    pub fn from_name(name: &str) -> Self {
        match name {
            "create" => Self::Create,
            "get" => Self::Get,
            "list" => Self::List,
            "update" => Self::Update,
            "delete" => Self::Delete,
            other => Self::Action(other.to_string()),
        }
    }

    /// Whether this is a named action.
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Operation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_name(&raw))
    }
}

/// Which desired parameters go into which slot of a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldRouting {
    /// Query string parameters. Dotted names are sent verbatim.
    #[serde(default)]
    pub query: Vec<String>,
    /// JSON body fields.
    #[serde(default)]
    pub body: Vec<String>,
    /// URL template placeholders.
    #[serde(default)]
    pub path: Vec<String>,
}

impl FieldRouting {
    /// An empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route parameters into the query string.
    pub fn query<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.extend(names.into_iter().map(Into::into));
        self
    }

    /// Route parameters into the body.
    pub fn body<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body.extend(names.into_iter().map(Into::into));
        self
    }

    /// Route parameters into the path.
    pub fn path<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path.extend(names.into_iter().map(Into::into));
        self
    }

    /// Every routed parameter name.
    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.query.iter().chain(&self.body).chain(&self.path)
    }
}

/// One HTTP call a resource type can make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// The operation this call implements.
    pub operation: Operation,
    /// HTTP method.
    pub method: HttpMethod,
    /// URL template, possibly ending in `?action=<name>`.
    pub path: String,
    /// Parameter routing.
    #[serde(default)]
    pub routing: FieldRouting,
    /// Key the body is nested under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_wrapper: Option<String>,
}

impl OperationSpec {
    /// Create an operation with an empty routing table.
    pub fn new(operation: Operation, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            operation,
            method,
            path: path.into(),
            routing: FieldRouting::default(),
            body_wrapper: None,
        }
    }

    /// Set the routing table.
    pub fn with_routing(mut self, routing: FieldRouting) -> Self {
        self.routing = routing;
        self
    }

    /// Nest the body under `key`.
    pub fn with_body_wrapper(mut self, key: impl Into<String>) -> Self {
        self.body_wrapper = Some(key.into());
        self
    }

    /// Whether the URL template has a `{name}` placeholder.
    pub fn has_placeholder(&self, name: &str) -> bool {
        placeholders(&self.path).iter().any(|p| p == name)
    }
}

/// Matches a desired parameter against a remote attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnicityKey {
    /// Desired parameter name.
    pub param: String,
    /// Remote attribute name, when it differs from `param`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl UnicityKey {
    /// A key whose parameter and attribute share a name.
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            attribute: None,
        }
    }

    /// The remote attribute compared against.
    pub fn attribute(&self) -> &str {
        self.attribute.as_deref().unwrap_or(&self.param)
    }
}

/// What the engine must do for a lifecycle verb.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step<'a> {
    /// Create if missing, else update the existing item.
    Ensure(&'a OperationSpec),
    /// Diff then update a resource that always exists.
    Update(&'a OperationSpec),
    /// Read-only resource: fetch and report.
    Read,
    /// Remove the item.
    Delete(&'a OperationSpec),
    /// Issue a named action without diffing.
    Action(&'a OperationSpec),
}

/// Static metadata for one resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    name: String,
    schema: Schema,
    id_param: Option<String>,
    unicity_keys: Vec<UnicityKey>,
    operations: Vec<OperationSpec>,
}

impl ResourceDescriptor {
    /// Start building a descriptor.
    pub fn builder(name: impl Into<String>, schema: Schema) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.into(),
            schema,
            id_param: None,
            unicity_keys: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Resource type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter schema, including `state`.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parameter holding the item identifier.
    pub fn id_param(&self) -> Option<&str> {
        self.id_param.as_deref()
    }

    /// Keys used to find an item when no identifier is given.
    pub fn unicity_keys(&self) -> &[UnicityKey] {
        &self.unicity_keys
    }

    /// All operations.
    pub fn operations(&self) -> &[OperationSpec] {
        &self.operations
    }

    /// Look up an operation.
    pub fn operation(&self, operation: &Operation) -> Option<&OperationSpec> {
        self.operations.iter().find(|op| &op.operation == operation)
    }

    /// Whether the operation exists.
    pub fn supports(&self, operation: &Operation) -> bool {
        self.operation(operation).is_some()
    }

    /// URL template of the collection.
    pub fn collection_path(&self) -> Option<&str> {
        self.operation(&Operation::List)
            .or_else(|| self.operation(&Operation::Create))
            .map(|op| op.path.as_str())
    }

    /// URL template of a single item.
    pub fn item_path(&self) -> Option<&str> {
        self.operation(&Operation::Get).map(|op| op.path.as_str())
    }

    /// Lifecycle verbs this resource accepts.
    pub fn supported_states(&self) -> Vec<String> {
        supported_states(&self.operations)
    }

    /// Resolve a lifecycle verb to a step.
    pub fn plan(&self, state: &LifecycleState) -> Result<Step<'_>> {
        let step = match state {
            LifecycleState::Present => {
                if let Some(create) = self.operation(&Operation::Create) {
                    Some(Step::Ensure(create))
                } else if let Some(update) = self.operation(&Operation::Update) {
                    Some(Step::Update(update))
                } else if self.supports(&Operation::Get) || self.supports(&Operation::List) {
                    Some(Step::Read)
                } else {
                    None
                }
            }
            LifecycleState::Absent => self.operation(&Operation::Delete).map(Step::Delete),
            LifecycleState::Action(name) => self
                .operation(&Operation::action(name.clone()))
                .map(Step::Action),
        };

        step.ok_or_else(|| ReconcileError::UnsupportedOperation {
            resource: self.name.clone(),
            operation: state.to_string(),
        })
    }
}

/// Builder for [`ResourceDescriptor`].
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    name: String,
    schema: Schema,
    id_param: Option<String>,
    unicity_keys: Vec<UnicityKey>,
    operations: Vec<OperationSpec>,
}

impl DescriptorBuilder {
    /// Set the identifier parameter.
    pub fn id_param(mut self, name: impl Into<String>) -> Self {
        self.id_param = Some(name.into());
        self
    }

    /// Add a unicity key matched against the attribute of the same name.
    pub fn unicity_key(mut self, name: impl Into<String>) -> Self {
        self.unicity_keys.push(UnicityKey::new(name));
        self
    }

    /// Add a unicity key matched against a differently named attribute.
    pub fn unicity_key_as(mut self, param: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.unicity_keys.push(UnicityKey {
            param: param.into(),
            attribute: Some(attribute.into()),
        });
        self
    }

    /// Add an operation.
    pub fn operation(mut self, spec: OperationSpec) -> Self {
        self.operations.push(spec);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<ResourceDescriptor> {
        let DescriptorBuilder {
            name,
            mut schema,
            id_param,
            unicity_keys,
            operations,
        } = self;

        let invalid = |msg: String| ReconcileError::InvalidDescriptor(format!("{}: {}", name, msg));

        if name.trim().is_empty() {
            return Err(ReconcileError::InvalidDescriptor(
                "resource name cannot be empty".to_string(),
            ));
        }
        if operations.is_empty() {
            return Err(invalid("no operations declared".to_string()));
        }

        let mut seen = BTreeSet::new();
        for spec in &operations {
            if let Operation::Action(action) = &spec.operation {
                if !is_valid_action_name(action) {
                    return Err(invalid(format!("invalid action name '{}'", action)));
                }
            }
            if !seen.insert(spec.operation.clone()) {
                return Err(invalid(format!("duplicate operation '{}'", spec.operation)));
            }
            for field in spec.routing.fields() {
                if field == STATE_PARAM || !schema.contains(field) {
                    return Err(invalid(format!(
                        "operation '{}' routes unknown parameter '{}'",
                        spec.operation, field
                    )));
                }
            }
            for placeholder in placeholders(&spec.path) {
                if !spec.routing.path.contains(&placeholder) {
                    return Err(invalid(format!(
                        "placeholder '{{{}}}' of operation '{}' is not routed",
                        placeholder, spec.operation
                    )));
                }
            }
            if let Some(wrapper) = &spec.body_wrapper {
                if wrapper.is_empty() {
                    return Err(invalid(format!(
                        "operation '{}' has an empty body wrapper",
                        spec.operation
                    )));
                }
            }
        }

        if let Some(id) = &id_param {
            if !schema.contains(id) {
                return Err(invalid(format!("unknown id parameter '{}'", id)));
            }
        }
        for key in &unicity_keys {
            if !schema.contains(&key.param) {
                return Err(invalid(format!("unknown unicity key '{}'", key.param)));
            }
        }

        if !schema.contains(STATE_PARAM) {
            schema = schema.with_parameter(STATE_PARAM, state_parameter(&operations));
        }

        Ok(ResourceDescriptor {
            name,
            schema,
            id_param,
            unicity_keys,
            operations,
        })
    }
}

/// Serializable form of a descriptor, for loading from static data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorConfig {
    /// Resource type name.
    pub name: String,
    /// Parameter schema.
    #[serde(default)]
    pub schema: Schema,
    /// Identifier parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_param: Option<String>,
    /// Unicity keys.
    #[serde(default)]
    pub unicity_keys: Vec<UnicityKey>,
    /// Operations.
    pub operations: Vec<OperationSpec>,
}

impl DescriptorConfig {
    /// Parse a descriptor from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl TryFrom<DescriptorConfig> for ResourceDescriptor {
    type Error = ReconcileError;

    fn try_from(config: DescriptorConfig) -> Result<Self> {
        let mut builder = ResourceDescriptor::builder(config.name, config.schema);
        builder.id_param = config.id_param;
        builder.unicity_keys = config.unicity_keys;
        builder.operations = config.operations;
        builder.build()
    }
}

fn is_valid_action_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    starts_ok
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_VERBS.contains(&name)
}

fn supported_states(operations: &[OperationSpec]) -> Vec<String> {
    let has = |op: Operation| operations.iter().any(|spec| spec.operation == op);
    let mut states = Vec::new();
    if has(Operation::Create) || has(Operation::Update) || has(Operation::Get) || has(Operation::List)
    {
        states.push("present".to_string());
    }
    if has(Operation::Delete) {
        states.push("absent".to_string());
    }
    states.extend(
        operations
            .iter()
            .filter(|spec| spec.operation.is_action())
            .map(|spec| spec.operation.name().to_string()),
    );
    states
}

fn state_parameter(operations: &[OperationSpec]) -> Parameter {
    let states = supported_states(operations);
    let default = if states.iter().any(|s| s == "present") {
        Some("present".to_string())
    } else if states.len() == 1 {
        states.first().cloned()
    } else {
        None
    };

    let param = Parameter::optional_string()
        .with_description("Lifecycle verb to apply")
        .with_choices(states);
    match default {
        Some(default) => param.with_default(Value::String(default)),
        None => param,
    }
}
