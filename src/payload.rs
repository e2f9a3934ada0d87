//! Request payload construction and the diff step.
//!
//! A [`Payload`] is built from a [`DesiredState`] through one operation's
//! routing table. Unset parameters never reach any slot.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::{Map, Value};

use crate::descriptor::OperationSpec;
use crate::error::{ReconcileError, Result};
use crate::transport::{HttpMethod, HttpRequest};
use crate::types::DesiredState;

/// Characters escaped when a value is substituted into a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Values routed into the path, query and body slots of one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    /// Path placeholder values, already converted to text.
    pub path: BTreeMap<String, String>,
    /// Query pairs in routing order; list values repeat their key.
    pub query: Vec<(String, String)>,
    /// JSON body, nested under `wrapper` when one is set.
    pub body: Map<String, Value>,
    /// Key the body fields are nested under (`spec` for `/rest` endpoints).
    pub wrapper: Option<String>,
}

impl Payload {
    /// Override a path value (used once an identifier has been resolved).
    pub fn set_path(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.path.insert(name.into(), value.into());
    }

    /// Body fields, looking through the wrapper.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        match &self.wrapper {
            Some(key) => self.body.get(key).and_then(Value::as_object),
            None => Some(&self.body),
        }
    }

    /// Drop body fields that already match the remote attributes.
    pub fn prune(&mut self, current: &Map<String, Value>) {
        prune_unchanged(&mut self.body, current, self.wrapper.as_deref());
    }

    /// Whether the body carries nothing to write.
    pub fn is_noop(&self) -> bool {
        is_noop_update(&self.body, self.wrapper.as_deref())
    }

    /// Render the request for `spec`.
    pub fn to_request(&self, spec: &OperationSpec) -> Result<HttpRequest> {
        let path = render_path(&spec.path, &self.path)?;
        let mut request = HttpRequest::new(spec.method, path).with_query(self.query.clone());
        let send_body = !self.body.is_empty()
            || matches!(
                spec.method,
                HttpMethod::Post | HttpMethod::Patch | HttpMethod::Put
            );
        if send_body {
            request = request.with_body(Value::Object(self.body.clone()));
        }
        Ok(request)
    }
}

/// Route the set parameters of `desired` into the slots of `spec`.
pub fn prepare_payload(desired: &DesiredState, spec: &OperationSpec) -> Payload {
    let mut payload = Payload {
        wrapper: spec.body_wrapper.clone(),
        ..Default::default()
    };

    for name in &spec.routing.path {
        if let Some(value) = desired.get(name).and_then(path_text) {
            payload.path.insert(name.clone(), value);
        }
    }

    for name in &spec.routing.query {
        if let Some(value) = desired.get(name) {
            encode_query(name, value, &mut payload.query);
        }
    }

    let mut fields = Map::new();
    for name in &spec.routing.body {
        if let Some(value) = desired.get(name) {
            fields.insert(name.clone(), value.clone());
        }
    }
    payload.body = match &spec.body_wrapper {
        Some(key) => {
            let mut wrapped = Map::new();
            wrapped.insert(key.clone(), Value::Object(fields));
            wrapped
        }
        None => fields,
    };

    payload
}

/// Names of the `{placeholders}` in a URL template, in order.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Substitute placeholders with percent-encoded values.
pub fn render_path(template: &str, values: &BTreeMap<String, String>) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            ReconcileError::InvalidDescriptor(format!("unterminated placeholder in '{}'", template))
        })?;
        let name = &after[..end];
        let value = values
            .get(name)
            .ok_or_else(|| ReconcileError::MissingPathParameter(name.to_string()))?;
        rendered.extend(utf8_percent_encode(value, PATH_SEGMENT));
        rest = &after[end + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

/// Remove body fields equal to the remote value.
///
/// Fields nested under `wrapper` are checked too. Values are compared as a
/// whole: a dict that differs in one sub-field is sent in full.
pub fn prune_unchanged(
    body: &mut Map<String, Value>,
    current: &Map<String, Value>,
    wrapper: Option<&str>,
) {
    for (key, remote) in current {
        if body.get(key) == Some(remote) {
            body.remove(key);
        } else if let Some(Value::Object(inner)) = wrapper.and_then(|w| body.get_mut(w)) {
            if inner.get(key) == Some(remote) {
                inner.remove(key);
            }
        }
    }
}

/// Whether an update body is `{}` or an empty wrapper such as `{"spec": {}}`.
pub fn is_noop_update(body: &Map<String, Value>, wrapper: Option<&str>) -> bool {
    if body.is_empty() {
        return true;
    }
    match wrapper {
        Some(key) if body.len() == 1 => matches!(
            body.get(key),
            Some(Value::Object(inner)) if inner.is_empty()
        ),
        _ => false,
    }
}

fn path_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn encode_query(name: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                encode_query(name, item, out);
            }
        }
        Value::Object(_) => out.push((name.to_string(), value.to_string())),
        Value::String(s) => out.push((name.to_string(), s.clone())),
        Value::Bool(b) => out.push((name.to_string(), b.to_string())),
        Value::Number(n) => out.push((name.to_string(), n.to_string())),
    }
}
