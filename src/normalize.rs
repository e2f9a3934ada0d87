//! Response normalization.
//!
//! vCenter releases before 7.0.2 wrap every payload as `{"value": ...}`; later
//! releases send the payload bare. The functions here reduce both shapes, plus
//! empty and non-JSON answers, to one canonical form so the engine never has
//! to care which release it is talking to.

use serde_json::{Map, Value};

use crate::transport::HttpResponse;
use crate::types::RemoteItem;

/// Envelope key used by the pre-7.0.2 API.
pub const VALUE_KEY: &str = "value";

/// A response body reduced to what the engine can act on.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A single resource with its attributes.
    Item(RemoteItem),
    /// A collection listing.
    List(Vec<RemoteItem>),
    /// Only an identifier; a follow-up read is needed for attributes.
    Identifier(String),
    /// Nothing usable (204, empty body, non-JSON).
    Empty,
}

/// Whether a `Content-Type` value denotes JSON.
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Parse a raw body, falling back to `{}` for anything that is not JSON.
pub fn parse_body(content_type: Option<&str>, raw: Option<&str>) -> Value {
    let empty = || Value::Object(Map::new());

    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return empty(),
    };
    match content_type {
        Some(ct) if is_json_content_type(ct) => {}
        _ => return empty(),
    }
    serde_json::from_str(raw).unwrap_or_else(|_| empty())
}

/// Parse the body of a response.
pub fn parse_response(response: &HttpResponse) -> Value {
    parse_body(response.content_type(), response.body.as_deref())
}

/// Strip the `value` envelope, if present.
pub fn unwrap_value(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key(VALUE_KEY) => {
            map.remove(VALUE_KEY).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Wrap a payload in the `value` envelope.
pub fn wrap_value(payload: Value) -> Value {
    let mut map = Map::new();
    map.insert(VALUE_KEY.to_string(), payload);
    Value::Object(map)
}

/// Recover an identifier from a creation response.
///
/// Accepts a bare string, `{"value": "id"}` and a single-key mapping whose
/// only value is a string.
pub fn extract_identifier(body: &Value) -> Option<String> {
    match body {
        Value::String(id) => Some(id.clone()),
        Value::Object(map) if map.len() == 1 => match map.values().next() {
            Some(Value::String(id)) => Some(id.clone()),
            Some(inner @ Value::Object(_)) if map.contains_key(VALUE_KEY) => {
                extract_identifier(inner)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Normalize a parsed body.
pub fn normalize(body: Value, id_key: Option<&str>) -> Normalized {
    if let Some(id) = extract_identifier(&body) {
        return Normalized::Identifier(id);
    }
    match unwrap_value(body) {
        Value::Null => Normalized::Empty,
        Value::Object(map) if map.is_empty() => Normalized::Empty,
        Value::Array(items) => Normalized::List(
            items
                .into_iter()
                .map(|item| RemoteItem::from_value(item, id_key))
                .collect(),
        ),
        Value::String(id) => Normalized::Identifier(id),
        Value::Number(n) => Normalized::Identifier(n.to_string()),
        Value::Bool(_) => Normalized::Empty,
        other => Normalized::Item(RemoteItem::from_value(other, id_key)),
    }
}

/// Normalize a body that is known to describe a single item.
///
/// Unlike [`normalize`], a one-attribute item is never mistaken for an
/// identifier.
pub fn normalize_item(body: Value, id_key: Option<&str>) -> RemoteItem {
    RemoteItem::from_value(unwrap_value(body), id_key)
}

/// Normalize a body that is known to be a collection listing.
pub fn normalize_list(body: Value, id_key: Option<&str>) -> Vec<RemoteItem> {
    match unwrap_value(body) {
        Value::Array(items) => items
            .into_iter()
            .map(|item| RemoteItem::from_value(item, id_key))
            .collect(),
        _ => Vec::new(),
    }
}

impl RemoteItem {
    /// Build an item from an unwrapped JSON value.
    ///
    /// The id is taken from `id_key`, then `id`, then the first string
    /// attribute (list stubs lead with their identifier).
    pub fn from_value(value: Value, id_key: Option<&str>) -> Self {
        match value {
            Value::Object(attributes) => {
                let id = id_key
                    .and_then(|key| attributes.get(key))
                    .and_then(scalar_to_string)
                    .or_else(|| attributes.get("id").and_then(scalar_to_string))
                    .or_else(|| {
                        attributes
                            .values()
                            .find_map(|v| v.as_str().map(str::to_string))
                    });
                Self::new(id, attributes)
            }
            Value::String(id) => Self::new(Some(id), Map::new()),
            _ => Self::default(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_fallbacks() {
        assert_eq!(parse_body(None, Some(r#"{"a":1}"#)), json!({}));
        assert_eq!(parse_body(Some("text/html"), Some("<html/>")), json!({}));
        assert_eq!(parse_body(Some("application/json"), None), json!({}));
        assert_eq!(parse_body(Some("application/json"), Some("  ")), json!({}));
        assert_eq!(parse_body(Some("application/json"), Some("{oops")), json!({}));
        assert_eq!(
            parse_body(Some("application/json;charset=utf-8"), Some(r#""vm-1""#)),
            json!("vm-1")
        );
        assert_eq!(
            parse_body(Some("application/vnd.vmware+json"), Some("[1]")),
            json!([1])
        );
    }

    #[test]
    fn test_parse_response_without_body() {
        assert_eq!(parse_response(&HttpResponse::new(204)), json!({}));
    }

    #[test]
    fn test_wrapped_and_bare_bodies_normalize_identically() {
        let wrapped = normalize(json!({"value": {"id": "x", "name": "n"}}), None);
        let bare = normalize(json!({"id": "x", "name": "n"}), None);
        assert_eq!(wrapped, bare);

        match bare {
            Normalized::Item(item) => {
                assert_eq!(item.id.as_deref(), Some("x"));
                assert_eq!(item.get("name"), Some(&json!("n")));
            }
            other => panic!("expected item, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_identifier_shapes() {
        assert_eq!(extract_identifier(&json!("device-42")), Some("device-42".into()));
        assert_eq!(
            extract_identifier(&json!({"value": "lib-1"})),
            Some("lib-1".into())
        );
        assert_eq!(
            extract_identifier(&json!({"value": {"nic": "4000"}})),
            Some("4000".into())
        );
        assert_eq!(extract_identifier(&json!({"nic": "4000"})), Some("4000".into()));
        assert_eq!(extract_identifier(&json!({"a": "1", "b": "2"})), None);
        assert_eq!(extract_identifier(&json!({"size_MiB": 1024})), None);
    }

    #[test]
    fn test_normalize_empty_and_lists() {
        assert_eq!(normalize(json!({}), None), Normalized::Empty);
        assert_eq!(normalize(json!({"value": null}), None), Normalized::Empty);

        match normalize(json!({"value": [{"nic": "4000"}, {"nic": "4001"}]}), Some("nic")) {
            Normalized::List(items) => {
                let ids: Vec<_> = items.iter().filter_map(|i| i.id.clone()).collect();
                assert_eq!(ids, vec!["4000", "4001"]);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_item_keeps_single_attribute() {
        let item = normalize_item(json!({"value": {"label": "Network adapter 1"}}), Some("nic"));
        assert_eq!(item.id.as_deref(), Some("Network adapter 1"));
        assert_eq!(item.to_value(), json!({"label": "Network adapter 1"}));
    }

    #[test]
    fn test_remote_item_id_precedence() {
        let item = RemoteItem::from_value(json!({"name": "h", "host": "host-9"}), Some("host"));
        assert_eq!(item.id.as_deref(), Some("host-9"));

        let item = RemoteItem::from_value(json!({"name": "lib", "id": "lib-1"}), Some("library_id"));
        assert_eq!(item.id.as_deref(), Some("lib-1"));

        let item = RemoteItem::from_value(json!({"library": "lib-2", "name": "x"}), None);
        assert_eq!(item.id.as_deref(), Some("lib-2"));

        let item = RemoteItem::from_value(json!({"counter": 42}), Some("counter"));
        assert_eq!(item.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_normalize_list_of_non_array() {
        assert!(normalize_list(json!({"value": {"a": 1}}), None).is_empty());
        assert_eq!(normalize_list(json!(["a", "b"]), None).len(), 2);
        assert_eq!(wrap_value(json!(1)), json!({"value": 1}));
    }
}
