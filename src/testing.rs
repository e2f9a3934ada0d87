//! Testing utilities for resource descriptors and the engine.
//!
//! Two in-memory [`Transport`]s are provided so reconciliation can be
//! exercised without a vCenter:
//!
//! - [`ScriptedTransport`] answers from canned responses and records every
//!   request, for asserting on exact call sequences.
//! - [`FakeVcenter`] keeps a single collection in memory and behaves like a
//!   real endpoint, for running the engine repeatedly against evolving state.
//!
//! # Example
//!
//! ```ignore
//! use vrest_reconcile::testing::{assert_changed, assert_unchanged, FakeVcenter};
//! use vrest_reconcile::{catalog, reconcile, DesiredState, LifecycleState};
//!
//! #[tokio::test]
//! async fn test_library_converges() {
//!     let fake = FakeVcenter::new("/api/content/local-library", "id");
//!     let descriptor = catalog::content_locallibrary().unwrap();
//!     let desired = DesiredState::new(LifecycleState::Present).with("name", "isos");
//!
//!     assert_changed(&reconcile(&descriptor, &desired, &fake).await.unwrap());
//!     assert_unchanged(&reconcile(&descriptor, &desired, &fake).await.unwrap());
//! }
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::normalize::wrap_value;
use crate::schema::{Diagnostic, DiagnosticSeverity};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::types::ChangeResult;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =========================================================================
// Scripted transport
// =========================================================================

/// Transport that answers from a script.
///
/// Responses are queued per method and path (extra query pairs are ignored).
/// Each request pops the next queued response; the last one is reused once
/// the queue is down to one. Unscripted requests get a bare 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<(HttpMethod, String), VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method` on `path`.
    pub fn respond(self, method: HttpMethod, path: impl Into<String>, response: HttpResponse) -> Self {
        lock(&self.responses)
            .entry((method, path.into()))
            .or_default()
            .push_back(response);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = (request.method, request.path.clone());
        lock(&self.requests).push(request);

        let mut responses = lock(&self.responses);
        let response = match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(|| HttpResponse::new(404)))
    }
}

// =========================================================================
// Fake vCenter
// =========================================================================

#[derive(Debug, Default)]
struct Inventory {
    items: BTreeMap<String, Map<String, Value>>,
    actions: Vec<(String, String)>,
    next_id: u64,
    requests: Vec<HttpRequest>,
}

/// In-memory vCenter serving one collection.
///
/// Supports list, get, create, patch/put (top-level merge), delete and
/// `?action=` calls on items. Listings carry each item's attributes plus its
/// identifier under `id_field`; gets return the attributes alone. Created
/// items get ids of the form `<id_field>-<n>`.
#[derive(Debug)]
pub struct FakeVcenter {
    collection: String,
    id_field: String,
    wrapped: bool,
    inventory: Mutex<Inventory>,
}

impl FakeVcenter {
    /// Serve `collection` with bare (7.0.2+) payloads.
    pub fn new(collection: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            collection: collection.into().trim_end_matches('/').to_string(),
            id_field: id_field.into(),
            wrapped: false,
            inventory: Mutex::new(Inventory {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Wrap every payload in `{"value": ...}` like pre-7.0.2 releases.
    pub fn wrapped(mut self) -> Self {
        self.wrapped = true;
        self
    }

    /// Seed an item.
    pub fn with_item(self, id: impl Into<String>, attributes: Value) -> Self {
        let attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        lock(&self.inventory).items.insert(id.into(), attributes);
        self
    }

    /// Attributes of a stored item.
    pub fn item(&self, id: &str) -> Option<Map<String, Value>> {
        lock(&self.inventory).items.get(id).cloned()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        lock(&self.inventory).items.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Actions run so far as `(id, action)` pairs.
    pub fn actions(&self) -> Vec<(String, String)> {
        lock(&self.inventory).actions.clone()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.inventory).requests.clone()
    }

    fn json(&self, status: u16, payload: Value) -> HttpResponse {
        let body = if self.wrapped {
            wrap_value(payload)
        } else {
            payload
        };
        HttpResponse::json(status, &body)
    }

    fn handle(&self, inventory: &mut Inventory, request: &HttpRequest) -> HttpResponse {
        let (route, query) = match request.path.split_once('?') {
            Some((route, query)) => (route, Some(query)),
            None => (request.path.as_str(), None),
        };
        let action = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .find_map(|pair| pair.strip_prefix("action="));

        if route.trim_end_matches('/') == self.collection {
            return match (request.method, action) {
                (HttpMethod::Get, None) => self.list(inventory),
                (HttpMethod::Post, None) => self.create(inventory, request.body.as_ref()),
                _ => HttpResponse::new(405),
            };
        }

        let Some(id) = route
            .strip_prefix(self.collection.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|id| !id.is_empty() && !id.contains('/'))
        else {
            return HttpResponse::new(404);
        };
        let id = percent_encoding::percent_decode_str(id)
            .decode_utf8_lossy()
            .into_owned();
        if !inventory.items.contains_key(&id) {
            return self.json(404, serde_json::json!({"error_type": "NOT_FOUND"}));
        }

        match (request.method, action) {
            (HttpMethod::Get, None) => {
                let attributes = inventory.items.get(&id).cloned().unwrap_or_default();
                self.json(200, Value::Object(attributes))
            }
            (HttpMethod::Patch | HttpMethod::Put, None) => {
                let fields = unwrap_spec(request.body.as_ref());
                if let Some(item) = inventory.items.get_mut(&id) {
                    item.extend(fields);
                }
                HttpResponse::new(204)
            }
            (HttpMethod::Delete, None) => {
                inventory.items.remove(&id);
                HttpResponse::new(204)
            }
            (HttpMethod::Post, Some(action)) => {
                inventory.actions.push((id, action.to_string()));
                HttpResponse::new(204)
            }
            _ => HttpResponse::new(405),
        }
    }

    fn list(&self, inventory: &Inventory) -> HttpResponse {
        let summaries = inventory
            .items
            .iter()
            .map(|(id, attributes)| {
                let mut summary = Map::new();
                summary.insert(self.id_field.clone(), Value::String(id.clone()));
                summary.extend(attributes.clone());
                Value::Object(summary)
            })
            .collect();
        self.json(200, Value::Array(summaries))
    }

    fn create(&self, inventory: &mut Inventory, body: Option<&Value>) -> HttpResponse {
        let id = format!("{}-{}", self.id_field, inventory.next_id);
        inventory.next_id += 1;
        inventory.items.insert(id.clone(), unwrap_spec(body));
        self.json(201, Value::String(id))
    }
}

fn unwrap_spec(body: Option<&Value>) -> Map<String, Value> {
    match body {
        Some(Value::Object(map)) if map.len() == 1 => match map.get("spec") {
            Some(Value::Object(spec)) => spec.clone(),
            _ => map.clone(),
        },
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

#[async_trait::async_trait]
impl Transport for FakeVcenter {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut inventory = lock(&self.inventory);
        let response = self.handle(&mut inventory, &request);
        inventory.requests.push(request);
        Ok(response)
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a reconciliation changed remote state.
///
/// # Panics
///
/// Panics if `changed` is false.
pub fn assert_changed(result: &ChangeResult) {
    assert!(
        result.changed,
        "Expected a change, but '{}' returned status {} without changing anything",
        result.operation, result.status
    );
}

/// Assert that a reconciliation left remote state alone.
///
/// # Panics
///
/// Panics if `changed` is true.
pub fn assert_unchanged(result: &ChangeResult) {
    assert!(
        !result.changed,
        "Expected no change, but '{}' reported a change (status {})",
        result.operation, result.status
    );
}

/// Assert that no request could have mutated remote state.
///
/// # Panics
///
/// Panics if any request used a write method.
pub fn assert_no_writes(requests: &[HttpRequest]) {
    let writes: Vec<_> = requests
        .iter()
        .filter(|r| r.method.is_write())
        .map(|r| format!("{} {}", r.method, r.path))
        .collect();
    assert!(
        writes.is_empty(),
        "Expected no writes, but got {} write(s): {:?}",
        writes.len(),
        writes
    );
}

/// Assert the exact number of write requests.
///
/// # Panics
///
/// Panics if the count differs.
pub fn assert_write_count(requests: &[HttpRequest], expected: usize) {
    let writes = requests.iter().filter(|r| r.method.is_write()).count();
    assert_eq!(
        writes, expected,
        "Expected {} write(s), but got {}",
        expected, writes
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::engine::reconcile;
    use crate::types::{DesiredState, LifecycleState};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const LIBRARIES: &str = "/api/content/local-library";

    fn library(state: LifecycleState) -> DesiredState {
        DesiredState::new(state)
            .with("name", "isos")
            .with("type", "LOCAL")
            .with("description", "ISO images")
    }

    #[tokio::test]
    async fn test_scripted_transport_queue() {
        let transport = ScriptedTransport::new()
            .respond(HttpMethod::Get, "/a", HttpResponse::new(200))
            .respond(HttpMethod::Get, "/a", HttpResponse::new(202));

        let statuses = [
            transport.send(HttpRequest::get("/a")).await.unwrap().status,
            transport.send(HttpRequest::get("/a")).await.unwrap().status,
            transport.send(HttpRequest::get("/a")).await.unwrap().status,
            transport.send(HttpRequest::get("/b")).await.unwrap().status,
        ];
        assert_eq!(statuses, [200, 202, 202, 404]);
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let fake = FakeVcenter::new(LIBRARIES, "id");
        let descriptor = catalog::content_locallibrary().unwrap();
        let desired = library(LifecycleState::Present);

        let first = reconcile(&descriptor, &desired, &fake).await.unwrap();
        assert_changed(&first);
        assert_eq!(first.operation, "create");
        assert_eq!(first.id.as_deref(), Some("id-1"));
        assert_eq!(fake.len(), 1);

        let before = fake.requests().len();
        let second = reconcile(&descriptor, &desired, &fake).await.unwrap();
        assert_unchanged(&second);
        assert_eq!(second.operation, "get");
        assert_eq!(second.id.as_deref(), Some("id-1"));
        assert_no_writes(&fake.requests()[before..]);
        assert_eq!(fake.len(), 1);
    }

    #[tokio::test]
    async fn test_wrapped_and_bare_servers_agree() {
        let descriptor = catalog::content_locallibrary().unwrap();
        let desired = library(LifecycleState::Present).with("description", "updated");
        let seeded = json!({"name": "isos", "type": "LOCAL", "description": "ISO images"});

        let bare = FakeVcenter::new(LIBRARIES, "id").with_item("lib-1", seeded.clone());
        let wrapped = FakeVcenter::new(LIBRARIES, "id")
            .wrapped()
            .with_item("lib-1", seeded);

        let from_bare = reconcile(&descriptor, &desired, &bare).await.unwrap();
        let from_wrapped = reconcile(&descriptor, &desired, &wrapped).await.unwrap();

        assert_eq!(from_bare, from_wrapped);
        assert_changed(&from_bare);
        assert_eq!(from_bare.operation, "update");
        assert_eq!(
            bare.item("lib-1").unwrap().get("description"),
            Some(&json!("updated"))
        );
    }

    #[tokio::test]
    async fn test_unset_fields_are_left_alone() {
        let fake = FakeVcenter::new(LIBRARIES, "id").with_item(
            "lib-1",
            json!({"name": "isos", "type": "LOCAL", "description": "ISO images"}),
        );
        let descriptor = catalog::content_locallibrary().unwrap();
        let desired = DesiredState::new(LifecycleState::Present)
            .with("library_id", "lib-1")
            .with("type", "SUBSCRIBED");

        let result = reconcile(&descriptor, &desired, &fake).await.unwrap();
        assert_changed(&result);

        let writes: Vec<_> = fake
            .requests()
            .into_iter()
            .filter(|r| r.method.is_write())
            .collect();
        assert_write_count(&writes, 1);
        assert_eq!(writes[0].body, Some(json!({"type": "SUBSCRIBED"})));
        assert_eq!(
            fake.item("lib-1").unwrap().get("description"),
            Some(&json!("ISO images"))
        );
    }

    #[tokio::test]
    async fn test_absent_twice() {
        let fake = FakeVcenter::new(LIBRARIES, "id").with_item(
            "lib-1",
            json!({"name": "isos", "type": "LOCAL", "description": "ISO images"}),
        );
        let descriptor = catalog::content_locallibrary().unwrap();
        let desired = library(LifecycleState::Absent);

        let first = reconcile(&descriptor, &desired, &fake).await.unwrap();
        assert_changed(&first);
        assert!(fake.is_empty());

        let second = reconcile(&descriptor, &desired, &fake).await.unwrap();
        assert_unchanged(&second);
        assert_eq!(second.operation, "delete");
        assert_write_count(&fake.requests(), 1);
    }

    #[tokio::test]
    async fn test_fake_runs_actions() {
        let fake = FakeVcenter::new(LIBRARIES, "id").with_item("lib-1", json!({"name": "isos"}));
        let descriptor = catalog::content_locallibrary().unwrap();
        let desired = DesiredState::new(LifecycleState::action("publish")).with("name", "isos");

        let result = reconcile(&descriptor, &desired, &fake).await.unwrap();
        assert_changed(&result);
        assert_eq!(
            fake.actions(),
            vec![("lib-1".to_string(), "publish".to_string())]
        );
    }

    #[test]
    #[should_panic(expected = "Expected no writes")]
    fn test_assert_no_writes_fails() {
        assert_no_writes(&[HttpRequest::new(HttpMethod::Delete, "/x")]);
    }

    #[test]
    #[should_panic(expected = "Expected no change")]
    fn test_assert_unchanged_fails() {
        assert_unchanged(&ChangeResult {
            value: json!({}),
            id: None,
            changed: true,
            status: 201,
            operation: "create".to_string(),
        });
    }

    #[test]
    fn test_assert_error_contains() {
        let diagnostics = vec![Diagnostic::error("Unsupported parameter 'colour'")];
        assert_error_contains(&diagnostics, "colour");
    }
}
