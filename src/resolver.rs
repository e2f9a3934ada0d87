//! Existence resolver.
//!
//! Finds the remote item a desired state refers to when the caller did not
//! pass an identifier: the collection is listed, each stub is hydrated with a
//! `get` when the resource has one, and the first item whose unicity keys
//! match is returned. A desired key that is unset matches anything, as long
//! as at least one key is set.

use tracing::{debug, info};

use crate::descriptor::{Operation, OperationSpec, ResourceDescriptor, UnicityKey};
use crate::error::Result;
use crate::normalize::{normalize_item, normalize_list, parse_response};
use crate::payload::prepare_payload;
use crate::report::check_server_error;
use crate::transport::{execute, Transport};
use crate::types::{DesiredState, RemoteItem};

/// Status reported when the resource has no way to look items up.
const NOT_FOUND: u16 = 404;

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    /// The matching item, if any.
    pub item: Option<RemoteItem>,
    /// Status of the last read issued.
    pub status: u16,
}

impl Lookup {
    fn found(item: RemoteItem, status: u16) -> Self {
        Self {
            item: Some(item),
            status,
        }
    }

    fn missing(status: u16) -> Self {
        Self { item: None, status }
    }
}

/// Looks up remote items for one resource type.
pub struct ExistenceResolver<'a, T: ?Sized> {
    descriptor: &'a ResourceDescriptor,
    transport: &'a T,
}

impl<'a, T> ExistenceResolver<'a, T>
where
    T: Transport + ?Sized,
{
    /// Create a resolver.
    pub fn new(descriptor: &'a ResourceDescriptor, transport: &'a T) -> Self {
        Self {
            descriptor,
            transport,
        }
    }

    /// Search the collection for an item matching the unicity keys.
    pub async fn find(&self, desired: &DesiredState) -> Result<Lookup> {
        let Some(list) = self.descriptor.operation(&Operation::List) else {
            debug!(resource = %self.descriptor.name(), "no list operation to search");
            return Ok(Lookup::missing(NOT_FOUND));
        };
        let keys = self.descriptor.unicity_keys();
        if !any_key_set(keys, desired) {
            debug!(resource = %self.descriptor.name(), "no unicity key set to match on");
            return Ok(Lookup::missing(NOT_FOUND));
        }

        let request = prepare_payload(desired, list).to_request(list)?;
        let response = execute(self.transport, request).await?;
        check_server_error(&response)?;
        if !response.is_success() {
            return Ok(Lookup::missing(response.status));
        }

        let stubs = normalize_list(parse_response(&response), self.descriptor.id_param());
        debug!(candidates = stubs.len(), "searching collection");
        for stub in stubs {
            let candidate = self.hydrate(desired, stub).await?;
            if matches_keys(keys, desired, &candidate) {
                info!(
                    resource = %self.descriptor.name(),
                    id = candidate.id.as_deref().unwrap_or_default(),
                    "found existing resource"
                );
                return Ok(Lookup::found(candidate, response.status));
            }
        }

        info!(resource = %self.descriptor.name(), "no matching resource found");
        Ok(Lookup::missing(response.status))
    }

    /// Fetch an item by identifier.
    ///
    /// Uses `get` when the resource has one, otherwise scans the listing.
    /// A non-success answer (other than 5xx) means "not found".
    pub async fn fetch(&self, desired: &DesiredState, id: &str) -> Result<Lookup> {
        let get = self.descriptor.operation(&Operation::Get);
        if let (Some(get), Some(param)) = (get, self.descriptor.id_param()) {
            return self.get_by_id(desired, get, param, id).await;
        }

        let Some(list) = self.descriptor.operation(&Operation::List) else {
            return Ok(Lookup::missing(NOT_FOUND));
        };
        let request = prepare_payload(desired, list).to_request(list)?;
        let response = execute(self.transport, request).await?;
        check_server_error(&response)?;
        if !response.is_success() {
            return Ok(Lookup::missing(response.status));
        }

        let found = normalize_list(parse_response(&response), self.descriptor.id_param())
            .into_iter()
            .find(|item| item.id.as_deref() == Some(id));
        Ok(match found {
            Some(item) => Lookup::found(item, response.status),
            None => Lookup::missing(response.status),
        })
    }

    async fn get_by_id(
        &self,
        desired: &DesiredState,
        get: &OperationSpec,
        param: &str,
        id: &str,
    ) -> Result<Lookup> {
        let mut payload = prepare_payload(desired, get);
        payload.set_path(param, id);
        let response = execute(self.transport, payload.to_request(get)?).await?;
        check_server_error(&response)?;
        if !response.is_success() {
            debug!(id, status = response.status, "item lookup missed");
            return Ok(Lookup::missing(response.status));
        }

        let mut item = normalize_item(parse_response(&response), Some(param));
        item.id = Some(id.to_string());
        Ok(Lookup::found(item, response.status))
    }

    async fn hydrate(&self, desired: &DesiredState, stub: RemoteItem) -> Result<RemoteItem> {
        let get = self.descriptor.operation(&Operation::Get);
        let (Some(get), Some(param), Some(id)) = (get, self.descriptor.id_param(), stub.id.clone())
        else {
            return Ok(stub);
        };
        Ok(self
            .get_by_id(desired, get, param, &id)
            .await?
            .item
            .unwrap_or(stub))
    }
}

/// Whether every set unicity key equals the remote attribute.
///
/// Nothing matches unless at least one key is set in the desired state.
pub fn matches_keys(keys: &[UnicityKey], desired: &DesiredState, item: &RemoteItem) -> bool {
    any_key_set(keys, desired)
        && keys.iter().all(|key| match desired.get(&key.param) {
            None => true,
            Some(wanted) => item.get(key.attribute()) == Some(wanted),
        })
}

fn any_key_set(keys: &[UnicityKey], desired: &DesiredState) -> bool {
    keys.iter().any(|key| desired.get(&key.param).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::testing::ScriptedTransport;
    use crate::transport::{HttpMethod, HttpResponse};
    use crate::types::LifecycleState;
    use serde_json::json;

    fn desired() -> DesiredState {
        DesiredState::new(LifecycleState::Present)
    }

    #[test]
    fn test_matches_keys_wildcards() {
        let keys = vec![UnicityKey::new("label"), UnicityKey::new("mac_address")];
        let item = RemoteItem::from_value(
            json!({"label": "Network adapter 1", "mac_address": "00:50:56:aa:bb:cc"}),
            None,
        );

        assert!(matches_keys(&keys, &desired().with("label", "Network adapter 1"), &item));
        assert!(!matches_keys(&keys, &desired().with("label", "Network adapter 2"), &item));
        assert!(!matches_keys(&[], &desired(), &item));
    }

    #[test]
    fn test_matches_keys_requires_one_set_key() {
        let keys = vec![UnicityKey::new("name")];
        let item = RemoteItem::from_value(json!({"name": "keep-me"}), None);

        assert!(!matches_keys(&keys, &desired(), &item));
        assert!(!matches_keys(&keys, &desired().with("name", json!(null)), &item));
        assert!(matches_keys(&keys, &desired().with("name", "keep-me"), &item));
    }

    #[tokio::test]
    async fn test_find_hydrates_stubs() {
        let descriptor = catalog::content_locallibrary().unwrap();
        let transport = ScriptedTransport::new()
            .respond(
                HttpMethod::Get,
                "/api/content/local-library",
                HttpResponse::json(200, &json!(["lib-1", "lib-2"])),
            )
            .respond(
                HttpMethod::Get,
                "/api/content/local-library/lib-1",
                HttpResponse::json(200, &json!({"name": "other", "type": "LOCAL"})),
            )
            .respond(
                HttpMethod::Get,
                "/api/content/local-library/lib-2",
                HttpResponse::json(200, &json!({"name": "wanted", "type": "LOCAL"})),
            );

        let resolver = ExistenceResolver::new(&descriptor, &transport);
        let lookup = resolver.find(&desired().with("name", "wanted")).await.unwrap();

        let item = lookup.item.unwrap();
        assert_eq!(item.id.as_deref(), Some("lib-2"));
        assert_eq!(item.get("name"), Some(&json!("wanted")));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_find_miss_and_empty_collection() {
        let descriptor = catalog::content_locallibrary().unwrap();
        let transport = ScriptedTransport::new().respond(
            HttpMethod::Get,
            "/api/content/local-library",
            HttpResponse::json(200, &json!({"value": []})),
        );

        let resolver = ExistenceResolver::new(&descriptor, &transport);
        let lookup = resolver.find(&desired().with("name", "x")).await.unwrap();
        assert_eq!(lookup, Lookup::missing(200));
    }

    #[tokio::test]
    async fn test_find_by_aliased_key_without_get() {
        let descriptor = catalog::vcenter_host().unwrap();
        let transport = ScriptedTransport::new().respond(
            HttpMethod::Get,
            "/api/vcenter/host",
            HttpResponse::json(
                200,
                &json!([
                    {"host": "host-1", "name": "esx1.example.com", "connection_state": "CONNECTED"},
                    {"host": "host-2", "name": "esx2.example.com", "connection_state": "CONNECTED"}
                ]),
            ),
        );

        let resolver = ExistenceResolver::new(&descriptor, &transport);
        let lookup = resolver
            .find(&desired().with("hostname", "esx2.example.com"))
            .await
            .unwrap();
        assert_eq!(lookup.item.unwrap().id.as_deref(), Some("host-2"));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_not_found_and_server_error() {
        let descriptor = catalog::vcenter_vm_hardware_ethernet().unwrap();
        let transport = ScriptedTransport::new()
            .respond(
                HttpMethod::Get,
                "/api/vcenter/vm/vm-1/hardware/ethernet/4000",
                HttpResponse::new(404),
            )
            .respond(
                HttpMethod::Get,
                "/api/vcenter/vm/vm-1/hardware/ethernet/4001",
                HttpResponse::new(503),
            );
        let resolver = ExistenceResolver::new(&descriptor, &transport);
        let desired = desired().with("vm", "vm-1");

        let lookup = resolver.fetch(&desired, "4000").await.unwrap();
        assert_eq!(lookup, Lookup::missing(404));

        let err = resolver.fetch(&desired, "4001").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }
}
