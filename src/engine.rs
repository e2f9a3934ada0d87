//! Reconciliation engine.
//!
//! Maps a [`DesiredState`] onto at most three sequential calls (lookup,
//! read-for-diff, write) and reports whether remote state changed. Writes
//! are never retried.
//!
//! # Example
//!
//! ```ignore
//! use vrest_reconcile::{catalog, reconcile, DesiredState, LifecycleState};
//!
//! let descriptor = catalog::vcenter_vm_hardware_memory()?;
//! let desired = DesiredState::new(LifecycleState::Present)
//!     .with("vm", "vm-42")
//!     .with("size_MiB", 4096);
//!
//! let result = reconcile(&descriptor, &desired, &transport).await?;
//! println!("changed: {}", result.changed);
//! ```

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::descriptor::{Operation, OperationSpec, ResourceDescriptor, Step};
use crate::error::{ReconcileError, Result};
use crate::normalize::{normalize, normalize_item, parse_response, unwrap_value, Normalized};
use crate::payload::prepare_payload;
use crate::report::{api_error, check_server_error, report, report_item, READ_LABEL};
use crate::resolver::ExistenceResolver;
use crate::transport::{execute, HttpResponse, Transport};
use crate::types::{ChangeResult, DesiredState, RemoteItem};

/// Reconcile one resource against its desired state.
pub async fn reconcile<T>(
    descriptor: &ResourceDescriptor,
    desired: &DesiredState,
    transport: &T,
) -> Result<ChangeResult>
where
    T: Transport + ?Sized,
{
    Reconciler::new(descriptor, transport).reconcile(desired).await
}

/// Drives one resource type over one transport.
pub struct Reconciler<'a, T: ?Sized> {
    descriptor: &'a ResourceDescriptor,
    transport: &'a T,
}

impl<'a, T> Reconciler<'a, T>
where
    T: Transport + ?Sized,
{
    /// Create an engine for `descriptor`.
    pub fn new(descriptor: &'a ResourceDescriptor, transport: &'a T) -> Self {
        Self {
            descriptor,
            transport,
        }
    }

    /// Bring the remote resource to `desired`.
    #[instrument(
        skip(self, desired),
        name = "reconcile",
        fields(resource = %self.descriptor.name(), state = %desired.state)
    )]
    pub async fn reconcile(&self, desired: &DesiredState) -> Result<ChangeResult> {
        let step = self.descriptor.plan(&desired.state)?;
        debug!(?step, "planned step");

        match step {
            Step::Ensure(create) => self.ensure(desired, create).await,
            Step::Update(update) => self.update(desired, update, None).await,
            Step::Read => self.read(desired).await,
            Step::Delete(delete) => self.delete(desired, delete).await,
            Step::Action(action) => self.action(desired, action).await,
        }
    }

    fn resolver(&self) -> ExistenceResolver<'a, T> {
        ExistenceResolver::new(self.descriptor, self.transport)
    }

    fn desired_id(&self, desired: &DesiredState) -> Option<String> {
        let param = self.descriptor.id_param()?;
        match desired.get(param)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn with_id(&self, desired: &DesiredState, id: &str) -> DesiredState {
        let mut desired = desired.clone();
        if let Some(param) = self.descriptor.id_param() {
            desired.set(param, id);
        }
        desired
    }

    async fn send(&self, spec: &OperationSpec, desired: &DesiredState) -> Result<HttpResponse> {
        let request = prepare_payload(desired, spec).to_request(spec)?;
        let response = execute(self.transport, request).await?;
        check_server_error(&response)?;
        if !response.is_success() {
            warn!(
                operation = %spec.operation,
                status = response.status,
                "request was not successful"
            );
        }
        Ok(response)
    }

    async fn ensure(&self, desired: &DesiredState, create: &OperationSpec) -> Result<ChangeResult> {
        let resolver = self.resolver();
        let lookup = match self.desired_id(desired) {
            Some(id) => resolver.fetch(desired, &id).await?,
            None => resolver.find(desired).await?,
        };

        let Some(existing) = lookup.item else {
            return self.create(desired, create).await;
        };

        match self.descriptor.operation(&Operation::Update) {
            Some(update) => {
                let desired = match &existing.id {
                    Some(id) => self.with_id(desired, id),
                    None => desired.clone(),
                };
                self.update(&desired, update, Some((existing, lookup.status)))
                    .await
            }
            None => {
                info!("resource already exists");
                Ok(report_item(existing, lookup.status, READ_LABEL))
            }
        }
    }

    async fn create(&self, desired: &DesiredState, create: &OperationSpec) -> Result<ChangeResult> {
        info!("creating resource");
        let response = self.send(create, desired).await?;
        let body = parse_response(&response);
        let label = create.operation.name();
        if !response.is_success() {
            return Ok(report(unwrap_value(body), response.status, label));
        }

        let item = match normalize(body, self.descriptor.id_param()) {
            Normalized::Item(item) => item,
            Normalized::Identifier(id) => {
                debug!(%id, "creation returned only an identifier, fetching item");
                let hydrated = self
                    .resolver()
                    .fetch(&self.with_id(desired, &id), &id)
                    .await?
                    .item;
                let mut item = hydrated.unwrap_or_default();
                item.id = Some(id);
                item
            }
            Normalized::List(_) | Normalized::Empty => RemoteItem::default(),
        };

        Ok(report_item(item, response.status, label))
    }

    async fn read_current(&self, desired: &DesiredState) -> Result<Option<(RemoteItem, u16)>> {
        let Some(get) = self.descriptor.operation(&Operation::Get) else {
            return Ok(None);
        };
        let request = prepare_payload(desired, get).to_request(get)?;
        let response = execute(self.transport, request).await?;
        if !response.is_success() {
            return Err(api_error(&response));
        }

        let mut item = normalize_item(parse_response(&response), self.descriptor.id_param());
        item.id = self.desired_id(desired);
        Ok(Some((item, response.status)))
    }

    async fn update(
        &self,
        desired: &DesiredState,
        update: &OperationSpec,
        current: Option<(RemoteItem, u16)>,
    ) -> Result<ChangeResult> {
        let id = self.desired_id(desired);
        let current = match current {
            Some(current) => Some(current),
            None => self.read_current(desired).await?,
        };

        let mut payload = prepare_payload(desired, update);
        if let Some((item, status)) = current {
            payload.prune(&item.attributes);
            if payload.is_noop() {
                info!("no changes detected, skipping write");
                return Ok(report_item(item, status, READ_LABEL).with_id(id));
            }
        }

        if let Some(fields) = payload.fields() {
            debug!(fields = ?fields.keys().collect::<Vec<_>>(), "updating fields");
        }
        info!("updating resource");
        let response = execute(self.transport, payload.to_request(update)?).await?;
        check_server_error(&response)?;
        if !response.is_success() {
            warn!(status = response.status, "update was not successful");
        }

        let value = unwrap_value(parse_response(&response));
        Ok(report(value, response.status, Operation::Update.name()).with_id(id))
    }

    async fn delete(&self, desired: &DesiredState, delete: &OperationSpec) -> Result<ChangeResult> {
        let label = delete.operation.name();
        let desired = match self.resolve_missing_id(desired, delete).await? {
            Resolved::Ready(desired) => desired,
            Resolved::Missing(status) => {
                info!("resource not found, nothing to delete");
                return Ok(ChangeResult::unchanged(
                    Value::Object(Map::new()),
                    status,
                    label,
                ));
            }
        };

        info!("deleting resource");
        let response = self.send(delete, &desired).await?;
        let value = unwrap_value(parse_response(&response));
        Ok(report(value, response.status, label).with_id(self.desired_id(&desired)))
    }

    async fn action(&self, desired: &DesiredState, action: &OperationSpec) -> Result<ChangeResult> {
        let label = action.operation.name();
        let desired = match self.resolve_missing_id(desired, action).await? {
            Resolved::Ready(desired) => desired,
            Resolved::Missing(status) => {
                info!(action = label, "resource not found, nothing to act on");
                return Ok(ChangeResult::unchanged(Value::Object(Map::new()), status, label));
            }
        };

        info!(action = label, "running action");
        let response = self.send(action, &desired).await?;
        let value = unwrap_value(parse_response(&response));
        Ok(report(value, response.status, label).with_id(self.desired_id(&desired)))
    }

    async fn read(&self, desired: &DesiredState) -> Result<ChangeResult> {
        let get = self.descriptor.operation(&Operation::Get);
        let list = self.descriptor.operation(&Operation::List);
        let spec = match (get, list) {
            (Some(get), Some(list)) => {
                if self.desired_id(desired).is_some() {
                    get
                } else {
                    list
                }
            }
            (Some(get), None) => get,
            (None, Some(list)) => list,
            (None, None) => {
                return Err(ReconcileError::UnsupportedOperation {
                    resource: self.descriptor.name().to_string(),
                    operation: desired.state.to_string(),
                })
            }
        };

        let response = self.send(spec, desired).await?;
        let value = unwrap_value(parse_response(&response));
        Ok(report(value, response.status, READ_LABEL).with_id(self.desired_id(desired)))
    }

    /// Fill in the identifier from the collection when `spec` needs one.
    async fn resolve_missing_id(
        &self,
        desired: &DesiredState,
        spec: &OperationSpec,
    ) -> Result<Resolved> {
        let Some(param) = self.descriptor.id_param() else {
            return Ok(Resolved::Ready(desired.clone()));
        };
        if !spec.has_placeholder(param) || desired.is_set(param) {
            return Ok(Resolved::Ready(desired.clone()));
        }

        let lookup = self.resolver().find(desired).await?;
        match lookup.item.and_then(|item| item.id) {
            Some(id) => Ok(Resolved::Ready(self.with_id(desired, &id))),
            None => Ok(Resolved::Missing(lookup.status)),
        }
    }
}

enum Resolved {
    Ready(DesiredState),
    Missing(u16),
}
