//! Argument-driven entry point for one resource type.
//!
//! A [`ResourceModule`] takes the caller's arguments as a JSON object, checks
//! them against the descriptor schema, picks the lifecycle verb from the
//! `state` argument and hands the rest to the engine.
//!
//! # Example
//!
//! ```ignore
//! use vrest_reconcile::{Catalog, ConnectionConfig, ReqwestTransport, ResourceModule};
//! use serde_json::json;
//!
//! let config = ConnectionConfig::from_env()?;
//! let transport = ReqwestTransport::from_config(&config)?.with_session(session_id);
//!
//! let catalog = Catalog::builtin()?;
//! let module = ResourceModule::from_catalog(&catalog, "content_locallibrary", transport)?;
//!
//! let result = module
//!     .run(json!({"name": "isos", "type": "LOCAL", "state": "present"}))
//!     .await?;
//! ```

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::catalog::Catalog;
use crate::descriptor::{ResourceDescriptor, STATE_PARAM};
use crate::engine::reconcile;
use crate::error::{ReconcileError, Result};
use crate::schema::Diagnostic;
use crate::transport::Transport;
use crate::types::{ChangeResult, DesiredState, LifecycleState};
use crate::validation::validate_result;

/// Placeholder substituted for sensitive values in logs.
pub const REDACTED: &str = "********";

/// One resource type bound to a transport.
pub struct ResourceModule<T> {
    descriptor: ResourceDescriptor,
    transport: T,
}

impl<T> ResourceModule<T>
where
    T: Transport,
{
    /// Bind a descriptor to a transport.
    pub fn new(descriptor: ResourceDescriptor, transport: T) -> Self {
        Self {
            descriptor,
            transport,
        }
    }

    /// Bind the named catalog entry to a transport.
    pub fn from_catalog(catalog: &Catalog, name: &str, transport: T) -> Result<Self> {
        Ok(Self::new(catalog.get(name)?.clone(), transport))
    }

    /// The bound descriptor.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// The bound transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validate arguments and split out the lifecycle verb.
    ///
    /// Schema defaults fill in parameters the caller left unset.
    pub fn desired_state(&self, args: Value) -> Result<DesiredState> {
        let Value::Object(mut params) = args else {
            return Err(ReconcileError::InvalidParameters(vec![Diagnostic::error(
                "Arguments must be a JSON object",
            )]));
        };

        for (name, param) in &self.descriptor.schema().parameters {
            let unset = params.get(name).map_or(true, Value::is_null);
            if unset {
                if let Some(default) = &param.default {
                    params.insert(name.clone(), default.clone());
                }
            }
        }

        validate_result(self.descriptor.schema(), &params)
            .map_err(ReconcileError::InvalidParameters)?;

        let state = match params.remove(STATE_PARAM) {
            Some(Value::String(s)) => LifecycleState::from(s.as_str()),
            _ => LifecycleState::default(),
        };
        Ok(DesiredState { params, state })
    }

    /// Copy of `args` with sensitive values masked.
    pub fn redacted(&self, args: &Value) -> Value {
        match args {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let masked = if self.descriptor.schema().is_sensitive(k) && !v.is_null() {
                            Value::String(REDACTED.to_string())
                        } else {
                            v.clone()
                        };
                        (k.clone(), masked)
                    })
                    .collect::<Map<String, Value>>(),
            ),
            other => other.clone(),
        }
    }

    /// Validate `args` and reconcile the resource.
    #[instrument(skip(self, args), name = "module.run", fields(resource = %self.descriptor.name()))]
    pub async fn run(&self, args: Value) -> Result<ChangeResult> {
        debug!(args = %self.redacted(&args), "module called");

        let desired = match self.desired_state(args) {
            Ok(desired) => desired,
            Err(err) => {
                warn!(error = %err, "invalid arguments");
                return Err(err);
            }
        };
        info!(state = %desired.state, "reconciling");

        match reconcile(&self.descriptor, &desired, &self.transport).await {
            Ok(result) => {
                info!(
                    operation = %result.operation,
                    changed = result.changed,
                    status = result.status,
                    "module completed"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "module failed");
                Err(err)
            }
        }
    }
}
