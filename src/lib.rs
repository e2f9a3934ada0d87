//! vCenter REST reconciliation engine
//!
//! This crate turns a declarative description of a vCenter resource into the
//! smallest sequence of REST calls that makes the server match it, and
//! reports whether anything changed. Running the same description twice
//! changes nothing the second time.
//!
//! # Overview
//!
//! - **Descriptors**: a [`ResourceDescriptor`] declares a resource type's
//!   parameter schema, identifier, unicity keys and the HTTP operations it
//!   supports, with per-field routing into path, query or body
//! - **Catalog**: built-in descriptors for a representative set of vCenter
//!   resources, looked up by name
//! - **Engine**: [`reconcile`] plans one step from the requested lifecycle
//!   state (`present`, `absent` or a named action) and executes it
//! - **Resolver**: finds existing items by unicity keys when no identifier
//!   is given
//! - **Normalization**: wrapped (`{"value": ...}`) and bare responses look
//!   the same to the engine
//! - **Transport**: the [`Transport`] trait, with a `reqwest` implementation
//!   and in-memory fakes in [`testing`]
//! - **Logging**: integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use vrest_reconcile::{
//!     init_logging, Catalog, ConnectionConfig, ReqwestTransport, ResourceModule,
//! };
//! use secrecy::SecretString;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let config = ConnectionConfig::from_env()?;
//!     let session = SecretString::from(std::env::var("VMWARE_API_SESSION")?);
//!     let transport = ReqwestTransport::from_config(&config)?.with_session(session);
//!
//!     let catalog = Catalog::builtin()?;
//!     let memory = ResourceModule::from_catalog(&catalog, "vcenter_vm_hardware_memory", transport)?;
//!     let result = memory.run(json!({"vm": "vm-42", "size_MiB": 4096})).await?;
//!
//!     println!("{}", serde_json::to_string(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! # Result envelope
//!
//! Every call returns a [`ChangeResult`]:
//!
//! ```text
//! {"value": {...}, "id": "vm-42", "changed": true, "status": 204, "operation": "update"}
//! ```
//!
//! `changed` is true only when a write was issued and answered with a 2xx
//! status. Writes are never retried.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod logging;
pub mod module;
pub mod normalize;
pub mod payload;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod testing;
pub mod transport;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use catalog::Catalog;
pub use config::ConnectionConfig;
pub use descriptor::{
    DescriptorBuilder, DescriptorConfig, FieldRouting, Operation, OperationSpec,
    ResourceDescriptor, Step, UnicityKey,
};
pub use engine::{reconcile, Reconciler};
pub use error::{ReconcileError, Result};
pub use logging::{
    init_logging, init_logging_from_config, init_logging_to_file, init_logging_with_default,
    try_init_logging,
};
pub use module::ResourceModule;
pub use resolver::{ExistenceResolver, Lookup};
pub use schema::{Diagnostic, Parameter, ParameterType, Schema};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{ChangeResult, DesiredState, LifecycleState, RemoteItem};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for custom transports
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use secrecy;
pub use serde_json;
pub use tracing;
