//! Built-in resource descriptors.
//!
//! Each function returns the descriptor for one vCenter resource type;
//! [`Catalog::builtin`] collects them all under their names.

use std::collections::BTreeMap;

use crate::descriptor::{FieldRouting, Operation, OperationSpec, ResourceDescriptor};
use crate::error::{ReconcileError, Result};
use crate::schema::{Parameter, ParameterType, Schema};
use crate::transport::HttpMethod;

const LIBRARY_FIELDS: &[&str] = &[
    "creation_time",
    "description",
    "id",
    "last_modified_time",
    "last_sync_time",
    "name",
    "optimization_info",
    "publish_info",
    "server_guid",
    "storage_backings",
    "subscription_info",
    "type",
    "version",
];

const NIC_UPDATE_FIELDS: &[&str] = &[
    "allow_guest_control",
    "backing",
    "mac_address",
    "mac_type",
    "start_connected",
    "upt_compatibility_enabled",
    "wake_on_lan_enabled",
];

const TASK_FILTERS: &[&str] = &[
    "filter_spec.operations",
    "filter_spec.services",
    "filter_spec.status",
    "filter_spec.targets",
    "filter_spec.tasks",
    "filter_spec.users",
];

/// Resource descriptors keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    descriptors: BTreeMap<String, ResourceDescriptor>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in resource type.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new()
            .with_descriptor(content_locallibrary()?)
            .with_descriptor(vcenter_host()?)
            .with_descriptor(vcenter_vm_hardware_ethernet()?)
            .with_descriptor(vcenter_vm_hardware_memory()?)
            .with_descriptor(vcenter_systemconfig_deploymenttype()?)
            .with_descriptor(vcenter_systemconfig_pscregistration()?)
            .with_descriptor(vcenter_vm_guest_filesystem_files()?)
            .with_descriptor(rest_cis_tasks_info()?)
            .with_descriptor(stats_counters_info()?)
            .with_descriptor(baseimages_info()?))
    }

    /// Add or replace a descriptor.
    pub fn with_descriptor(mut self, descriptor: ResourceDescriptor) -> Self {
        self.descriptors
            .insert(descriptor.name().to_string(), descriptor);
        self
    }

    /// Look up a descriptor by resource name.
    pub fn get(&self, name: &str) -> Result<&ResourceDescriptor> {
        self.descriptors
            .get(name)
            .ok_or_else(|| ReconcileError::UnknownResource(name.to_string()))
    }

    /// Resource names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn op(operation: Operation, method: HttpMethod, path: &str) -> OperationSpec {
    OperationSpec::new(operation, method, path)
}

/// Content library stored on the vCenter datastores.
pub fn content_locallibrary() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter(
            "client_token",
            Parameter::optional_string()
                .sensitive()
                .with_description("Idempotency token for the create call"),
        )
        .with_parameter("creation_time", Parameter::optional_string())
        .with_parameter("description", Parameter::optional_string())
        .with_parameter("id", Parameter::optional_string())
        .with_parameter("last_modified_time", Parameter::optional_string())
        .with_parameter("last_sync_time", Parameter::optional_string())
        .with_parameter("library_id", Parameter::optional_string())
        .with_parameter("name", Parameter::optional_string())
        .with_parameter("optimization_info", Parameter::optional_dict())
        .with_parameter("publish_info", Parameter::optional_dict())
        .with_parameter("server_guid", Parameter::optional_string())
        .with_parameter("storage_backings", Parameter::optional_list(ParameterType::Dict))
        .with_parameter("subscription_info", Parameter::optional_dict())
        .with_parameter("subscriptions", Parameter::optional_list(ParameterType::Dict))
        .with_parameter(
            "type",
            Parameter::optional_string().with_choices(["LOCAL", "SUBSCRIBED"]),
        )
        .with_parameter("version", Parameter::optional_string());

    let collection = "/api/content/local-library";
    let item = "/api/content/local-library/{library_id}";
    let by_id = || FieldRouting::new().path(["library_id"]);

    ResourceDescriptor::builder("content_locallibrary", schema)
        .id_param("library_id")
        .unicity_key("name")
        .operation(
            op(Operation::Create, HttpMethod::Post, collection).with_routing(
                FieldRouting::new()
                    .query(["client_token"])
                    .body(LIBRARY_FIELDS.iter().copied()),
            ),
        )
        .operation(op(Operation::Get, HttpMethod::Get, item).with_routing(by_id()))
        .operation(op(Operation::List, HttpMethod::Get, collection))
        .operation(
            op(Operation::Update, HttpMethod::Patch, item)
                .with_routing(by_id().body(LIBRARY_FIELDS.iter().copied())),
        )
        .operation(op(Operation::Delete, HttpMethod::Delete, item).with_routing(by_id()))
        .operation(
            op(
                Operation::action("publish"),
                HttpMethod::Post,
                "/api/content/local-library/{library_id}?action=publish",
            )
            .with_routing(by_id().body(["subscriptions"])),
        )
        .build()
}

/// ESXi host registered in the vCenter inventory.
pub fn vcenter_host() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter("folder", Parameter::optional_string())
        .with_parameter("force_add", Parameter::optional_bool())
        .with_parameter("host", Parameter::optional_string())
        .with_parameter("hostname", Parameter::optional_string())
        .with_parameter("password", Parameter::optional_string().sensitive())
        .with_parameter("port", Parameter::optional_int64())
        .with_parameter("thumbprint", Parameter::optional_string())
        .with_parameter(
            "thumbprint_verification",
            Parameter::optional_string().with_choices(["NONE", "THUMBPRINT"]),
        )
        .with_parameter("user_name", Parameter::optional_string().sensitive());

    let collection = "/api/vcenter/host";
    let by_id = || FieldRouting::new().path(["host"]);

    ResourceDescriptor::builder("vcenter_host", schema)
        .id_param("host")
        .unicity_key_as("hostname", "name")
        .operation(
            op(Operation::Create, HttpMethod::Post, collection).with_routing(
                FieldRouting::new().body([
                    "folder",
                    "force_add",
                    "hostname",
                    "password",
                    "port",
                    "thumbprint",
                    "thumbprint_verification",
                    "user_name",
                ]),
            ),
        )
        .operation(op(Operation::List, HttpMethod::Get, collection))
        .operation(
            op(Operation::Delete, HttpMethod::Delete, "/api/vcenter/host/{host}")
                .with_routing(by_id()),
        )
        .operation(
            op(
                Operation::action("connect"),
                HttpMethod::Post,
                "/api/vcenter/host/{host}?action=connect",
            )
            .with_routing(by_id()),
        )
        .operation(
            op(
                Operation::action("disconnect"),
                HttpMethod::Post,
                "/api/vcenter/host/{host}?action=disconnect",
            )
            .with_routing(by_id()),
        )
        .build()
}

/// Virtual ethernet adapter of a VM.
pub fn vcenter_vm_hardware_ethernet() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter("allow_guest_control", Parameter::optional_bool())
        .with_parameter("backing", Parameter::optional_dict())
        .with_parameter("label", Parameter::optional_string())
        .with_parameter("mac_address", Parameter::optional_string())
        .with_parameter(
            "mac_type",
            Parameter::optional_string().with_choices(["ASSIGNED", "GENERATED", "MANUAL"]),
        )
        .with_parameter("nic", Parameter::optional_string())
        .with_parameter("pci_slot_number", Parameter::optional_int64())
        .with_parameter("start_connected", Parameter::optional_bool())
        .with_parameter(
            "type",
            Parameter::optional_string()
                .with_choices(["E1000", "E1000E", "PCNET32", "VMXNET", "VMXNET2", "VMXNET3"]),
        )
        .with_parameter("upt_compatibility_enabled", Parameter::optional_bool())
        .with_parameter(
            "vm",
            Parameter::required_string().with_description("Virtual machine identifier"),
        )
        .with_parameter("wake_on_lan_enabled", Parameter::optional_bool());

    let collection = "/api/vcenter/vm/{vm}/hardware/ethernet";
    let item = "/api/vcenter/vm/{vm}/hardware/ethernet/{nic}";
    let by_id = || FieldRouting::new().path(["vm", "nic"]);

    ResourceDescriptor::builder("vcenter_vm_hardware_ethernet", schema)
        .id_param("nic")
        .unicity_key("label")
        .unicity_key("mac_address")
        .unicity_key("pci_slot_number")
        .operation(
            op(Operation::Create, HttpMethod::Post, collection).with_routing(
                FieldRouting::new()
                    .path(["vm"])
                    .body(NIC_UPDATE_FIELDS.iter().copied())
                    .body(["pci_slot_number", "type"]),
            ),
        )
        .operation(op(Operation::Get, HttpMethod::Get, item).with_routing(by_id()))
        .operation(
            op(Operation::List, HttpMethod::Get, collection)
                .with_routing(FieldRouting::new().path(["vm"])),
        )
        .operation(
            op(Operation::Update, HttpMethod::Patch, item)
                .with_routing(by_id().body(NIC_UPDATE_FIELDS.iter().copied())),
        )
        .operation(op(Operation::Delete, HttpMethod::Delete, item).with_routing(by_id()))
        .operation(
            op(
                Operation::action("connect"),
                HttpMethod::Post,
                "/api/vcenter/vm/{vm}/hardware/ethernet/{nic}?action=connect",
            )
            .with_routing(by_id()),
        )
        .operation(
            op(
                Operation::action("disconnect"),
                HttpMethod::Post,
                "/api/vcenter/vm/{vm}/hardware/ethernet/{nic}?action=disconnect",
            )
            .with_routing(by_id()),
        )
        .build()
}

/// Memory settings of a VM. Always present; only updated.
pub fn vcenter_vm_hardware_memory() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter("hot_add_enabled", Parameter::optional_bool())
        .with_parameter(
            "size_MiB",
            Parameter::optional_int64().with_description("Memory size in mebibytes"),
        )
        .with_parameter("vm", Parameter::required_string());

    let path = "/rest/vcenter/vm/{vm}/hardware/memory";

    ResourceDescriptor::builder("vcenter_vm_hardware_memory", schema)
        .operation(
            op(Operation::Get, HttpMethod::Get, path)
                .with_routing(FieldRouting::new().path(["vm"])),
        )
        .operation(
            op(Operation::Update, HttpMethod::Patch, path)
                .with_routing(
                    FieldRouting::new()
                        .path(["vm"])
                        .body(["hot_add_enabled", "size_MiB"]),
                )
                .with_body_wrapper("spec"),
        )
        .build()
}

/// Deployment type of the vCenter appliance.
pub fn vcenter_systemconfig_deploymenttype() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter("remote_psc", Parameter::optional_dict())
        .with_parameter(
            "type",
            Parameter::optional_string().with_choices([
                "PSC_EXTERNAL",
                "VCSA_EMBEDDED",
                "VCSA_EXTERNAL",
            ]),
        );

    ResourceDescriptor::builder("vcenter_systemconfig_deploymenttype", schema)
        .operation(
            op(
                Operation::action("reconfigure"),
                HttpMethod::Post,
                "/rest/vcenter/system-config/deployment-type",
            )
            .with_routing(FieldRouting::new().body(["remote_psc", "type"]))
            .with_body_wrapper("spec"),
        )
        .build()
}

/// Platform Services Controller registration.
pub fn vcenter_systemconfig_pscregistration() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter("https_port", Parameter::optional_int64())
        .with_parameter("psc_hostname", Parameter::optional_string())
        .with_parameter("sso_admin_password", Parameter::optional_string().sensitive())
        .with_parameter("ssl_thumbprint", Parameter::optional_string())
        .with_parameter("ssl_verify", Parameter::optional_bool());

    ResourceDescriptor::builder("vcenter_systemconfig_pscregistration", schema)
        .operation(
            op(
                Operation::action("repoint"),
                HttpMethod::Post,
                "/rest/vcenter/system-config/psc-registration",
            )
            .with_routing(FieldRouting::new().body([
                "https_port",
                "psc_hostname",
                "sso_admin_password",
                "ssl_thumbprint",
                "ssl_verify",
            ]))
            .with_body_wrapper("spec"),
        )
        .build()
}

/// Files inside a VM guest, manipulated through VMware Tools.
pub fn vcenter_vm_guest_filesystem_files() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter(
            "credentials",
            Parameter::required_dict()
                .sensitive()
                .with_description("Guest authentication credentials"),
        )
        .with_parameter("file_attributes", Parameter::optional_dict())
        .with_parameter("new_path", Parameter::optional_string())
        .with_parameter("overwrite", Parameter::optional_bool())
        .with_parameter("parent_path", Parameter::optional_string())
        .with_parameter("path", Parameter::optional_string())
        .with_parameter("prefix", Parameter::optional_string())
        .with_parameter("suffix", Parameter::optional_string())
        .with_parameter("vm", Parameter::required_string());

    let base = "/api/vcenter/vm/{vm}/guest/filesystem/files";
    let in_vm = || FieldRouting::new().path(["vm"]);

    ResourceDescriptor::builder("vcenter_vm_guest_filesystem_files", schema)
        .operation(
            op(Operation::Update, HttpMethod::Post, &format!("{}?action=update", base))
                .with_routing(in_vm().body(["credentials", "file_attributes", "path"])),
        )
        .operation(
            op(
                Operation::Delete,
                HttpMethod::Post,
                &format!("{}/{{path}}?action=delete", base),
            )
            .with_routing(FieldRouting::new().path(["vm", "path"]).body(["credentials"])),
        )
        .operation(
            op(
                Operation::action("move"),
                HttpMethod::Post,
                &format!("{}?action=move", base),
            )
            .with_routing(in_vm().body(["credentials", "new_path", "overwrite", "path"])),
        )
        .operation(
            op(
                Operation::action("create_temporary"),
                HttpMethod::Post,
                &format!("{}?action=createTemporary", base),
            )
            .with_routing(in_vm().body(["credentials", "parent_path", "prefix", "suffix"])),
        )
        .build()
}

/// Task information (read-only).
pub fn rest_cis_tasks_info() -> Result<ResourceDescriptor> {
    let mut schema = Schema::new()
        .with_parameter("task", Parameter::optional_string())
        .with_parameter("spec.return_all", Parameter::optional_bool())
        .with_parameter("spec.exclude_result", Parameter::optional_bool())
        .with_parameter("result_spec.return_all", Parameter::optional_bool())
        .with_parameter("result_spec.exclude_result", Parameter::optional_bool());
    for filter in TASK_FILTERS {
        schema = schema.with_parameter(*filter, Parameter::optional_list(ParameterType::String));
    }

    ResourceDescriptor::builder("rest_cis_tasks_info", schema)
        .id_param("task")
        .operation(
            op(Operation::Get, HttpMethod::Get, "/rest/cis/tasks/{task}").with_routing(
                FieldRouting::new()
                    .path(["task"])
                    .query(["spec.return_all", "spec.exclude_result"]),
            ),
        )
        .operation(
            op(Operation::List, HttpMethod::Get, "/rest/cis/tasks").with_routing(
                FieldRouting::new()
                    .query(["result_spec.return_all", "result_spec.exclude_result"])
                    .query(TASK_FILTERS.iter().copied()),
            ),
        )
        .build()
}

/// Performance counters (read-only).
pub fn stats_counters_info() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter("cid", Parameter::optional_string())
        .with_parameter("metric", Parameter::optional_string())
        .with_parameter("types", Parameter::optional_list(ParameterType::String));

    ResourceDescriptor::builder("stats_counters_info", schema)
        .id_param("cid")
        .operation(
            op(Operation::Get, HttpMethod::Get, "/rest/api/stats/counters/{cid}")
                .with_routing(FieldRouting::new().path(["cid"])),
        )
        .operation(
            op(Operation::List, HttpMethod::Get, "/rest/api/stats/counters")
                .with_routing(FieldRouting::new().query(["types", "metric"])),
        )
        .build()
}

/// ESX base images known to a trust authority cluster (read-only).
pub fn baseimages_info() -> Result<ResourceDescriptor> {
    let schema = Schema::new()
        .with_parameter("cluster", Parameter::required_string())
        .with_parameter("display_name", Parameter::optional_list(ParameterType::String))
        .with_parameter("health", Parameter::optional_list(ParameterType::String))
        .with_parameter("version", Parameter::optional_string())
        .with_parameter("vmw-task", Parameter::optional_string().with_choices(["true"]));

    let collection = "/rest/api/vcenter/trusted-infrastructure/trust-authority-clusters/{cluster}/attestation/os/esx/base-images";

    ResourceDescriptor::builder(
        "vcenter_trustedinfrastructure_trustauthorityclusters_attestation_os_esx_baseimages_info",
        schema,
    )
    .id_param("version")
    .operation(
        op(
            Operation::Get,
            HttpMethod::Get,
            &format!("{}/{{version}}", collection),
        )
        .with_routing(
            FieldRouting::new()
                .path(["cluster", "version"])
                .query(["vmw-task"]),
        ),
    )
    .operation(
        op(Operation::List, HttpMethod::Get, collection).with_routing(
            FieldRouting::new()
                .path(["cluster"])
                .query(["vmw-task", "display_name", "health"]),
        ),
    )
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Step, STATE_PARAM};
    use crate::types::LifecycleState;

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.len(), 10);
        assert!(catalog.names().contains(&"content_locallibrary"));
        assert!(catalog.names().contains(&"stats_counters_info"));

        let err = catalog.get("vcenter_cluster").unwrap_err();
        assert_eq!(err.to_string(), "Unknown resource type: vcenter_cluster");
    }

    #[test]
    fn test_state_choices_follow_operations() {
        let catalog = Catalog::builtin().unwrap();
        let choices = |name: &str| {
            catalog
                .get(name)
                .unwrap()
                .schema()
                .get(STATE_PARAM)
                .unwrap()
                .choices
                .clone()
        };

        assert_eq!(
            choices("vcenter_host"),
            vec!["present", "absent", "connect", "disconnect"]
        );
        assert_eq!(
            choices("vcenter_vm_guest_filesystem_files"),
            vec!["present", "absent", "move", "create_temporary"]
        );
        assert_eq!(choices("vcenter_systemconfig_pscregistration"), vec!["repoint"]);
    }

    #[test]
    fn test_plans() {
        let catalog = Catalog::builtin().unwrap();

        let memory = catalog.get("vcenter_vm_hardware_memory").unwrap();
        assert!(matches!(
            memory.plan(&LifecycleState::Present).unwrap(),
            Step::Update(spec) if spec.body_wrapper.as_deref() == Some("spec")
        ));

        let library = catalog.get("content_locallibrary").unwrap();
        assert!(matches!(
            library.plan(&LifecycleState::Present).unwrap(),
            Step::Ensure(_)
        ));
        assert!(matches!(
            library.plan(&LifecycleState::action("publish")).unwrap(),
            Step::Action(_)
        ));

        let tasks = catalog.get("rest_cis_tasks_info").unwrap();
        assert_eq!(tasks.plan(&LifecycleState::Present).unwrap(), Step::Read);
        assert!(tasks.plan(&LifecycleState::Absent).is_err());
    }

    #[test]
    fn test_sensitive_parameters() {
        let catalog = Catalog::builtin().unwrap();
        let host = catalog.get("vcenter_host").unwrap();
        assert!(host.schema().is_sensitive("password"));
        assert!(host.schema().is_sensitive("user_name"));
        assert!(!host.schema().is_sensitive("hostname"));
    }
}
