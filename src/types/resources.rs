// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Declarative resource sets provisioned inside a managed namespace.

use k8s_openapi::api::core::v1::{Namespace, ResourceQuota, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A namespace together with the resources to create inside it
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceResources {
    pub namespace: Namespace,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl NamespaceResources {
    /// Name of the namespace, empty when the namespace object carries none
    pub fn namespace_name(&self) -> &str {
        self.namespace.metadata.name.as_deref().unwrap_or_default()
    }
}

/// A named unit of work, optionally depending on another resource of the same set
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    /// Only applied while the owning namespace is provisioned for the first time
    #[serde(default)]
    pub create_only: bool,
    #[serde(flatten)]
    pub spec: ResourceSpec,
}

impl Resource {
    /// The resource this one depends on. An empty reference means no dependency.
    pub fn dependency(&self) -> Option<&str> {
        self.depends_on.as_deref().filter(|d| !d.is_empty())
    }

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }
}

/// Kind specific payload, tagged by `type`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(tag = "type")]
pub enum ResourceSpec {
    #[serde(rename_all = "camelCase")]
    ServiceAccount { service_account: ServiceAccount },
    #[serde(rename_all = "camelCase")]
    Role { role: Role },
    #[serde(rename_all = "camelCase")]
    RoleBinding { role_binding: RoleBinding },
    #[serde(rename_all = "camelCase")]
    ResourceQuota { resource_quota: ResourceQuota },
    #[serde(rename_all = "camelCase")]
    CustomResource { custom_resource: CustomResourceSpec },
    #[serde(rename_all = "camelCase")]
    Namespace { namespace: Namespace },
    /// Any `type` this version does not know about
    #[serde(other)]
    Unsupported,
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::ServiceAccount { .. } => ResourceKind::ServiceAccount,
            ResourceSpec::Role { .. } => ResourceKind::Role,
            ResourceSpec::RoleBinding { .. } => ResourceKind::RoleBinding,
            ResourceSpec::ResourceQuota { .. } => ResourceKind::ResourceQuota,
            ResourceSpec::CustomResource { .. } => ResourceKind::CustomResource,
            ResourceSpec::Namespace { .. } => ResourceKind::Namespace,
            ResourceSpec::Unsupported => ResourceKind::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    ServiceAccount,
    Role,
    RoleBinding,
    ResourceQuota,
    CustomResource,
    Namespace,
    Unsupported,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::ResourceQuota => "ResourceQuota",
            ResourceKind::CustomResource => "CustomResource",
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Unsupported => "Unsupported",
        };
        f.write_str(name)
    }
}

/// An arbitrary custom resource given as an embedded manifest
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceSpec {
    pub gvk: GroupVersionKind,
    /// JSON or YAML document of the object to create
    pub manifest: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_deserializes_tagged_payload() {
        let resource: Resource = serde_json::from_value(json!({
            "name": "sa1",
            "type": "ServiceAccount",
            "serviceAccount": {"metadata": {"name": "team-sa"}}
        }))
        .unwrap();

        assert_eq!(resource.kind(), ResourceKind::ServiceAccount);
        assert_eq!(resource.dependency(), None);
        assert!(!resource.create_only);
        match resource.spec {
            ResourceSpec::ServiceAccount { service_account } => {
                assert_eq!(service_account.metadata.name.as_deref(), Some("team-sa"))
            }
            other => panic!("unexpected spec {:?}", other),
        }
    }

    #[test]
    fn test_resource_with_unknown_type_is_unsupported() {
        let resource: Resource = serde_json::from_value(json!({
            "name": "odd",
            "type": "Deployment",
            "deployment": {}
        }))
        .unwrap();

        assert_eq!(resource.kind(), ResourceKind::Unsupported);
    }

    #[test]
    fn test_empty_depends_on_means_no_dependency() {
        let resource: Resource = serde_json::from_value(json!({
            "name": "role1",
            "dependsOn": "",
            "createOnly": true,
            "type": "Role",
            "role": {"metadata": {"name": "role1"}}
        }))
        .unwrap();

        assert_eq!(resource.dependency(), None);
        assert!(resource.create_only);
    }

    #[test]
    fn test_custom_resource_payload() {
        let resource: Resource = serde_json::from_value(json!({
            "name": "cr",
            "dependsOn": "sa1",
            "type": "CustomResource",
            "customResource": {
                "gvk": {"group": "example.com", "version": "v1", "kind": "Widget"},
                "manifest": "{\"metadata\":{\"name\":\"w\"}}"
            }
        }))
        .unwrap();

        assert_eq!(resource.dependency(), Some("sa1"));
        assert_eq!(resource.kind().to_string(), "CustomResource");
    }

    #[test]
    fn test_namespace_name() {
        let resources: NamespaceResources = serde_json::from_value(json!({
            "namespace": {"metadata": {"name": "team-a"}}
        }))
        .unwrap();

        assert_eq!(resources.namespace_name(), "team-a");
        assert!(resources.resources.is_empty());
    }
}
