// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::resources::NamespaceResources;
use crate::types::status::State;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A namespace to provision in a managed cluster, optionally derived from a template
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "fleet.geeko.me", version = "v1alpha1", kind = "ManagedNamespace")]
#[kube(namespaced)]
#[kube(status = "ManagedNamespaceStatus")]
#[kube(shortname = "mns")]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[kube(printcolumn = r#"{"name":"RetryCount","type":"integer","jsonPath":".status.retryCount"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ManagedNamespaceSpec {
    /// Name of the Cluster (in the manager namespace) to provision into
    pub cluster_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns_resources: Option<NamespaceResources>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedNamespaceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Set once every resource has been applied successfully at least once
    #[serde(default)]
    pub provisioned: bool,
}

impl ManagedNamespace {
    pub fn retry_count(&self) -> u32 {
        self.status.as_ref().map(|s| s.retry_count).unwrap_or(0)
    }

    /// Whether the namespace has ever been provisioned completely
    pub fn is_provisioned(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.provisioned)
    }

    /// Template to resolve, if any. An empty name counts as no template.
    pub fn template(&self) -> Option<&str> {
        self.spec.template_name.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
