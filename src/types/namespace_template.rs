// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::resources::NamespaceResources;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Reusable, cluster scoped set of namespace resources with `${param}` placeholders
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "fleet.geeko.me", version = "v1alpha1", kind = "NamespaceTemplate")]
#[kube(shortname = "nt")]
#[serde(rename_all = "camelCase")]
pub struct NamespaceTemplateSpec {
    /// Parameters that requests may fill in
    #[serde(default)]
    pub exported_param_name: Vec<String>,
    pub ns_resources: NamespaceResources,
}
