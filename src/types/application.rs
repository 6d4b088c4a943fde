// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::naming::sanitize_name;
use crate::types::managed_namespace::{ManagedNamespace, ManagedNamespaceSpec};
use crate::types::status::State;
use kube::api::ObjectMeta;
use kube::{CustomResource, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An application spread over one managed namespace per environment
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "fleet.geeko.me", version = "v1alpha1", kind = "Application")]
#[kube(status = "ApplicationStatus")]
#[kube(shortname = "app")]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[kube(printcolumn = r#"{"name":"RetryCount","type":"integer","jsonPath":".status.retryCount"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub app_name: String,
    /// Parameters handed to every environment that doesn't set them itself
    #[serde(default)]
    pub app_params: BTreeMap<String, String>,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// e.g. dev, qa or prod
    pub name: String,
    pub namespace: ManagedNamespaceSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl Application {
    pub fn retry_count(&self) -> u32 {
        self.status.as_ref().map(|s| s.retry_count).unwrap_or(0)
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// The ManagedNamespace of every environment, named `<appName>-<env>` and placed in the
    /// namespace named after the sanitized cluster name.
    ///
    /// Returns `None` while the Application has no uid to be referenced as owner.
    pub fn managed_namespaces(&self) -> Option<Vec<ManagedNamespace>> {
        let owner = self.controller_owner_ref(&())?;
        let namespaces = self
            .spec
            .environments
            .iter()
            .map(|env| {
                let mut spec = env.namespace.clone();
                for (key, value) in &self.spec.app_params {
                    spec.params
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                ManagedNamespace {
                    metadata: ObjectMeta {
                        name: Some(format!("{}-{}", self.spec.app_name, env.name)),
                        namespace: Some(sanitize_name(&spec.cluster_name)),
                        owner_references: Some(vec![owner.clone()]),
                        ..Default::default()
                    },
                    spec,
                    status: None,
                }
            })
            .collect();
        Some(namespaces)
    }
}
