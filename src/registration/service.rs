// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::OPERATOR_NAME;
use crate::error::{FleetError, Result};
use crate::naming::{sanitize_name, token_secret_key, token_secret_name};
use crate::types::{Cluster, ClusterSpec, ConnectionConfig, TlsClientConfig};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, ObjectMeta, Patch, PatchParams};
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

/// A cluster registration as sent over the wire
#[derive(Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistration {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<String>,
    pub config: RegistrationConfig,
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationConfig {
    pub host: String,
    pub bearer_token: String,
    #[serde(default)]
    pub tls_client_config: TlsClientConfig,
}

impl fmt::Debug for ClusterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterRegistration")
            .field("name", &self.name)
            .field("cloud", &self.cloud)
            .field("host", &self.config.host)
            .field("bearer_token", &"--- REDACTED ---")
            .field("tls_client_config", &self.config.tls_client_config)
            .finish()
    }
}

impl ClusterRegistration {
    fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FleetError::InvalidRequest("cluster name is required".to_string()));
        }
        if self.config.host.trim().is_empty() {
            return Err(FleetError::InvalidRequest(format!(
                "host is required for cluster {}",
                self.name
            )));
        }
        if self.config.bearer_token.is_empty() {
            return Err(FleetError::InvalidRequest(format!(
                "bearer token is required for cluster {}",
                self.name
            )));
        }
        Ok(())
    }

    /// The Cluster object for this registration. The token itself is only referenced.
    fn to_cluster(&self, namespace: &str) -> Cluster {
        let name = sanitize_name(&self.name);
        let mut cluster = Cluster::new(
            &name,
            ClusterSpec {
                name: name.clone(),
                cloud: self.cloud.clone(),
                config: ConnectionConfig {
                    host: self.config.host.clone(),
                    bearer_token_secret: Some(token_secret_name(&name)),
                    tls_client_config: self.config.tls_client_config.clone(),
                },
            },
        );
        cluster.metadata.namespace = Some(namespace.to_string());
        cluster
    }

    fn to_secret(&self, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(token_secret_name(&self.name)),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            string_data: Some(BTreeMap::from([(
                token_secret_key(&self.name),
                self.config.bearer_token.clone(),
            )])),
            ..Default::default()
        }
    }
}

/// Stores registered clusters in the manager namespace
#[derive(Clone)]
pub struct Registrar {
    client: Client,
    namespace: String,
}

impl Registrar {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Persist the bearer token and create or update the Cluster object. Returns the sanitized
    /// cluster name.
    #[instrument(skip(self, registration), fields(cluster = %registration.name))]
    pub async fn register_cluster(&self, registration: &ClusterRegistration) -> Result<String> {
        registration.check()?;
        let name = sanitize_name(&registration.name);
        debug!("Cluster name after sanitizing: {}", name);

        let pp = PatchParams::apply(OPERATOR_NAME).force();

        let secret = registration.to_secret(&self.namespace);
        let secret_name = token_secret_name(&name);
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        secrets.patch(&secret_name, &pp, &Patch::Apply(&secret)).await?;
        debug!("Token secret {}/{} applied", self.namespace, secret_name);

        let clusters: Api<Cluster> = Api::namespaced(self.client.clone(), &self.namespace);
        clusters
            .patch(&name, &pp, &Patch::Apply(&registration.to_cluster(&self.namespace)))
            .await?;
        info!("Cluster {}/{} registered", self.namespace, name);

        Ok(name)
    }

    /// Delete the Cluster object. Its finalizer takes care of the managed cluster side.
    #[instrument(skip(self))]
    pub async fn unregister_cluster(&self, cluster_name: &str) -> Result<String> {
        let name = sanitize_name(cluster_name);
        if name.trim().is_empty() {
            return Err(FleetError::InvalidRequest("cluster name is required".to_string()));
        }

        let clusters: Api<Cluster> = Api::namespaced(self.client.clone(), &self.namespace);
        clusters.delete(&name, &DeleteParams::foreground()).await?;
        info!("Cluster {}/{} unregistered", self.namespace, name);

        Ok(name)
    }
}
