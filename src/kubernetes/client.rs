// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Managed cluster client creation from Cluster objects and their bearer token secrets

use crate::error::{FleetError, Result};
use crate::types::Cluster;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info, instrument};
use url::Url;

/// Opens connections to managed clusters
#[async_trait]
pub trait Connector: Send + Sync {
    /// Build a client for `cluster` without contacting it
    async fn connect(&self, cluster: &Cluster) -> Result<Client>;

    /// Lightweight identity call against the managed cluster, returns its version
    async fn server_version(&self, client: &Client) -> Result<String>;
}

/// Reads bearer tokens from secrets in the management cluster
#[derive(Clone)]
pub struct KubeConnector {
    client: Client,
}

impl KubeConnector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self, cluster), fields(cluster = %cluster.name_any()))]
    async fn bearer_token(&self, cluster: &Cluster) -> Result<String> {
        let Some(secret_name) = cluster.token_secret_name() else {
            return Err(FleetError::SecretError(format!(
                "Cluster {} has no bearer token secret",
                cluster.name_any()
            )));
        };
        let namespace = cluster.namespace().unwrap_or_default();
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);

        debug!("Getting bearer token secret '{}/{}'", namespace, secret_name);
        let secret = match secrets.get(secret_name).await {
            Ok(secret) => secret,
            Err(kube::Error::Api(err)) if err.code == 404 => {
                return Err(FleetError::SecretError(format!(
                    "Secret {}/{} not found",
                    namespace, secret_name
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let key = cluster.token_secret_key();
        let Some(token) = secret.data.as_ref().and_then(|d| d.get(&key)) else {
            return Err(FleetError::SecretError(format!(
                "Secret {}/{} does not contain key '{}'",
                namespace, secret_name, key
            )));
        };

        String::from_utf8(token.0.clone()).map_err(|e| {
            FleetError::SecretError(format!(
                "Token in secret {}/{} is not valid UTF-8: {}",
                namespace, secret_name, e
            ))
        })
    }
}

#[async_trait]
impl Connector for KubeConnector {
    async fn connect(&self, cluster: &Cluster) -> Result<Client> {
        let token = self.bearer_token(cluster).await?;
        let kubeconfig = kubeconfig_for(cluster, &token)?;
        create_client_from_kubeconfig(kubeconfig).await
    }

    #[instrument(skip(self, client))]
    async fn server_version(&self, client: &Client) -> Result<String> {
        let info = client.apiserver_version().await?;
        info!("Managed cluster reports version {}", info.git_version);
        Ok(info.git_version)
    }
}

/// Normalize the API server address of a cluster, defaulting to https
pub fn server_url(host: &str) -> Result<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(FleetError::ConnectionError("Cluster host is empty".to_string()));
    }
    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    Url::parse(&candidate)
        .map_err(|e| FleetError::ConnectionError(format!("Invalid cluster host '{}': {}", host, e)))
}

/// Kubeconfig with a single context for `cluster`, authenticating with `token`
pub fn kubeconfig_for(cluster: &Cluster, token: &str) -> Result<Kubeconfig> {
    let name = cluster.name_any();
    let server = server_url(&cluster.spec.config.host)?;
    let tls = &cluster.spec.config.tls_client_config;

    let value = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": name,
            "cluster": {
                "server": server.as_str().trim_end_matches('/'),
                "insecure-skip-tls-verify": tls.insecure,
                "tls-server-name": tls.server_name,
                "certificate-authority-data": tls.ca_data,
            }
        }],
        "users": [{
            "name": name,
            "user": {
                "token": token,
                "client-certificate-data": tls.cert_data,
                "client-key-data": tls.key_data,
            }
        }],
        "contexts": [{
            "name": name,
            "context": {"cluster": name, "user": name}
        }],
        "current-context": name,
    });

    serde_json::from_value(value)
        .map_err(|e| FleetError::ConnectionError(format!("Failed to build kubeconfig: {}", e)))
}

/// Encode DER certificates, as found in a loaded `kube::Config`, as a PEM bundle
pub fn pem_bundle(certs: &[Vec<u8>]) -> Vec<u8> {
    let mut pem = String::new();
    for der in certs {
        let encoded = STANDARD.encode(der);
        pem.push_str("-----BEGIN CERTIFICATE-----\n");
        for line in encoded.as_bytes().chunks(64) {
            pem.push_str(&String::from_utf8_lossy(line));
            pem.push('\n');
        }
        pem.push_str("-----END CERTIFICATE-----\n");
    }
    pem.into_bytes()
}

/// Create a Kubernetes client from a parsed kubeconfig
pub async fn create_client_from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Client> {
    let client_config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| FleetError::ConnectionError(format!("Failed to create config: {}", e)))?;

    Client::try_from(client_config)
        .map_err(|e| FleetError::ConnectionError(format!("Failed to create client: {}", e)))
}
