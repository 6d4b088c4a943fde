// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::properties::CLUSTER_VALIDATION_FREQUENCY;
use crate::constants::requeue::DEFAULT_VALIDATION_FREQUENCY_SECS;
use anyhow::{Context, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace holding Cluster objects and their token secrets
    pub manager_namespace: String,
    pub validation_frequency: Duration,
    /// ConfigMap with runtime adjustable properties
    pub config_map_name: String,
    pub registration_addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let manager_namespace =
            lookup("MANAGER_NAMESPACE").unwrap_or_else(|| "manager-system".to_string());
        let validation_frequency = match lookup("CLUSTER_VALIDATION_FREQUENCY_SECS") {
            Some(v) => v
                .parse()
                .context("CLUSTER_VALIDATION_FREQUENCY_SECS must be a number of seconds")?,
            None => DEFAULT_VALIDATION_FREQUENCY_SECS,
        };
        let config_map_name = lookup("CONFIG_MAP_NAME")
            .unwrap_or_else(|| "manager-v1alpha1-configmap".to_string());
        let registration_addr = lookup("REGISTRATION_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("REGISTRATION_ADDR must be a socket address")?;

        Ok(Config {
            manager_namespace,
            validation_frequency: Duration::from_secs(validation_frequency),
            config_map_name,
            registration_addr,
        })
    }

    pub fn properties(&self) -> Properties {
        Properties {
            cluster_validation_frequency: self.validation_frequency,
        }
    }
}

/// Properties that can change while the operator runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties {
    pub cluster_validation_frequency: Duration,
}

/// Apply the values found in `cm` on top of `current`. Unparsable values are ignored.
pub fn parse_properties(cm: &ConfigMap, current: Properties) -> Properties {
    let mut props = current;
    let Some(data) = cm.data.as_ref() else {
        return props;
    };
    if let Some(raw) = data.get(CLUSTER_VALIDATION_FREQUENCY) {
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => props.cluster_validation_frequency = Duration::from_secs(secs),
            _ => warn!(
                "Ignoring invalid {} value '{}', keeping {:?}",
                CLUSTER_VALIDATION_FREQUENCY, raw, props.cluster_validation_frequency
            ),
        }
    }
    props
}

/// Watch the properties ConfigMap and publish every change to `tx`
pub async fn watch_properties(
    client: Client,
    config: Config,
    tx: watch::Sender<Properties>,
) -> anyhow::Result<()> {
    let config_maps: Api<ConfigMap> = Api::namespaced(client, &config.manager_namespace);
    let wc = watcher::Config::default().fields(&format!("metadata.name={}", config.config_map_name));

    info!(
        "Watching ConfigMap {}/{} for properties",
        config.manager_namespace, config.config_map_name
    );
    let mut stream = watcher(config_maps, wc)
        .default_backoff()
        .applied_objects()
        .boxed();
    while let Some(item) = stream.next().await {
        match item {
            Ok(cm) => publish_properties(&cm, &tx),
            Err(e) => warn!("Properties watch error, retrying: {}", e),
        }
    }

    warn!("Properties watch ended");
    Ok(())
}

fn publish_properties(cm: &ConfigMap, tx: &watch::Sender<Properties>) {
    let current = *tx.borrow();
    let updated = parse_properties(cm, current);
    if updated != current {
        info!("Properties updated: {:?}", updated);
        tx.send_replace(updated);
    } else {
        debug!("ConfigMap changed without property changes");
    }
}
