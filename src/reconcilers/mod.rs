// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod application;
pub mod cluster;
pub mod managed_namespace;

pub use application::ApplicationReconciler;
pub use cluster::ClusterReconciler;
pub use managed_namespace::ManagedNamespaceReconciler;

use crate::config::Properties;
use crate::constants::requeue::ERROR_DELAY;
use crate::error::FleetError;
use crate::events::EventPublisher;
use crate::kubernetes::Connector;
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;

/// Shared state of the reconcilers
pub struct Context {
    /// Client for the management cluster
    pub client: Client,
    /// Namespace holding the Cluster objects
    pub manager_namespace: String,
    pub connector: Arc<dyn Connector>,
    pub events: Arc<dyn EventPublisher>,
    pub properties: watch::Receiver<Properties>,
}

/// Watch events worth a reconciliation: spec changes and deletion requests.
///
/// Status and finalizer writes of the reconcilers themselves do not trigger another run; the
/// requeue returned by the reconciler takes care of revisiting the object.
pub(crate) fn reconcile_trigger<K: Resource>(object: &K) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    object.meta().generation.hash(&mut hasher);
    object.meta().deletion_timestamp.is_some().hash(&mut hasher);
    Some(hasher.finish())
}

pub(crate) fn error_policy<K: Resource>(object: Arc<K>, error: &FleetError, _ctx: Arc<Context>) -> Action {
    if error.is_fatal() {
        error!(
            "Unrecoverable error for {}, operator attention required, not retrying: {}",
            object.name_any(),
            error
        );
        return Action::await_change();
    }
    error!("Reconciliation error for {}: {}", object.name_any(), error);
    Action::requeue(ERROR_DELAY)
}
