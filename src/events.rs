// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes Events for Cluster and ManagedNamespace objects.
//!
//! Publishing never fails a reconciliation: errors are logged at warn level and dropped.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        object_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publishes through `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        object_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, object_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Drops every event
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _object_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Values for the REASON column of `kubectl get events`
pub mod reasons {
    pub const CLUSTER_READY: &str = "ClusterReady";
    pub const CLUSTER_UNREACHABLE: &str = "ClusterUnreachable";
    pub const CLUSTER_DELETED: &str = "ClusterDeleted";
    pub const CLEANUP_FAILED: &str = "CleanupFailed";
    pub const NAMESPACE_PROVISIONED: &str = "NamespaceProvisioned";
    pub const PROVISIONING_FAILED: &str = "ProvisioningFailed";
    pub const NAMESPACE_RELEASED: &str = "NamespaceReleased";
    pub const RESOURCE_APPLIED: &str = "ResourceApplied";
    pub const RESOURCE_FAILED: &str = "ResourceFailed";
    pub const APPLICATION_READY: &str = "ApplicationReady";
    pub const APPLICATION_FAILED: &str = "ApplicationFailed";
    pub const APPLICATION_DELETED: &str = "ApplicationDeleted";
    pub const STATUS_UPDATE_FAILED: &str = "StatusUpdateFailed";
}

/// Values for the ACTION column of `kubectl get events`
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const DELETE: &str = "Delete";
    pub const UPDATE_STATUS: &str = "UpdateStatus";
}
