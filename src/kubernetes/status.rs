// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Status and finalizer bookkeeping shared by the reconcilers.

use crate::constants::requeue::STATUS_UPDATE_FAILED_DELAY;
use crate::error::{FleetError, Result};
use crate::events::{actions, reasons, EventPublisher};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Persist `status` on `object` and decide when the object is looked at again.
///
/// Returns `requeue` when given, otherwise waits for the next change. A failing status write is
/// reported as a warning event and always leads to a short requeue so the object is never left
/// unscheduled.
pub async fn update_status<K, S>(
    api: &Api<K>,
    object: &K,
    status: &S,
    requeue: Option<Duration>,
    events: &dyn EventPublisher,
) -> Action
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
    S: Serialize,
{
    let name = object.name_any();
    let patch = Patch::Merge(json!({ "status": status }));
    match api.patch_status(&name, &PatchParams::default(), &patch).await {
        Ok(_) => {
            debug!("Updated status of {}", name);
            match requeue {
                Some(delay) => Action::requeue(delay),
                None => Action::await_change(),
            }
        }
        Err(e) => {
            warn!("Unable to update status of {}: {}", name, e);
            events
                .publish(
                    &object.object_ref(&()),
                    EventType::Warning,
                    reasons::STATUS_UPDATE_FAILED,
                    actions::UPDATE_STATUS,
                    Some(e.to_string()),
                )
                .await;
            Action::requeue(STATUS_UPDATE_FAILED_DELAY)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizerOp {
    Add,
    Remove,
}

pub fn has_finalizer<K: Resource>(object: &K, finalizer: &str) -> bool {
    object.finalizers().iter().any(|f| f == finalizer)
}

/// Add or remove `finalizer`. Does nothing when the object is already in the desired state.
///
/// A failed write is returned as [`FleetError::Finalizer`], which the controllers treat as fatal.
pub async fn update_finalizer<K>(
    api: &Api<K>,
    object: &K,
    finalizer: &str,
    op: FinalizerOp,
) -> Result<()>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    let name = object.name_any();
    let present = has_finalizer(object, finalizer);
    let finalizers: Vec<String> = match op {
        FinalizerOp::Add if present => return Ok(()),
        FinalizerOp::Remove if !present => return Ok(()),
        FinalizerOp::Add => object
            .finalizers()
            .iter()
            .cloned()
            .chain(std::iter::once(finalizer.to_string()))
            .collect(),
        FinalizerOp::Remove => object
            .finalizers()
            .iter()
            .filter(|f| *f != finalizer)
            .cloned()
            .collect(),
    };

    let patch = Patch::Merge(json!({ "metadata": { "finalizers": finalizers } }));
    api.patch(&name, &PatchParams::default(), &patch)
        .await
        .map_err(|source| FleetError::Finalizer {
            object: name.clone(),
            source,
        })?;
    info!("{:?} finalizer {} on {}", op, finalizer, name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventPublisher;
    use crate::test_utils::{status_json, MockService, RecordingEventPublisher};
    use crate::types::{Cluster, ClusterSpec, ClusterStatus, State};
    use kube::api::ObjectMeta;

    const CLUSTERS: &str = "/apis/fleet.geeko.me/v1alpha1/namespaces/manager-system/clusters";

    fn make_cluster(finalizers: Vec<&str>) -> Cluster {
        Cluster {
            metadata: ObjectMeta {
                name: Some("east".to_string()),
                namespace: Some("manager-system".to_string()),
                finalizers: Some(finalizers.into_iter().map(str::to_string).collect()),
                ..Default::default()
            },
            spec: ClusterSpec {
                name: "east".to_string(),
                cloud: None,
                config: Default::default(),
            },
            status: None,
        }
    }

    fn cluster_json() -> String {
        serde_json::to_string(&make_cluster(vec![])).unwrap()
    }

    fn failed_status() -> ClusterStatus {
        ClusterStatus {
            state: Some(State::Warning),
            retry_count: 1,
            error_description: Some("unreachable".to_string()),
        }
    }

    #[tokio::test]
    async fn test_update_status_patches_status_subresource() {
        let mock = MockService::new().on_patch(&format!("{}/east/status", CLUSTERS), 200, &cluster_json());
        let api: Api<Cluster> = Api::namespaced(mock.clone().into_client(), "manager-system");
        let events = RecordingEventPublisher::default();

        let action = update_status(
            &api,
            &make_cluster(vec![]),
            &failed_status(),
            Some(Duration::from_secs(30)),
            &events,
        )
        .await;

        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        let patch = mock.last("PATCH").unwrap().json();
        assert_eq!(patch["status"]["state"], "Warning");
        assert_eq!(patch["status"]["retryCount"], 1);
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn test_update_status_without_delay_waits_for_change() {
        let mock = MockService::new().on_patch(&format!("{}/east/status", CLUSTERS), 200, &cluster_json());
        let api: Api<Cluster> = Api::namespaced(mock.into_client(), "manager-system");

        let action = update_status(
            &api,
            &make_cluster(vec![]),
            &ClusterStatus::default(),
            None,
            &NoopEventPublisher,
        )
        .await;

        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_failed_status_write_requeues_and_warns() {
        let mock = MockService::new().on_patch(
            &format!("{}/east/status", CLUSTERS),
            500,
            &status_json(500, "InternalError", "etcd unavailable"),
        );
        let api: Api<Cluster> = Api::namespaced(mock.into_client(), "manager-system");
        let events = RecordingEventPublisher::default();

        let action = update_status(&api, &make_cluster(vec![]), &failed_status(), None, &events).await;

        assert_eq!(action, Action::requeue(STATUS_UPDATE_FAILED_DELAY));
        let recorded = events.events();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].warning);
        assert_eq!(recorded[0].reason, reasons::STATUS_UPDATE_FAILED);
    }

    #[tokio::test]
    async fn test_add_finalizer() {
        let mock = MockService::new().on_patch(&format!("{}/east", CLUSTERS), 200, &cluster_json());
        let api: Api<Cluster> = Api::namespaced(mock.clone().into_client(), "manager-system");

        update_finalizer(&api, &make_cluster(vec!["other"]), "fin", FinalizerOp::Add)
            .await
            .unwrap();

        let patch = mock.last("PATCH").unwrap().json();
        assert_eq!(patch["metadata"]["finalizers"], json!(["other", "fin"]));
    }

    #[tokio::test]
    async fn test_finalizer_ops_are_idempotent() {
        let mock = MockService::new();
        let api: Api<Cluster> = Api::namespaced(mock.clone().into_client(), "manager-system");

        update_finalizer(&api, &make_cluster(vec!["fin"]), "fin", FinalizerOp::Add)
            .await
            .unwrap();
        update_finalizer(&api, &make_cluster(vec![]), "fin", FinalizerOp::Remove)
            .await
            .unwrap();

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_finalizer_keeps_others() {
        let mock = MockService::new().on_patch(&format!("{}/east", CLUSTERS), 200, &cluster_json());
        let api: Api<Cluster> = Api::namespaced(mock.clone().into_client(), "manager-system");

        update_finalizer(&api, &make_cluster(vec!["fin", "other"]), "fin", FinalizerOp::Remove)
            .await
            .unwrap();

        let patch = mock.last("PATCH").unwrap().json();
        assert_eq!(patch["metadata"]["finalizers"], json!(["other"]));
    }

    #[tokio::test]
    async fn test_finalizer_failure_is_fatal() {
        let mock = MockService::new().on_patch(
            &format!("{}/east", CLUSTERS),
            409,
            &status_json(409, "Conflict", "the object has been modified"),
        );
        let api: Api<Cluster> = Api::namespaced(mock.into_client(), "manager-system");

        let err = update_finalizer(&api, &make_cluster(vec![]), "fin", FinalizerOp::Add)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, FleetError::Finalizer { ref object, .. } if object == "east"));
    }
}
