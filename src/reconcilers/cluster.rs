// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster reconciler: validates connectivity to managed clusters and cleans them up on deletion.

use crate::constants::finalizers::CLUSTER as FINALIZER;
use crate::constants::requeue::{ERROR_DELAY, WARNING_THRESHOLD};
use crate::error::Result;
use crate::events::{actions, reasons};
use crate::kubernetes::rbac::remove_rbac;
use crate::kubernetes::{has_finalizer, update_finalizer, update_status, FinalizerOp};
use crate::reconcilers::{error_policy, reconcile_trigger, Context};
use crate::types::{Cluster, ClusterStatus, State};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, events::EventType, reflector, watcher, Controller, WatchStreamExt},
    Api, Client, Resource, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ClusterReconciler {
    ctx: Arc<Context>,
}

impl ClusterReconciler {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let clusters: Api<Cluster> = Api::all(self.ctx.client.clone());
        let (reader, writer) = reflector::store();
        let stream = watcher(clusters, watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .applied_objects()
            .predicate_filter(reconcile_trigger::<Cluster>);

        Controller::for_stream(stream, reader)
            .run(reconcile, error_policy::<Cluster>, self.ctx)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled cluster: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

fn api_for(client: &Client, cluster: &Cluster) -> Api<Cluster> {
    Api::namespaced(client.clone(), &cluster.namespace().unwrap_or_default())
}

#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
async fn reconcile(cluster: Arc<Cluster>, ctx: Arc<Context>) -> Result<Action> {
    let api = api_for(&ctx.client, &cluster);

    if cluster.is_being_deleted() && !has_finalizer(cluster.as_ref(), FINALIZER) {
        debug!("Cluster is being deleted and already cleaned up");
        return Ok(Action::await_change());
    }

    let state = State::after_failure(cluster.retry_count(), WARNING_THRESHOLD);
    let client = match ctx.connector.connect(&cluster).await {
        Ok(client) => client,
        Err(e) => {
            let desc = format!("unable to connect to the managed cluster: {}", e);
            return Ok(record_failure(&api, &cluster, &ctx, state, desc).await);
        }
    };

    if cluster.is_being_deleted() {
        return handle_delete(&api, &cluster, &ctx, &client).await;
    }

    if !has_finalizer(cluster.as_ref(), FINALIZER) {
        info!("New cluster resource, adding finalizer {}", FINALIZER);
        update_finalizer(&api, cluster.as_ref(), FINALIZER, FinalizerOp::Add).await?;
    }

    match ctx.connector.server_version(&client).await {
        Ok(version) => {
            info!("Cluster validated, server version {}", version);
            ctx.events
                .publish(
                    &cluster.object_ref(&()),
                    EventType::Normal,
                    reasons::CLUSTER_READY,
                    actions::RECONCILE,
                    Some("Successfully validated the managed cluster".to_string()),
                )
                .await;
            let status = ClusterStatus {
                state: Some(State::Ready),
                retry_count: 0,
                error_description: None,
            };
            let frequency = ctx.properties.borrow().cluster_validation_frequency;
            Ok(update_status(&api, cluster.as_ref(), &status, Some(frequency), ctx.events.as_ref()).await)
        }
        Err(e) => {
            let desc = format!("unable to get the server version: {}", e);
            Ok(record_failure(&api, &cluster, &ctx, state, desc).await)
        }
    }
}

async fn record_failure(
    api: &Api<Cluster>,
    cluster: &Cluster,
    ctx: &Context,
    state: State,
    desc: String,
) -> Action {
    warn!("{}", desc);
    ctx.events
        .publish(
            &cluster.object_ref(&()),
            EventType::Warning,
            reasons::CLUSTER_UNREACHABLE,
            actions::RECONCILE,
            Some(desc.clone()),
        )
        .await;
    let status = ClusterStatus {
        state: Some(state),
        retry_count: cluster.retry_count() + 1,
        error_description: Some(desc),
    };
    update_status(api, cluster, &status, Some(ERROR_DELAY), ctx.events.as_ref()).await
}

/// Remove the bootstrap RBAC from the managed cluster, then release the Cluster object
async fn handle_delete(
    api: &Api<Cluster>,
    cluster: &Cluster,
    ctx: &Context,
    client: &Client,
) -> Result<Action> {
    info!("Cluster delete request");
    if let Err(e) = remove_rbac(client).await {
        let desc = format!("unable to clean up the managed cluster: {}", e);
        warn!("{}", desc);
        ctx.events
            .publish(
                &cluster.object_ref(&()),
                EventType::Warning,
                reasons::CLEANUP_FAILED,
                actions::DELETE,
                Some(desc.clone()),
            )
            .await;
        let status = ClusterStatus {
            state: Some(State::Error),
            retry_count: cluster.retry_count() + 1,
            error_description: Some(desc),
        };
        return Ok(update_status(api, cluster, &status, Some(ERROR_DELAY), ctx.events.as_ref()).await);
    }

    update_finalizer(api, cluster, FINALIZER, FinalizerOp::Remove).await?;
    ctx.events
        .publish(
            &cluster.object_ref(&()),
            EventType::Normal,
            reasons::CLUSTER_DELETED,
            actions::DELETE,
            Some("Successfully deleted cluster".to_string()),
        )
        .await;
    info!("Successfully deleted cluster");
    Ok(Action::await_change())
}
