// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ManagedNamespace reconciler: renders the requested template and provisions the namespace with
//! its resources in the managed cluster.

use crate::constants::finalizers::NAMESPACE as FINALIZER;
use crate::constants::requeue::ERROR_DELAY;
use crate::error::{FleetError, Result, TemplateError};
use crate::events::{actions, reasons};
use crate::kubernetes::{has_finalizer, update_finalizer, update_status, FinalizerOp};
use crate::naming::sanitize_name;
use crate::provisioning::{apply_namespace, resolve, validate, KubeResourceApplier, WaveScheduler};
use crate::reconcilers::{error_policy, reconcile_trigger, Context};
use crate::types::{
    Cluster, ManagedNamespace, ManagedNamespaceStatus, NamespaceTemplate, Resource, State,
};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, events::EventType, reflector, watcher, Controller, WatchStreamExt},
    Api, Resource as _, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ManagedNamespaceReconciler {
    ctx: Arc<Context>,
}

impl ManagedNamespaceReconciler {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let namespaces: Api<ManagedNamespace> = Api::all(self.ctx.client.clone());
        let (reader, writer) = reflector::store();
        let stream = watcher(namespaces, watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .applied_objects()
            .predicate_filter(reconcile_trigger::<ManagedNamespace>);

        Controller::for_stream(stream, reader)
            .run(reconcile, error_policy::<ManagedNamespace>, self.ctx)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled managed namespace: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

#[instrument(skip(ns, ctx), fields(managed_namespace = %ns.name_any(), cluster = %ns.spec.cluster_name))]
async fn reconcile(ns: Arc<ManagedNamespace>, ctx: Arc<Context>) -> Result<Action> {
    let api: Api<ManagedNamespace> =
        Api::namespaced(ctx.client.clone(), &ns.namespace().unwrap_or_default());

    if ns.is_being_deleted() {
        if has_finalizer(ns.as_ref(), FINALIZER) {
            update_finalizer(&api, ns.as_ref(), FINALIZER, FinalizerOp::Remove).await?;
            ctx.events
                .publish(
                    &ns.object_ref(&()),
                    EventType::Normal,
                    reasons::NAMESPACE_RELEASED,
                    actions::DELETE,
                    Some("Successfully deleted managed namespace".to_string()),
                )
                .await;
            info!("Released managed namespace");
        }
        return Ok(Action::await_change());
    }

    if !has_finalizer(ns.as_ref(), FINALIZER) {
        info!("New managed namespace, adding finalizer {}", FINALIZER);
        update_finalizer(&api, ns.as_ref(), FINALIZER, FinalizerOp::Add).await?;
    }

    match provision(&ns, &ctx).await {
        Ok(applied) => {
            let desc = format!("Successfully provisioned namespace with {} resources", applied);
            info!("{}", desc);
            ctx.events
                .publish(
                    &ns.object_ref(&()),
                    EventType::Normal,
                    reasons::NAMESPACE_PROVISIONED,
                    actions::RECONCILE,
                    Some(desc),
                )
                .await;
            let status = ManagedNamespaceStatus {
                state: Some(State::Ready),
                retry_count: 0,
                error_description: None,
                provisioned: true,
            };
            Ok(update_status(&api, ns.as_ref(), &status, None, ctx.events.as_ref()).await)
        }
        Err(e) => {
            let desc = format!("unable to provision namespace: {}", e);
            warn!("{}", desc);
            ctx.events
                .publish(
                    &ns.object_ref(&()),
                    EventType::Warning,
                    reasons::PROVISIONING_FAILED,
                    actions::RECONCILE,
                    Some(desc.clone()),
                )
                .await;
            let status = ManagedNamespaceStatus {
                state: Some(State::Error),
                retry_count: ns.retry_count() + 1,
                error_description: Some(desc),
                provisioned: ns.is_provisioned(),
            };
            Ok(update_status(&api, ns.as_ref(), &status, Some(ERROR_DELAY), ctx.events.as_ref()).await)
        }
    }
}

/// Render, connect, and apply. Returns the number of applied resources.
async fn provision(ns: &ManagedNamespace, ctx: &Context) -> Result<usize> {
    let mut request = ns.clone();
    if let Some(template_name) = ns.template() {
        let templates: Api<NamespaceTemplate> = Api::all(ctx.client.clone());
        let template = templates.get(template_name).await?;
        resolve(&template, &mut request)?;
    }

    let Some(resources) = request.spec.ns_resources else {
        return Err(FleetError::InvalidRequest(
            "no template and no namespace resources given".to_string(),
        ));
    };
    validate(&resources).map_err(TemplateError::from)?;
    let target = resources.namespace_name().to_string();
    if target.is_empty() {
        return Err(FleetError::InvalidRequest("namespace name is empty".to_string()));
    }

    let clusters: Api<Cluster> = Api::namespaced(ctx.client.clone(), &ctx.manager_namespace);
    let cluster = clusters.get(&sanitize_name(&ns.spec.cluster_name)).await?;
    let client = ctx.connector.connect(&cluster).await?;

    apply_namespace(&client, resources.namespace.clone()).await?;
    debug!("Namespace {} present in cluster {}", target, cluster.name_any());

    let applier = Arc::new(KubeResourceApplier::new(client, target));
    let mut scheduler = WaveScheduler::new(!ns.is_provisioned());
    let result = scheduler.schedule(&resources.resources, applier).await;
    publish_resource_events(ns, ctx, &scheduler, &resources.resources).await;
    result.map_err(FleetError::from)
}

/// One event per resource the scheduling run applied or failed on
async fn publish_resource_events(
    ns: &ManagedNamespace,
    ctx: &Context,
    scheduler: &WaveScheduler,
    resources: &[Resource],
) {
    let object_ref = ns.object_ref(&());
    for status in resources.iter().filter_map(|r| scheduler.status(&r.name)) {
        let (type_, reason, note) = match (&status.error, status.done) {
            (Some(err), _) => (
                EventType::Warning,
                reasons::RESOURCE_FAILED,
                format!("unable to create/update {} {}: {}", status.kind, status.name, err),
            ),
            (None, true) => (
                EventType::Normal,
                reasons::RESOURCE_APPLIED,
                format!("successfully created/updated {} {}", status.kind, status.name),
            ),
            (None, false) => continue,
        };
        ctx.events
            .publish(&object_ref, type_, reason, actions::RECONCILE, Some(note))
            .await;
    }
}
