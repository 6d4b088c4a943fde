// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Application reconciler: keeps one ManagedNamespace per environment of an Application.

use crate::constants::finalizers::APPLICATION as FINALIZER;
use crate::constants::requeue::ERROR_DELAY;
use crate::constants::OPERATOR_NAME;
use crate::error::{FleetError, Result};
use crate::events::{actions, reasons};
use crate::kubernetes::{ensure_namespace, has_finalizer, update_finalizer, update_status, FinalizerOp};
use crate::reconcilers::{error_policy, reconcile_trigger, Context};
use crate::types::{Application, ApplicationStatus, ManagedNamespace, State};
use futures::StreamExt;
use kube::{
    api::{Patch, PatchParams},
    runtime::{controller::Action, events::EventType, reflector, watcher, Controller, WatchStreamExt},
    Api, Resource, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ApplicationReconciler {
    ctx: Arc<Context>,
}

impl ApplicationReconciler {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let applications: Api<Application> = Api::all(self.ctx.client.clone());
        let (reader, writer) = reflector::store();
        let stream = watcher(applications, watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .applied_objects()
            .predicate_filter(reconcile_trigger::<Application>);

        Controller::for_stream(stream, reader)
            .run(reconcile, error_policy::<Application>, self.ctx)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled application: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

#[instrument(skip(app, ctx), fields(application = %app.name_any()))]
async fn reconcile(app: Arc<Application>, ctx: Arc<Context>) -> Result<Action> {
    let api: Api<Application> = Api::all(ctx.client.clone());

    // Owned ManagedNamespaces are garbage collected through their owner reference
    if app.is_being_deleted() {
        if has_finalizer(app.as_ref(), FINALIZER) {
            update_finalizer(&api, app.as_ref(), FINALIZER, FinalizerOp::Remove).await?;
            ctx.events
                .publish(
                    &app.object_ref(&()),
                    EventType::Normal,
                    reasons::APPLICATION_DELETED,
                    actions::DELETE,
                    Some("Successfully deleted application".to_string()),
                )
                .await;
            info!("Successfully deleted application");
        }
        return Ok(Action::await_change());
    }

    if !has_finalizer(app.as_ref(), FINALIZER) {
        info!("New application resource, adding finalizer {}", FINALIZER);
        update_finalizer(&api, app.as_ref(), FINALIZER, FinalizerOp::Add).await?;
    }

    match apply_namespaces(&app, &ctx).await {
        Ok(count) => {
            info!("Application {} has {} managed namespaces", app.spec.app_name, count);
            ctx.events
                .publish(
                    &app.object_ref(&()),
                    EventType::Normal,
                    reasons::APPLICATION_READY,
                    actions::RECONCILE,
                    Some("Successfully created/updated application".to_string()),
                )
                .await;
            let status = ApplicationStatus {
                state: Some(State::Ready),
                retry_count: 0,
                error_description: None,
            };
            Ok(update_status(&api, app.as_ref(), &status, None, ctx.events.as_ref()).await)
        }
        Err(e) => {
            let desc = format!("unable to create managed namespace: {}", e);
            warn!("{}", desc);
            ctx.events
                .publish(
                    &app.object_ref(&()),
                    EventType::Warning,
                    reasons::APPLICATION_FAILED,
                    actions::RECONCILE,
                    Some(desc.clone()),
                )
                .await;
            let status = ApplicationStatus {
                state: Some(State::Error),
                retry_count: app.retry_count() + 1,
                error_description: Some(desc),
            };
            Ok(update_status(&api, app.as_ref(), &status, Some(ERROR_DELAY), ctx.events.as_ref()).await)
        }
    }
}

/// Server-side apply the ManagedNamespace of every environment
async fn apply_namespaces(app: &Application, ctx: &Context) -> Result<usize> {
    let namespaces = app.managed_namespaces().ok_or_else(|| {
        FleetError::InvalidRequest(format!(
            "application {} has no uid to own its namespaces",
            app.name_any()
        ))
    })?;

    let pp = PatchParams::apply(OPERATOR_NAME).force();
    for mns in &namespaces {
        let namespace = mns.namespace().unwrap_or_default();
        let name = mns.name_any();
        ensure_namespace(&ctx.client, &namespace).await?;

        let api: Api<ManagedNamespace> = Api::namespaced(ctx.client.clone(), &namespace);
        api.patch(&name, &pp, &Patch::Apply(mns)).await?;
        info!("Applied managed namespace {}/{}", namespace, name);
    }
    Ok(namespaces.len())
}
