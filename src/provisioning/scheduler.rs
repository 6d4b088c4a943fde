// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Wave scheduler: applies a validated resource set in dependency order.
//!
//! Every wave dispatches all resources whose dependency is satisfied as concurrent tasks and
//! waits for all of them to report back before the next wave is computed. Workers report over a
//! channel and only the scheduler itself touches the status table. The first failed resource
//! stops the run once its wave has drained.

use crate::error::{ApplyError, ScheduleError};
use crate::types::{Resource, ResourceKind};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Applies a single resource to its target
#[async_trait]
pub trait ResourceApplier: Send + Sync {
    async fn apply(&self, resource: &Resource) -> Result<(), ApplyError>;
}

/// Progress of one resource within a scheduling run
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceStatus {
    pub name: String,
    pub kind: ResourceKind,
    pub depends_on: Option<String>,
    pub done: bool,
    pub error: Option<String>,
}

/// State of a single scheduling run. Nothing carries over between runs.
pub struct WaveScheduler {
    first_time: bool,
    statuses: HashMap<String, ResourceStatus>,
    waves: usize,
}

impl WaveScheduler {
    /// `first_time` enables resources flagged `createOnly`
    pub fn new(first_time: bool) -> Self {
        Self {
            first_time,
            statuses: HashMap::new(),
            waves: 0,
        }
    }

    pub fn status(&self, name: &str) -> Option<&ResourceStatus> {
        self.statuses.get(name)
    }

    /// Number of waves dispatched so far
    pub fn waves(&self) -> usize {
        self.waves
    }

    fn applied(&self) -> usize {
        self.statuses.values().filter(|s| s.done).count()
    }

    /// Decide whether `resource` takes part in the next wave.
    ///
    /// The first time a resource is seen its status entry is created; it is eligible right away
    /// only when it has no dependency. Resources with a dependency become eligible in a later
    /// wave once the dependency is done. Done and failed resources are never eligible again.
    pub fn should_proceed(&mut self, resource: &Resource) -> bool {
        if resource.create_only && !self.first_time {
            debug!(resource = %resource.name, "Skipping create-only resource");
            return false;
        }

        if let Some(status) = self.statuses.get(&resource.name) {
            if status.done || status.error.is_some() {
                return false;
            }
            if let Some(dependency) = status.depends_on.as_deref() {
                let ready = self.statuses.get(dependency).is_some_and(|s| s.done);
                debug!(resource = %resource.name, dependency, ready, "Checked dependency");
                return ready;
            }
        }

        self.statuses.insert(
            resource.name.clone(),
            ResourceStatus {
                name: resource.name.clone(),
                kind: resource.kind(),
                depends_on: resource.dependency().map(str::to_string),
                done: false,
                error: None,
            },
        );
        resource.dependency().is_none()
    }

    /// Apply `resources` wave by wave. Returns the number of applied resources.
    pub async fn schedule(
        &mut self,
        resources: &[Resource],
        applier: Arc<dyn ResourceApplier>,
    ) -> Result<usize, ScheduleError> {
        loop {
            let applied = self.applied();
            if applied == resources.len() {
                info!("All {} resources applied in {} waves", applied, self.waves);
                return Ok(applied);
            }

            let wave: Vec<Resource> = resources
                .iter()
                .filter(|r| self.should_proceed(r))
                .cloned()
                .collect();
            if wave.is_empty() {
                return self.finish_idle(resources);
            }

            self.waves += 1;
            info!(
                wave = self.waves,
                "Dispatching {} resources: {}",
                wave.len(),
                wave.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ")
            );
            self.run_wave(wave, &applier).await?;
        }
    }

    async fn run_wave(
        &mut self,
        wave: Vec<Resource>,
        applier: &Arc<dyn ResourceApplier>,
    ) -> Result<(), ScheduleError> {
        let mut outstanding: HashSet<String> = wave.iter().map(|r| r.name.clone()).collect();
        let (tx, mut rx) = mpsc::channel(wave.len());

        for resource in wave {
            let tx = tx.clone();
            let applier = Arc::clone(applier);
            tokio::spawn(async move {
                let result = applier.apply(&resource).await;
                if tx.send((resource.name, result)).await.is_err() {
                    warn!("Scheduler went away before the result could be reported");
                }
            });
        }
        drop(tx);

        let mut failure: Option<(String, ApplyError)> = None;
        while let Some((name, result)) = rx.recv().await {
            outstanding.remove(&name);
            let Some(status) = self.statuses.get_mut(&name) else {
                continue;
            };
            match result {
                Ok(()) => {
                    debug!(resource = %name, kind = %status.kind, "Resource applied");
                    status.done = true;
                }
                Err(e) => {
                    error!(resource = %name, kind = %status.kind, "Unable to apply resource: {}", e);
                    status.error = Some(e.to_string());
                    if failure.is_none() {
                        failure = Some((name, e));
                    }
                }
            }
        }

        if let Some((resource, source)) = failure {
            return Err(ScheduleError::Apply {
                resource,
                applied: self.applied(),
                source,
            });
        }
        if let Some(resource) = outstanding.into_iter().next() {
            return Err(ScheduleError::WorkerLost { resource });
        }
        Ok(())
    }

    /// Nothing is eligible but not everything is done. That is fine when every pending resource
    /// is a skipped create-only resource or (transitively) depends on one.
    fn finish_idle(&self, resources: &[Resource]) -> Result<usize, ScheduleError> {
        let by_name: HashMap<&str, &Resource> =
            resources.iter().map(|r| (r.name.as_str(), r)).collect();

        let pending: Vec<String> = resources
            .iter()
            .filter(|r| !self.statuses.get(&r.name).is_some_and(|s| s.done))
            .filter(|r| !self.is_skipped(r, &by_name))
            .map(|r| r.name.clone())
            .collect();

        if pending.is_empty() {
            let applied = self.applied();
            info!(
                "Applied {} resources in {} waves, {} create-only resources skipped",
                applied,
                self.waves,
                resources.len() - applied
            );
            Ok(applied)
        } else {
            error!("Scheduling stalled with pending resources {:?}", pending);
            Err(ScheduleError::Stalled { pending })
        }
    }

    fn is_skipped(&self, resource: &Resource, by_name: &HashMap<&str, &Resource>) -> bool {
        if self.first_time {
            return false;
        }
        let mut current = resource;
        for _ in 0..=by_name.len() {
            if current.create_only {
                return true;
            }
            match current.dependency().and_then(|d| by_name.get(d)) {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }
}
