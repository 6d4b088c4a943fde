// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to build cluster connection: {0}")]
    ConnectionError(String),

    #[error("Bearer token secret error: {0}")]
    SecretError(String),

    #[error("Template processing failed: {0}")]
    TemplateError(#[from] TemplateError),

    #[error("Resource provisioning failed: {0}")]
    ScheduleError(#[from] ScheduleError),

    #[error("Resource apply failed: {0}")]
    ApplyError(#[from] ApplyError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// Finalizer bookkeeping failed. The object must not be processed further until an operator
    /// has looked at it.
    #[error("Finalizer update failed for {object}: {source}")]
    Finalizer {
        object: String,
        #[source]
        source: kube::Error,
    },
}

impl FleetError {
    /// Whether the error is unrecoverable for the object being reconciled
    pub fn is_fatal(&self) -> bool {
        matches!(self, FleetError::Finalizer { .. })
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;

/// Structural problems in a resource set, detected before anything is applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("resource names must be unique across the template, {0} repeated more than once")]
    DuplicateName(String),

    #[error("resource {resource} depends on {depends_on} which doesn't exist")]
    UnknownDependency { resource: String, depends_on: String },

    #[error("circular dependency detected starting at resource {0}")]
    CircularDependency(String),

    #[error("resource {0} has an unsupported type")]
    UnsupportedKind(String),
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unable to serialize template resources: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("parameter substitution produced an invalid resource set: {0}")]
    Substitution(#[source] serde_json::Error),
}

/// Failure to apply a single resource to the target cluster
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("invalid custom resource manifest: {0}")]
    Manifest(String),

    #[error("resource {0} has an unsupported type")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("unable to apply resource {resource} ({applied} resources applied before aborting): {source}")]
    Apply {
        resource: String,
        applied: usize,
        #[source]
        source: ApplyError,
    },

    #[error("no resource can make progress, still pending: {}", pending.join(", "))]
    Stalled { pending: Vec<String> },

    #[error("worker applying resource {resource} stopped without reporting a result")]
    WorkerLost { resource: String },
}
