// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources owned by the fleet manager.

pub mod application;
pub mod cluster;
pub mod managed_namespace;
pub mod namespace_template;
pub mod resources;
pub mod status;

pub use application::{Application, ApplicationSpec, ApplicationStatus, Environment};
pub use cluster::{Cluster, ClusterSpec, ClusterStatus, ConnectionConfig, TlsClientConfig};
pub use managed_namespace::{ManagedNamespace, ManagedNamespaceSpec, ManagedNamespaceStatus};
pub use namespace_template::{NamespaceTemplate, NamespaceTemplateSpec};
pub use resources::{
    CustomResourceSpec, GroupVersionKind, NamespaceResources, Resource, ResourceKind, ResourceSpec,
};
pub use status::State;
