// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, managed cluster connections, RBAC and status bookkeeping.

pub mod client;
pub mod crd;
pub mod namespaces;
pub mod rbac;
pub mod status;

pub use client::{Connector, KubeConnector};
pub use crd::wait_for_crds;
pub use namespaces::ensure_namespace;
pub use status::{has_finalizer, update_finalizer, update_status, FinalizerOp};
