// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace provisioning engine: validate, render templates, and apply resources in waves.

pub mod applier;
pub mod scheduler;
pub mod template;
pub mod validation;

pub use applier::{apply_namespace, KubeResourceApplier};
pub use scheduler::{ResourceApplier, ResourceStatus, WaveScheduler};
pub use template::resolve;
pub use validation::{validate, validate_resources};
