// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster registration: stores bearer tokens and Cluster objects, served over HTTP/JSON.

pub mod server;
pub mod service;

pub use server::serve;
pub use service::{ClusterRegistration, RegistrationConfig, Registrar};
