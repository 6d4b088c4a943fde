// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Naming rules for objects derived from user supplied cluster names.

/// Sanitize a user supplied name so it can be used as a Kubernetes object name.
///
/// Dots are replaced by dashes. Every name that crosses into the cluster API must go through here.
pub fn sanitize_name(name: &str) -> String {
    name.replace('.', "-")
}

/// Name of the secret holding the bearer token of a registered cluster
pub fn token_secret_name(cluster_name: &str) -> String {
    format!("{}-secrets", sanitize_name(cluster_name))
}

/// Key inside the token secret under which the bearer token is stored
pub fn token_secret_key(cluster_name: &str) -> String {
    format!("{}_config", sanitize_name(cluster_name))
}
