// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group served by the fleet manager CRDs
pub const API_GROUP: &str = "fleet.geeko.me";
/// API version of the fleet manager CRDs
pub const API_VERSION: &str = "v1alpha1";

/// The operator name used for server-side apply and as event reporter
pub const OPERATOR_NAME: &str = "fleet-manager";

/// Finalizer names
pub mod finalizers {
    pub const CLUSTER: &str = "cluster.finalizers.fleet.geeko.me";
    pub const NAMESPACE: &str = "namespace.finalizers.fleet.geeko.me";
    pub const APPLICATION: &str = "application.finalizers.fleet.geeko.me";
}

/// Requeue and retry policy shared by the reconcilers
pub mod requeue {
    use std::time::Duration;

    /// Delay before retrying a failed reconciliation
    pub const ERROR_DELAY: Duration = Duration::from_secs(30);
    /// Delay used when persisting status itself failed
    pub const STATUS_UPDATE_FAILED_DELAY: Duration = Duration::from_secs(30);
    /// Consecutive failures tolerated before a cluster is reported as Error instead of Warning
    pub const WARNING_THRESHOLD: u32 = 3;
    /// Default interval between successful cluster validations
    pub const DEFAULT_VALIDATION_FREQUENCY_SECS: u64 = 1800;
}

/// Bootstrap RBAC objects created in every managed cluster
pub mod rbac {
    pub const SYSTEM_NAMESPACE: &str = "kube-system";
    pub const SERVICE_ACCOUNT: &str = "fleet-manager-sa";
    pub const CLUSTER_ROLE: &str = "fleet-manager-cluster-role";
    pub const CLUSTER_ROLE_BINDING: &str = "fleet-manager-cluster-role-binding";
    /// Secret holding the long-lived token of the bootstrap service account
    pub const TOKEN_SECRET: &str = "fleet-manager-sa-token";

    /// Polling interval while waiting for the token controller
    pub const TOKEN_POLL_INTERVAL_MILLIS: u64 = 500;
    /// Give up waiting for the token after this many seconds
    pub const TOKEN_TIMEOUT_SECS: u64 = 300;
}

/// Properties read from the manager ConfigMap
pub mod properties {
    pub const CLUSTER_VALIDATION_FREQUENCY: &str = "cluster.validation.frequency";
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
