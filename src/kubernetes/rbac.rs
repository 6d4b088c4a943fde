// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bootstrap RBAC that gives the fleet manager access to a managed cluster.

use crate::constants::rbac::{
    CLUSTER_ROLE, CLUSTER_ROLE_BINDING, SERVICE_ACCOUNT, SYSTEM_NAMESPACE, TOKEN_POLL_INTERVAL_MILLIS,
    TOKEN_SECRET, TOKEN_TIMEOUT_SECS,
};
use crate::constants::OPERATOR_NAME;
use crate::error::{FleetError, Result};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use kube::api::{DeleteParams, ObjectMeta, Patch, PatchParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";
const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";

fn wildcard() -> Option<Vec<String>> {
    Some(vec!["*".to_string()])
}

fn cluster_role() -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(CLUSTER_ROLE.to_string()),
            ..Default::default()
        },
        rules: Some(vec![
            PolicyRule {
                api_groups: wildcard(),
                resources: wildcard(),
                verbs: vec!["*".to_string()],
                ..Default::default()
            },
            PolicyRule {
                non_resource_urls: wildcard(),
                verbs: vec!["*".to_string()],
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

fn cluster_role_binding() -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(CLUSTER_ROLE_BINDING.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: SERVICE_ACCOUNT.to_string(),
            namespace: Some(SYSTEM_NAMESPACE.to_string()),
            ..Default::default()
        }]),
    }
}

fn token_secret() -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(TOKEN_SECRET.to_string()),
            namespace: Some(SYSTEM_NAMESPACE.to_string()),
            annotations: Some(BTreeMap::from([(
                SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
                SERVICE_ACCOUNT.to_string(),
            )])),
            ..Default::default()
        },
        type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
        ..Default::default()
    }
}

/// Create (or converge) the service account, cluster role, binding and token secret
#[instrument(skip(client))]
pub async fn bootstrap_rbac(client: &Client) -> Result<()> {
    let pp = PatchParams::apply(OPERATOR_NAME).force();

    let sa = ServiceAccount {
        metadata: ObjectMeta {
            name: Some(SERVICE_ACCOUNT.to_string()),
            namespace: Some(SYSTEM_NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), SYSTEM_NAMESPACE);
    accounts.patch(SERVICE_ACCOUNT, &pp, &Patch::Apply(&sa)).await?;
    info!("Service account {}/{} applied", SYSTEM_NAMESPACE, SERVICE_ACCOUNT);

    let roles: Api<ClusterRole> = Api::all(client.clone());
    roles.patch(CLUSTER_ROLE, &pp, &Patch::Apply(&cluster_role())).await?;
    info!("Cluster role {} applied", CLUSTER_ROLE);

    let bindings: Api<ClusterRoleBinding> = Api::all(client.clone());
    bindings
        .patch(CLUSTER_ROLE_BINDING, &pp, &Patch::Apply(&cluster_role_binding()))
        .await?;
    info!("Cluster role binding {} applied", CLUSTER_ROLE_BINDING);

    let secrets: Api<Secret> = Api::namespaced(client.clone(), SYSTEM_NAMESPACE);
    secrets.patch(TOKEN_SECRET, &pp, &Patch::Apply(&token_secret())).await?;
    debug!("Token secret {}/{} applied", SYSTEM_NAMESPACE, TOKEN_SECRET);

    Ok(())
}

/// Remove the bootstrap service account from a managed cluster. A missing account is fine.
#[instrument(skip(client))]
pub async fn remove_rbac(client: &Client) -> Result<()> {
    let accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), SYSTEM_NAMESPACE);
    match accounts.delete(SERVICE_ACCOUNT, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Deleted service account {}/{}", SYSTEM_NAMESPACE, SERVICE_ACCOUNT);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            debug!("Service account {}/{} already gone", SYSTEM_NAMESPACE, SERVICE_ACCOUNT);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Wait for the token controller to fill in the bootstrap service account token
pub async fn service_account_token(client: &Client) -> Result<String> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), SYSTEM_NAMESPACE);
    wait_for_token(
        &secrets,
        Duration::from_millis(TOKEN_POLL_INTERVAL_MILLIS),
        Duration::from_secs(TOKEN_TIMEOUT_SECS),
    )
    .await
}

#[instrument(skip(secrets))]
async fn wait_for_token(secrets: &Api<Secret>, interval: Duration, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;

    loop {
        match secrets.get_opt(TOKEN_SECRET).await? {
            Some(secret) => {
                let token = secret
                    .data
                    .as_ref()
                    .and_then(|d| d.get("token"))
                    .filter(|t| !t.0.is_empty());
                if let Some(token) = token {
                    return String::from_utf8(token.0.clone()).map_err(|e| {
                        FleetError::SecretError(format!("Service account token is not valid UTF-8: {}", e))
                    });
                }
                debug!("Token secret {} not populated yet", TOKEN_SECRET);
            }
            None => debug!("Token secret {} does not exist yet", TOKEN_SECRET),
        }

        if Instant::now() + interval > deadline {
            return Err(FleetError::Timeout(format!(
                "service account token {}/{} not available after {:?}",
                SYSTEM_NAMESPACE, TOKEN_SECRET, timeout
            )));
        }
        sleep(interval).await;
    }
}
