// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespaces on the management cluster

use crate::constants::OPERATOR_NAME;
use crate::error::Result;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client,
};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Create `namespace` unless it already exists. An existing namespace is left untouched.
#[instrument(skip(client))]
pub async fn ensure_namespace(client: &Client, namespace: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                OPERATOR_NAME.to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            info!("Namespace {} created", namespace);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 409 => {
            debug!("Namespace {} already exists", namespace);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
