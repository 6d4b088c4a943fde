// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Applies single resources to a managed cluster as idempotent upserts.

use crate::error::ApplyError;
use crate::provisioning::scheduler::ResourceApplier;
use crate::types::{CustomResourceSpec, Resource, ResourceSpec};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::NamespaceResourceScope;
use kube::api::PostParams;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta};
use kube::{Api, Client, Resource as KubeResource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info, instrument};

/// Applies resources into one namespace of a managed cluster
#[derive(Clone)]
pub struct KubeResourceApplier {
    client: Client,
    namespace: String,
}

impl KubeResourceApplier {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn namespaced<K>(&self) -> Api<K>
    where
        K: KubeResource<Scope = NamespaceResourceScope>,
        <K as KubeResource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Stamp the target namespace and fall back to the resource name for unnamed objects
    fn prepare<K: KubeResource>(&self, object: &mut K, name: &str) {
        let meta = object.meta_mut();
        meta.namespace = Some(self.namespace.clone());
        if meta.name.as_deref().map_or(true, str::is_empty) {
            meta.name = Some(name.to_string());
        }
    }

    /// Service accounts are only created; an existing one is left as it is
    async fn apply_service_account(
        &self,
        mut sa: ServiceAccount,
        name: &str,
    ) -> Result<(), ApplyError> {
        self.prepare(&mut sa, name);
        let api: Api<ServiceAccount> = self.namespaced();
        match api.create(&PostParams::default(), &sa).await {
            Ok(_) => {
                info!("Created service account {}", sa.name_any());
                Ok(())
            }
            Err(kube::Error::Api(err)) if err.code == 409 => {
                debug!("Service account {} already exists", sa.name_any());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_custom_resource(
        &self,
        spec: &CustomResourceSpec,
        name: &str,
    ) -> Result<(), ApplyError> {
        let gvk = GroupVersionKind::gvk(&spec.gvk.group, &spec.gvk.version, &spec.gvk.kind);
        let ar = ApiResource::from_gvk(&gvk);

        // serde_yaml also accepts JSON documents
        let mut object: DynamicObject = serde_yaml::from_str(&spec.manifest)
            .map_err(|e| ApplyError::Manifest(format!("{}: {}", name, e)))?;
        object.types = Some(TypeMeta {
            api_version: ar.api_version.clone(),
            kind: ar.kind.clone(),
        });
        self.prepare(&mut object, name);

        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, &ar);
        create_or_replace(&api, object).await
    }
}

#[async_trait]
impl ResourceApplier for KubeResourceApplier {
    #[instrument(skip(self, resource), fields(resource = %resource.name, kind = %resource.kind(), namespace = %self.namespace))]
    async fn apply(&self, resource: &Resource) -> Result<(), ApplyError> {
        let name = resource.name.as_str();
        match &resource.spec {
            ResourceSpec::ServiceAccount { service_account } => {
                self.apply_service_account(service_account.clone(), name)
                    .await
            }
            ResourceSpec::Role { role } => {
                let mut role = role.clone();
                self.prepare(&mut role, name);
                create_or_replace(&self.namespaced(), role).await
            }
            ResourceSpec::RoleBinding { role_binding } => {
                let mut binding = role_binding.clone();
                self.prepare(&mut binding, name);
                create_or_replace(&self.namespaced(), binding).await
            }
            ResourceSpec::ResourceQuota { resource_quota } => {
                let mut quota = resource_quota.clone();
                self.prepare(&mut quota, name);
                create_or_replace(&self.namespaced(), quota).await
            }
            ResourceSpec::CustomResource { custom_resource } => {
                self.apply_custom_resource(custom_resource, name).await
            }
            ResourceSpec::Namespace { namespace } => {
                let mut namespace = namespace.clone();
                if namespace.metadata.name.as_deref().map_or(true, str::is_empty) {
                    namespace.metadata.name = Some(name.to_string());
                }
                apply_namespace(&self.client, namespace).await
            }
            ResourceSpec::Unsupported => Err(ApplyError::Unsupported(name.to_string())),
        }
    }
}

/// Create or update a namespace object in the managed cluster
pub async fn apply_namespace(client: &Client, namespace: Namespace) -> Result<(), ApplyError> {
    let api: Api<Namespace> = Api::all(client.clone());
    create_or_replace(&api, namespace).await
}

/// Create `object`; when it already exists, replace it carrying over the current resource version
async fn create_or_replace<K>(api: &Api<K>, mut object: K) -> Result<(), ApplyError>
where
    K: KubeResource + Clone + Debug + Serialize + DeserializeOwned,
{
    let name = object.name_any();
    match api.create(&PostParams::default(), &object).await {
        Ok(_) => {
            info!("Created {}", name);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 409 => {
            debug!("{} already exists, updating", name);
            let existing = api.get(&name).await?;
            object.meta_mut().resource_version = existing.resource_version();
            api.replace(&name, &PostParams::default(), &object).await?;
            info!("Updated {}", name);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
