// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::naming::token_secret_key;
use crate::types::status::State;
use k8s_openapi::ByteString;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote cluster registered with the fleet manager
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "fleet.geeko.me", version = "v1alpha1", kind = "Cluster")]
#[kube(namespaced)]
#[kube(status = "ClusterStatus")]
#[kube(shortname = "cl")]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[kube(printcolumn = r#"{"name":"RetryCount","type":"integer","jsonPath":".status.retryCount"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster name as supplied at registration
    pub name: String,
    /// Installation type, e.g. AWS or GCP
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<String>,
    #[serde(default)]
    pub config: ConnectionConfig,
}

/// How to reach the API server of the cluster
#[derive(Serialize, Deserialize, Clone, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// host, host:port or URL of the API server
    pub host: String,
    /// Secret (in the namespace of the Cluster) holding the bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token_secret: Option<String>,
    #[serde(default)]
    pub tls_client_config: TlsClientConfig,
}

#[derive(Serialize, Deserialize, Clone, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsClientConfig {
    #[serde(rename = "inSecure", default)]
    pub insecure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub cert_data: Option<ByteString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub key_data: Option<ByteString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub ca_data: Option<ByteString>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("bearer_token_secret", &self.bearer_token_secret)
            .field("tls_client_config", &self.tls_client_config)
            .finish()
    }
}

// Key material never ends up in logs.
impl fmt::Debug for TlsClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsClientConfig")
            .field("insecure", &self.insecure)
            .field("server_name", &self.server_name)
            .field("cert_data", &self.cert_data.as_ref().map(|_| "--- TRUNCATED ---"))
            .field("key_data", &self.key_data.as_ref().map(|_| "--- REDACTED ---"))
            .field("ca_data", &self.ca_data.as_ref().map(|_| "--- TRUNCATED ---"))
            .finish()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl Cluster {
    /// Consecutive failed validations so far
    pub fn retry_count(&self) -> u32 {
        self.status.as_ref().map(|s| s.retry_count).unwrap_or(0)
    }

    /// Name of the secret holding the bearer token
    pub fn token_secret_name(&self) -> Option<&str> {
        self.spec.config.bearer_token_secret.as_deref()
    }

    /// Key of the bearer token inside the token secret
    pub fn token_secret_key(&self) -> String {
        token_secret_key(&self.name_any())
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn make_cluster(name: &str, status: Option<ClusterStatus>) -> Cluster {
        Cluster {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("manager-system".to_string()),
                ..Default::default()
            },
            spec: ClusterSpec {
                name: name.to_string(),
                cloud: Some("AWS".to_string()),
                config: ConnectionConfig {
                    host: "https://api.east.example.com".to_string(),
                    bearer_token_secret: Some(format!("{}-secrets", name)),
                    tls_client_config: TlsClientConfig::default(),
                },
            },
            status,
        }
    }

    #[test]
    fn test_retry_count_defaults_to_zero() {
        let cluster = make_cluster("east", None);
        assert_eq!(cluster.retry_count(), 0);
    }

    #[test]
    fn test_retry_count_from_status() {
        let cluster = make_cluster(
            "east",
            Some(ClusterStatus {
                state: Some(State::Warning),
                retry_count: 2,
                error_description: Some("unreachable".to_string()),
            }),
        );
        assert_eq!(cluster.retry_count(), 2);
    }

    #[test]
    fn test_token_secret_reference() {
        let cluster = make_cluster("east", None);
        assert_eq!(cluster.token_secret_name(), Some("east-secrets"));
        assert_eq!(cluster.token_secret_key(), "east_config");
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let mut cluster = make_cluster("east", None);
        cluster.spec.config.tls_client_config.key_data =
            Some(ByteString(b"very-secret-key".to_vec()));

        let printed = format!("{:?}", cluster.spec.config);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("118, 101, 114, 121"));
    }

    #[test]
    fn test_spec_serializes_with_wire_names() {
        let cluster = make_cluster("east", None);
        let value = serde_json::to_value(&cluster.spec).unwrap();

        assert_eq!(value["type"], "AWS");
        assert_eq!(value["config"]["bearerTokenSecret"], "east-secrets");
        assert_eq!(value["config"]["tlsClientConfig"]["inSecure"], false);
    }

    fn find_property<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map
                .get("properties")
                .and_then(|p| p.get(key))
                .or_else(|| map.values().find_map(|v| find_property(v, key))),
            serde_json::Value::Array(items) => items.iter().find_map(|v| find_property(v, key)),
            _ => None,
        }
    }

    #[test]
    fn test_crd_schema_types_key_material_as_strings() {
        use kube::CustomResourceExt;

        let crd = serde_json::to_value(Cluster::crd()).unwrap();

        for field in ["caData", "certData", "keyData"] {
            let schema = find_property(&crd, field).unwrap();
            assert_eq!(schema["type"], "string", "{} should be a string", field);
        }
    }
}
