// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolution of NamespaceTemplates into the resource set of a ManagedNamespace.

use crate::error::TemplateError;
use crate::provisioning::validation::validate;
use crate::types::{ManagedNamespace, NamespaceResources, NamespaceTemplate};
use kube::ResourceExt;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

/// Merge `template` into `request` after substituting the request parameters.
///
/// Does nothing when the request names no template. The template is validated before
/// substitution and the merged result is validated again afterwards.
#[instrument(skip(template, request), fields(template = %template.name_any(), request = %request.name_any()))]
pub fn resolve(
    template: &NamespaceTemplate,
    request: &mut ManagedNamespace,
) -> Result<(), TemplateError> {
    if request.template().is_none() {
        debug!("No template requested");
        return Ok(());
    }

    validate(&template.spec.ns_resources)?;

    let text =
        serde_json::to_string(&template.spec.ns_resources).map_err(TemplateError::Serialize)?;
    debug!(
        "Substituting {} exported params",
        template.spec.exported_param_name.len()
    );
    let substituted = substitute(
        &text,
        &template.spec.exported_param_name,
        &request.spec.params,
    );
    let rendered: NamespaceResources =
        serde_json::from_str(&substituted).map_err(TemplateError::Substitution)?;

    let merged = match request.spec.ns_resources.take() {
        None => rendered,
        Some(own) => merge(own, rendered),
    };
    validate(&merged)?;

    info!(
        "Resolved template into {} resources for namespace {}",
        merged.resources.len(),
        merged.namespace_name()
    );
    request.spec.ns_resources = Some(merged);
    Ok(())
}

/// Replace every `${name}` whose name is exported with the matching parameter value, or with an
/// empty string when the request has no such parameter.
///
/// This is a single left-to-right pass: text inserted for a placeholder is never scanned again,
/// and placeholders for names that are not exported stay as they are.
pub fn substitute(text: &str, exported: &[String], params: &BTreeMap<String, String>) -> String {
    let exported: HashSet<&str> = exported.iter().map(String::as_str).collect();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if exported.contains(&after[..end]) => {
                let value = params.get(&after[..end]).map(String::as_str);
                out.push_str(value.unwrap_or_default());
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resources of the request come first; template resources are appended unless the request
/// already defines a resource with the same name.
fn merge(own: NamespaceResources, rendered: NamespaceResources) -> NamespaceResources {
    let names: HashSet<String> = own.resources.iter().map(|r| r.name.clone()).collect();
    let mut merged = own;
    merged.resources.extend(
        rendered
            .resources
            .into_iter()
            .filter(|r| !names.contains(&r.name)),
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::types::{ManagedNamespaceSpec, NamespaceTemplateSpec, ResourceSpec};
    use kube::api::ObjectMeta;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn make_template(exported: &[&str], ns_resources: serde_json::Value) -> NamespaceTemplate {
        NamespaceTemplate {
            metadata: ObjectMeta {
                name: Some("base".to_string()),
                ..Default::default()
            },
            spec: NamespaceTemplateSpec {
                exported_param_name: exported.iter().map(|s| s.to_string()).collect(),
                ns_resources: serde_json::from_value(ns_resources).unwrap(),
            },
        }
    }

    fn make_request(
        template: Option<&str>,
        params: BTreeMap<String, String>,
        own: Option<serde_json::Value>,
    ) -> ManagedNamespace {
        ManagedNamespace {
            metadata: ObjectMeta {
                name: Some("team-a-dev".to_string()),
                namespace: Some("manager-system".to_string()),
                ..Default::default()
            },
            spec: ManagedNamespaceSpec {
                cluster_name: "east".to_string(),
                template_name: template.map(str::to_string),
                params,
                ns_resources: own.map(|v| serde_json::from_value(v).unwrap()),
            },
            status: None,
        }
    }

    fn standard_template() -> NamespaceTemplate {
        make_template(
            &["env", "team"],
            json!({
                "namespace": {"metadata": {"name": "${team}-${env}"}},
                "resources": [
                    {"name": "sa", "type": "ServiceAccount",
                     "serviceAccount": {"metadata": {"name": "${team}-sa"}}},
                    {"name": "binding", "dependsOn": "sa", "type": "RoleBinding",
                     "roleBinding": {
                        "metadata": {"name": "${team}-binding"},
                        "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": "edit"},
                        "subjects": [{"kind": "ServiceAccount", "name": "${team}-sa"}]
                     }}
                ]
            }),
        )
    }

    #[test]
    fn test_substitute_replaces_every_occurrence() {
        let out = substitute(
            "${env}/${env}/${team}",
            &["env".to_string(), "team".to_string()],
            &params(&[("env", "preprod"), ("team", "core")]),
        );
        assert_eq!(out, "preprod/preprod/core");
    }

    #[test]
    fn test_substitute_missing_param_becomes_empty() {
        let out = substitute("ns-${env}", &["env".to_string()], &params(&[]));
        assert_eq!(out, "ns-");
    }

    #[test]
    fn test_substitute_is_not_recursive() {
        let out = substitute(
            "${a}-${b}",
            &["a".to_string(), "b".to_string()],
            &params(&[("a", "${b}"), ("b", "${a}")]),
        );
        assert_eq!(out, "${b}-${a}");
    }

    #[test]
    fn test_substitute_leaves_unexported_placeholders() {
        let out = substitute(
            "${env}-${secret}-${",
            &["env".to_string()],
            &params(&[("env", "dev"), ("secret", "nope")]),
        );
        assert_eq!(out, "dev-${secret}-${");
    }

    #[test]
    fn test_resolve_without_template_is_noop() {
        let template = standard_template();
        let mut request = make_request(None, params(&[("env", "dev")]), None);

        resolve(&template, &mut request).unwrap();

        assert!(request.spec.ns_resources.is_none());
    }

    #[test]
    fn test_resolve_renders_template_into_request() {
        let template = standard_template();
        let mut request = make_request(
            Some("base"),
            params(&[("env", "preprod"), ("team", "core")]),
            None,
        );

        resolve(&template, &mut request).unwrap();

        let resources = request.spec.ns_resources.unwrap();
        assert_eq!(resources.namespace_name(), "core-preprod");
        assert_eq!(resources.resources.len(), 2);
        match &resources.resources[0].spec {
            ResourceSpec::ServiceAccount { service_account } => {
                assert_eq!(service_account.metadata.name.as_deref(), Some("core-sa"))
            }
            other => panic!("unexpected spec {:?}", other),
        }
        // the template itself is left untouched
        assert_eq!(
            template.spec.ns_resources.namespace_name(),
            "${team}-${env}"
        );
    }

    #[test]
    fn test_resolve_keeps_nested_placeholder_literal() {
        let template = standard_template();
        let mut request = make_request(
            Some("base"),
            params(&[("env", "${team}"), ("team", "core")]),
            None,
        );

        resolve(&template, &mut request).unwrap();

        let resources = request.spec.ns_resources.unwrap();
        assert_eq!(resources.namespace_name(), "core-${team}");
    }

    #[test]
    fn test_resolve_rejects_invalid_template() {
        let template = make_template(
            &[],
            json!({
                "namespace": {"metadata": {"name": "ns"}},
                "resources": [
                    {"name": "x", "dependsOn": "y", "type": "ServiceAccount",
                     "serviceAccount": {"metadata": {"name": "x"}}},
                    {"name": "y", "dependsOn": "x", "type": "ServiceAccount",
                     "serviceAccount": {"metadata": {"name": "y"}}}
                ]
            }),
        );
        let mut request = make_request(Some("base"), params(&[]), None);

        let err = resolve(&template, &mut request).unwrap_err();

        assert!(matches!(
            err,
            TemplateError::Validation(ValidationError::CircularDependency(_))
        ));
        assert!(request.spec.ns_resources.is_none());
    }

    #[test]
    fn test_resolve_reports_broken_substitution() {
        let template = standard_template();
        let mut request = make_request(
            Some("base"),
            params(&[("env", "dev\"}"), ("team", "core")]),
            None,
        );

        let err = resolve(&template, &mut request).unwrap_err();

        assert!(matches!(err, TemplateError::Substitution(_)));
    }

    #[test]
    fn test_resolve_detects_clash_created_by_substitution() {
        // the namespace renders to the same name as one of the resources
        let template = make_template(
            &["env"],
            json!({
                "namespace": {"metadata": {"name": "${env}"}},
                "resources": [
                    {"name": "sa", "type": "ServiceAccount",
                     "serviceAccount": {"metadata": {"name": "sa"}}}
                ]
            }),
        );
        let mut request = make_request(Some("base"), params(&[("env", "sa")]), None);

        let err = resolve(&template, &mut request).unwrap_err();

        assert!(matches!(
            err,
            TemplateError::Validation(ValidationError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_resolve_merges_into_existing_resources() {
        let template = standard_template();
        let mut request = make_request(
            Some("base"),
            params(&[("env", "dev"), ("team", "core")]),
            Some(json!({
                "namespace": {"metadata": {"name": "custom-ns"}},
                "resources": [
                    {"name": "sa", "type": "ServiceAccount",
                     "serviceAccount": {"metadata": {"name": "own-sa"}}},
                    {"name": "quota", "type": "ResourceQuota",
                     "resourceQuota": {"metadata": {"name": "quota"}}}
                ]
            })),
        );

        resolve(&template, &mut request).unwrap();

        let resources = request.spec.ns_resources.unwrap();
        assert_eq!(resources.namespace_name(), "custom-ns");
        let names: Vec<&str> = resources.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["sa", "quota", "binding"]);
        match &resources.resources[0].spec {
            ResourceSpec::ServiceAccount { service_account } => {
                assert_eq!(service_account.metadata.name.as_deref(), Some("own-sa"))
            }
            other => panic!("unexpected spec {:?}", other),
        }
    }
}
