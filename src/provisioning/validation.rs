// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Structural validation of resource sets: unique names, known dependencies, no cycles.

use crate::error::ValidationError;
use crate::types::{NamespaceResources, Resource, ResourceKind};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error};

/// Validate a resource set including the name of the namespace it is provisioned into
pub fn validate(resources: &NamespaceResources) -> Result<(), ValidationError> {
    validate_resources(&resources.resources, resources.namespace_name())
}

/// Validate resources that will be created in `namespace_name`.
///
/// Checks run in a fixed order and the first failure is returned: duplicate names over the whole
/// set, then per resource dependency existence and cycle freedom, then supported kinds.
pub fn validate_resources(
    resources: &[Resource],
    namespace_name: &str,
) -> Result<(), ValidationError> {
    let result = check(resources, namespace_name);
    if let Err(e) = &result {
        error!("Resource set validation failed: {}", e);
    }
    result
}

fn check(resources: &[Resource], namespace_name: &str) -> Result<(), ValidationError> {
    let mut depends: HashMap<&str, Option<&str>> = HashMap::with_capacity(resources.len());
    for res in resources {
        if depends.insert(res.name.as_str(), res.dependency()).is_some() {
            return Err(ValidationError::DuplicateName(res.name.clone()));
        }
    }

    if depends.contains_key(namespace_name) {
        return Err(ValidationError::DuplicateName(namespace_name.to_string()));
    }

    for res in resources {
        let Some(dependency) = res.dependency() else {
            continue;
        };
        if !depends.contains_key(dependency) {
            return Err(ValidationError::UnknownDependency {
                resource: res.name.clone(),
                depends_on: dependency.to_string(),
            });
        }
        check_chain(&res.name, &depends)?;
    }

    if let Some(res) = resources
        .iter()
        .find(|r| r.kind() == ResourceKind::Unsupported)
    {
        return Err(ValidationError::UnsupportedKind(res.name.clone()));
    }

    debug!("Validated {} resources", resources.len());
    Ok(())
}

/// Walk the dependsOn chain from `start`. Reaching the bound without running out of
/// dependencies means the chain loops.
fn check_chain(start: &str, depends: &HashMap<&str, Option<&str>>) -> Result<(), ValidationError> {
    let mut visited = HashSet::new();
    let mut current = start;

    for _ in 0..=depends.len() {
        if !visited.insert(current) {
            return Err(ValidationError::CircularDependency(start.to_string()));
        }
        match depends.get(current) {
            Some(Some(next)) => current = *next,
            Some(None) => return Ok(()),
            None => {
                return Err(ValidationError::UnknownDependency {
                    resource: start.to_string(),
                    depends_on: current.to_string(),
                })
            }
        }
    }

    Err(ValidationError::CircularDependency(start.to_string()))
}
