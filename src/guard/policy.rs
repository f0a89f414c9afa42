use std::sync::Arc;

use super::hierarchy::Hierarchy;
use crate::error::{Error, Result};
use crate::paths;
use crate::store::Store;
use crate::types::{Permission, Principal, Resource, ResourceType, Scope, Space};

/// Decides whether a principal holds a permission on a resource within a scope.
/// Errors are never treated as an answer by callers.
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(
        &self,
        principal: Option<&Principal>,
        scope: &Scope,
        resource: &Resource,
        permission: Permission,
    ) -> Result<bool>;
}

/// Policy backed by space grants in the store. Grants on a space apply to all
/// of its descendants, owners of any space in the chain hold every permission,
/// and a deny anywhere in the chain overrides an allow.
pub struct GrantPolicy {
    store: Arc<dyn Store>,
}

impl GrantPolicy {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn target_is_public(
        &self,
        hierarchy: &Hierarchy<'_, dyn Store>,
        scope_space: &Space,
        resource: &Resource,
    ) -> Result<bool> {
        if resource.name.is_empty() {
            return Ok(resource.resource_type == ResourceType::Space && scope_space.is_public);
        }

        let path = paths::concatenate(&scope_space.path, &resource.name);
        let public = match resource.resource_type {
            ResourceType::Space => hierarchy.space_by_path(&path).map(|s| s.is_public),
            ResourceType::Repo => hierarchy.repo_by_path(&path).map(|r| r.is_public),
        };

        match public {
            Err(Error::NotFound(_)) => Ok(false),
            other => other,
        }
    }
}

impl PolicyEvaluator for GrantPolicy {
    fn evaluate(
        &self,
        principal: Option<&Principal>,
        scope: &Scope,
        resource: &Resource,
        permission: Permission,
    ) -> Result<bool> {
        if scope.is_root() {
            tracing::debug!("No grants exist above the root, denying {permission} on {resource}");
            return Ok(false);
        }

        let hierarchy = Hierarchy::new(self.store.as_ref());
        let space = hierarchy.space_by_path(&scope.space_path)?;

        if permission.is_view() && self.target_is_public(&hierarchy, &space, resource)? {
            return Ok(true);
        }

        let Some(principal) = principal else {
            return Ok(false);
        };

        let chain = hierarchy.ancestors(space)?;

        if chain.iter().any(|s| s.created_by == principal.id) {
            return Ok(true);
        }

        let mut allow = Permission::default();
        let mut deny = Permission::default();

        for space in &chain {
            let grant = self
                .store
                .get_space_grant(&principal.id, space.id)
                .map_err(Error::into_backend)?;

            if let Some(grant) = grant {
                allow = allow.union(grant.allow_bits.expand_implied());
                deny = deny.union(grant.deny_bits);
            }
        }

        Ok(allow.difference(deny).has(permission))
    }
}
