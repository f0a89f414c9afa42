//! Authorization guard for every mutation of the space hierarchy.
//!
//! `Guard::enforce` is the single decision point. It returns `Ok(())` only
//! when the policy explicitly allows the request; every error, including a
//! failing or unreachable policy backend, denies.

pub mod hierarchy;
pub mod policy;

use std::sync::Arc;

use tracing::{debug, warn};

pub use hierarchy::{EntityLookup, Hierarchy, MAX_SPACE_DEPTH};
pub use policy::{GrantPolicy, PolicyEvaluator};

use crate::error::{Error, Result};
use crate::types::{Actor, Permission, Principal, Resource, Scope};

#[derive(Clone)]
pub struct Guard {
    policy: Arc<dyn PolicyEvaluator>,
}

impl Guard {
    pub fn new(policy: Arc<dyn PolicyEvaluator>) -> Self {
        Self { policy }
    }

    /// Allows the request or returns the reason it is denied:
    /// `AuthenticationRequired` for anonymous actors, `PermissionDenied` for
    /// identified ones, or the error that prevented a decision. An empty
    /// permission mask is never granted.
    pub fn enforce(
        &self,
        actor: &Actor,
        scope: &Scope,
        resource: &Resource,
        permission: Permission,
    ) -> Result<()> {
        if permission.is_empty() {
            debug!("Refusing empty permission request from {actor} on {resource}");
            return Err(Error::PermissionDenied);
        }

        if actor.is_anonymous() && permission.requires_identified() {
            debug!("Anonymous actor cannot hold {permission} on {resource}");
            return Err(Error::AuthenticationRequired);
        }

        let allowed = self
            .policy
            .evaluate(actor.principal(), scope, resource, permission)
            .map_err(|e| {
                let e = e.into_backend();
                if !e.is_client_error() {
                    warn!(
                        "Authorization of {actor} for {permission} on {resource} in '{}' failed: {e}",
                        scope.space_path
                    );
                }
                e
            })?;

        if allowed {
            return Ok(());
        }

        debug!(
            "Denied {actor} {permission} on {resource} in '{}'",
            scope.space_path
        );

        if actor.is_anonymous() {
            Err(Error::AuthenticationRequired)
        } else {
            Err(Error::PermissionDenied)
        }
    }

    /// Authorizes creating a space without a parent.
    ///
    /// Provisional rule: any identified actor may create a top-level space.
    /// Tightening it only requires changing this method.
    pub fn enforce_top_level_create<'a>(&self, actor: &'a Actor) -> Result<&'a Principal> {
        actor.require()
    }
}
