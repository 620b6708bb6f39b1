//! Permission evaluation against the active principal's assignment
//!
//! Every query fails closed: no principal, no resolved assignment, or a fetch
//! error with nothing cached all answer `false`.

use std::sync::Arc;

use tracing::debug;

use super::context::EntitlementContext;
use crate::models::{OrganizationRole, PermissionAction, PermissionAssignment};

/// Role and action queries for the active user, organization and stable
#[derive(Clone)]
pub struct PermissionEvaluator {
    context: Arc<EntitlementContext>,
}

impl std::fmt::Debug for PermissionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEvaluator").finish()
    }
}

impl PermissionEvaluator {
    pub(crate) const fn new(context: Arc<EntitlementContext>) -> Self {
        Self { context }
    }

    /// Resolved assignment, fetching it when missing or expired
    pub async fn snapshot(&self) -> Option<Arc<PermissionAssignment>> {
        match self.context.resolve_permissions().await {
            Ok(resolved) => {
                if let Some(error) = &resolved.refresh_error {
                    debug!(error = %error, "Evaluating permissions against stale assignment");
                }
                Some(resolved.value)
            }
            Err(error) => {
                debug!(error = %error, "Permission assignment unavailable, denying");
                None
            }
        }
    }

    /// Currently cached assignment, fresh or stale, without fetching
    #[must_use]
    pub fn cached(&self) -> Option<Arc<PermissionAssignment>> {
        self.context.cached_permissions()
    }

    pub async fn has_permission(&self, action: PermissionAction) -> bool {
        self.snapshot()
            .await
            .is_some_and(|assignment| assignment.allows(action))
    }

    /// `false` for an empty `roles` slice
    pub async fn has_any_role(&self, roles: &[OrganizationRole]) -> bool {
        if roles.is_empty() {
            return false;
        }
        self.snapshot()
            .await
            .is_some_and(|assignment| assignment.has_any_role(roles))
    }

    /// `true` for an empty `actions` slice
    pub async fn has_all_permissions(&self, actions: &[PermissionAction]) -> bool {
        if actions.is_empty() {
            return true;
        }
        self.snapshot()
            .await
            .is_some_and(|assignment| actions.iter().all(|action| assignment.allows(*action)))
    }

    /// `false` for an empty `actions` slice
    pub async fn has_any_permission(&self, actions: &[PermissionAction]) -> bool {
        if actions.is_empty() {
            return false;
        }
        self.snapshot()
            .await
            .is_some_and(|assignment| actions.iter().any(|action| assignment.allows(*action)))
    }

    /// Evaluate against the cached assignment only; `false` when nothing is cached
    #[must_use]
    pub fn has_permission_now(&self, action: PermissionAction) -> bool {
        self.cached()
            .is_some_and(|assignment| assignment.allows(action))
    }

    #[must_use]
    pub fn has_any_role_now(&self, roles: &[OrganizationRole]) -> bool {
        self.cached()
            .is_some_and(|assignment| assignment.has_any_role(roles))
    }
}
