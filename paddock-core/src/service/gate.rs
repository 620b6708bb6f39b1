//! Gate algebra over the permission and subscription evaluators.
//!
//! A [`Gate`] describes a capability declaratively; [`GateCombinator`]
//! decides it. Views carry their gate as data and ask the combinator whether
//! to render, so gating needs no view hierarchy.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::permission::PermissionEvaluator;
use super::subscription::SubscriptionEvaluator;
use crate::metrics;
use crate::models::{OrganizationRole, PermissionAction, PermissionAssignment, SubscriptionDocument};

/// Stateless capability predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Gate {
    Permission { action: PermissionAction },
    AllPermissions { actions: Vec<PermissionAction> },
    AnyPermission { actions: Vec<PermissionAction> },
    AnyRole { roles: Vec<OrganizationRole> },
    Feature { module: String },
    WithinLimit { limit: String, current_count: u64 },
    FeatureAndPermission { module: String, action: PermissionAction },
    /// `true` when empty
    All { gates: Vec<Gate> },
    /// `false` when empty
    Any { gates: Vec<Gate> },
}

impl Gate {
    #[must_use]
    pub const fn permission(action: PermissionAction) -> Self {
        Self::Permission { action }
    }

    pub fn feature(module: impl Into<String>) -> Self {
        Self::Feature {
            module: module.into(),
        }
    }

    pub fn within_limit(limit: impl Into<String>, current_count: u64) -> Self {
        Self::WithinLimit {
            limit: limit.into(),
            current_count,
        }
    }

    pub fn feature_and_permission(module: impl Into<String>, action: PermissionAction) -> Self {
        Self::FeatureAndPermission {
            module: module.into(),
            action,
        }
    }

    pub fn all(gates: impl IntoIterator<Item = Gate>) -> Self {
        Self::All {
            gates: gates.into_iter().collect(),
        }
    }

    pub fn any(gates: impl IntoIterator<Item = Gate>) -> Self {
        Self::Any {
            gates: gates.into_iter().collect(),
        }
    }

    /// Metric label for this gate's variant
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Permission { .. } => "permission",
            Self::AllPermissions { .. } => "all_permissions",
            Self::AnyPermission { .. } => "any_permission",
            Self::AnyRole { .. } => "any_role",
            Self::Feature { .. } => "feature",
            Self::WithinLimit { .. } => "within_limit",
            Self::FeatureAndPermission { .. } => "feature_and_permission",
            Self::All { .. } => "all",
            Self::Any { .. } => "any",
        }
    }

    /// Decide against already-resolved documents; a missing document denies
    #[must_use]
    pub fn decide(
        &self,
        assignment: Option<&PermissionAssignment>,
        subscription: Option<&SubscriptionDocument>,
    ) -> bool {
        match self {
            Self::Permission { action } => assignment.is_some_and(|a| a.allows(*action)),
            Self::AllPermissions { actions } => {
                actions.is_empty() || assignment.is_some_and(|a| actions.iter().all(|action| a.allows(*action)))
            }
            Self::AnyPermission { actions } => {
                assignment.is_some_and(|a| actions.iter().any(|action| a.allows(*action)))
            }
            Self::AnyRole { roles } => assignment.is_some_and(|a| a.has_any_role(roles)),
            Self::Feature { module } => subscription.is_some_and(|s| s.modules.is_enabled(module)),
            Self::WithinLimit { limit, current_count } => {
                subscription.is_some_and(|s| s.limits.admits(limit, *current_count))
            }
            Self::FeatureAndPermission { module, action } => {
                subscription.is_some_and(|s| s.modules.is_enabled(module))
                    && assignment.is_some_and(|a| a.allows(*action))
            }
            Self::All { gates } => gates.iter().all(|gate| gate.decide(assignment, subscription)),
            Self::Any { gates } => gates.iter().any(|gate| gate.decide(assignment, subscription)),
        }
    }
}

/// Combines evaluator answers into one allow/deny decision. Holds no state of its own.
#[derive(Debug, Clone)]
pub struct GateCombinator {
    permissions: PermissionEvaluator,
    subscriptions: SubscriptionEvaluator,
}

impl GateCombinator {
    #[must_use]
    pub const fn new(permissions: PermissionEvaluator, subscriptions: SubscriptionEvaluator) -> Self {
        Self {
            permissions,
            subscriptions,
        }
    }

    /// Module enabled AND action permitted; the permission is not consulted
    /// when the module is off.
    pub async fn require_feature_and_permission(&self, module: &str, action: PermissionAction) -> bool {
        self.subscriptions.is_feature_available(module).await && self.permissions.has_permission(action).await
    }

    pub async fn require_all_permissions(&self, actions: &[PermissionAction]) -> bool {
        self.permissions.has_all_permissions(actions).await
    }

    pub async fn require_any_permission(&self, actions: &[PermissionAction]) -> bool {
        self.permissions.has_any_permission(actions).await
    }

    pub async fn require_any_role(&self, roles: &[OrganizationRole]) -> bool {
        self.permissions.has_any_role(roles).await
    }

    /// Evaluate `gate` left to right, short-circuiting composites
    pub async fn evaluate(&self, gate: &Gate) -> bool {
        let allowed = self.evaluate_inner(gate).await;
        metrics::gates::record(gate.kind(), allowed);
        tracing::trace!(gate = gate.kind(), allowed, "Gate evaluated");
        allowed
    }

    fn evaluate_inner<'a>(&'a self, gate: &'a Gate) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match gate {
                Gate::Permission { action } => self.permissions.has_permission(*action).await,
                Gate::AllPermissions { actions } => self.require_all_permissions(actions).await,
                Gate::AnyPermission { actions } => self.require_any_permission(actions).await,
                Gate::AnyRole { roles } => self.require_any_role(roles).await,
                Gate::Feature { module } => self.subscriptions.is_feature_available(module).await,
                Gate::WithinLimit { limit, current_count } => {
                    self.subscriptions.is_within_limit(limit, *current_count).await
                }
                Gate::FeatureAndPermission { module, action } => {
                    self.require_feature_and_permission(module, *action).await
                }
                Gate::All { gates } => {
                    for gate in gates {
                        if !self.evaluate_inner(gate).await {
                            return false;
                        }
                    }
                    true
                }
                Gate::Any { gates } => {
                    for gate in gates {
                        if self.evaluate_inner(gate).await {
                            return true;
                        }
                    }
                    false
                }
            }
        })
    }

    /// Decide `gate` from cached documents only, without fetching
    #[must_use]
    pub fn evaluate_now(&self, gate: &Gate) -> bool {
        let assignment = self.permissions.cached();
        let subscription = self.subscriptions.cached();
        let allowed = gate.decide(assignment.as_deref(), subscription.as_deref());
        metrics::gates::record(gate.kind(), allowed);
        allowed
    }

    /// Run `render` only when `gate` allows it
    pub async fn gated<T>(&self, gate: &Gate, render: impl FnOnce() -> T) -> Option<T> {
        self.evaluate(gate).await.then(render)
    }
}
