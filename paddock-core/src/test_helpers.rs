//! Fixtures shared by the unit tests of paddock-core

use crate::models::{
    ModuleFlags, OrganizationRole, PermissionAction, PermissionAssignment, SubscriptionDocument,
    SubscriptionLimits, SubscriptionTier, TierDefinition,
};

/// Assignment holding `roles` and exactly the `granted` actions, without bypass flags
pub fn assignment(roles: &[OrganizationRole], granted: &[PermissionAction]) -> PermissionAssignment {
    PermissionAssignment {
        roles: roles.iter().copied().collect(),
        granted_actions: granted.iter().copied().collect(),
        is_org_owner: false,
        is_system_admin: false,
    }
}

pub fn subscription(tier: &str, limits: &[(&str, i64)], modules: &[(&str, bool)]) -> SubscriptionDocument {
    SubscriptionDocument {
        tier: SubscriptionTier::from(tier),
        limits: limits.iter().copied().collect::<SubscriptionLimits>(),
        modules: modules.iter().copied().collect::<ModuleFlags>(),
        addons: Default::default(),
        billing_status: None,
    }
}

pub fn tier(name: &str, modules: &[(&str, bool)]) -> TierDefinition {
    TierDefinition {
        tier: SubscriptionTier::from(name),
        display_name: None,
        limits: SubscriptionLimits::default(),
        modules: modules.iter().copied().collect(),
    }
}
