pub mod id;
pub mod permission;
pub mod subscription;

pub use id::{OrganizationId, PermissionKey, Principal, StableId, UserId};
pub use permission::{ActionScope, OrganizationRole, PermissionAction, PermissionAssignment};
pub use subscription::{
    BillingStatus, LimitStatus, ModuleFlags, SubscriptionDocument, SubscriptionLimits,
    SubscriptionTier, TierDefinition,
};
