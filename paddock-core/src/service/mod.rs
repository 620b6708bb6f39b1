mod context;
pub mod entitlement;
pub mod gate;
pub mod permission;
pub mod subscription;

pub use entitlement::EntitlementService;
pub use gate::{Gate, GateCombinator};
pub use permission::PermissionEvaluator;
pub use subscription::SubscriptionEvaluator;
