//! JSON reports printed by the CLI

use serde::Serialize;

use paddock_core::cache::LoadStatus;
use paddock_core::models::{PermissionAssignment, Principal, SubscriptionDocument};
use paddock_core::{EntitlementService, Gate};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub gate: Gate,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub principal: Option<Principal>,
    pub decisions: Vec<Decision>,
    pub permission_status: LoadStatus,
    pub subscription_status: LoadStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub principal: Option<Principal>,
    pub permissions: Option<PermissionAssignment>,
    pub subscription: Option<SubscriptionDocument>,
    pub permission_status: LoadStatus,
    pub subscription_status: LoadStatus,
}

impl StatusReport {
    /// Snapshot of whatever the service holds after its last fetch
    pub fn collect(service: &EntitlementService) -> Self {
        Self {
            principal: service.principal(),
            permissions: service.permissions().cached().map(|a| (*a).clone()),
            subscription: service.subscriptions().cached().map(|s| (*s).clone()),
            permission_status: service.permission_status(),
            subscription_status: service.subscription_status(),
        }
    }

    pub const fn is_complete(&self) -> bool {
        self.permissions.is_some() && self.subscription.is_some()
    }
}
