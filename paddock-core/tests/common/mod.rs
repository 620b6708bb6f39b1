//! Shared fixtures for paddock-core integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use paddock_core::config::CacheConfig;
use paddock_core::models::{
    OrganizationId, OrganizationRole, PermissionAction, PermissionAssignment, PermissionKey, Principal,
    SubscriptionDocument, SubscriptionTier, TierDefinition,
};
use paddock_core::{EntitlementApi, EntitlementService, FetchError};

/// In-memory backend with per-endpoint fetch counters and an optional latency
#[derive(Default)]
pub struct FakeApi {
    assignments: Mutex<HashMap<PermissionKey, Result<PermissionAssignment, FetchError>>>,
    subscriptions: Mutex<HashMap<OrganizationId, Result<SubscriptionDocument, FetchError>>>,
    tiers: Mutex<Vec<TierDefinition>>,
    delay: Mutex<Duration>,
    permission_fetches: AtomicUsize,
    subscription_fetches: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_assignment(&self, principal: &Principal, assignment: PermissionAssignment) {
        self.assignments.lock().insert(principal.permission_key(), Ok(assignment));
    }

    pub fn fail_assignment(&self, principal: &Principal, error: FetchError) {
        self.assignments.lock().insert(principal.permission_key(), Err(error));
    }

    pub fn set_subscription(&self, organization_id: &str, document: SubscriptionDocument) {
        self.subscriptions.lock().insert(organization_id.into(), Ok(document));
    }

    pub fn fail_subscription(&self, organization_id: &str, error: FetchError) {
        self.subscriptions.lock().insert(organization_id.into(), Err(error));
    }

    pub fn set_tiers(&self, tiers: Vec<TierDefinition>) {
        *self.tiers.lock() = tiers;
    }

    /// Latency applied to every request
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn permission_fetches(&self) -> usize {
        self.permission_fetches.load(Ordering::SeqCst)
    }

    pub fn subscription_fetches(&self) -> usize {
        self.subscription_fetches.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl EntitlementApi for FakeApi {
    async fn permission_assignment(&self, key: &PermissionKey) -> Result<PermissionAssignment, FetchError> {
        self.permission_fetches.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.assignments
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound(key.to_string())))
    }

    async fn subscription(&self, organization_id: &OrganizationId) -> Result<SubscriptionDocument, FetchError> {
        self.subscription_fetches.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.subscriptions
            .lock()
            .get(organization_id)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound(organization_id.to_string())))
    }

    async fn tier_catalog(&self) -> Result<Vec<TierDefinition>, FetchError> {
        self.wait().await;
        Ok(self.tiers.lock().clone())
    }
}

pub fn service_for(api: &Arc<FakeApi>) -> EntitlementService {
    EntitlementService::new(Arc::clone(api) as Arc<dyn EntitlementApi>, &CacheConfig::default())
}

pub fn principal_a() -> Principal {
    Principal::new("alice", "org-a").with_stable("stable-a")
}

pub fn principal_b() -> Principal {
    Principal::new("alice", "org-b").with_stable("stable-b")
}

pub fn granting(actions: &[PermissionAction]) -> PermissionAssignment {
    PermissionAssignment {
        roles: [OrganizationRole::Staff].into_iter().collect(),
        granted_actions: actions.iter().copied().collect(),
        is_org_owner: false,
        is_system_admin: false,
    }
}

pub fn plan(tier: &str, limits: &[(&str, i64)], modules: &[(&str, bool)]) -> SubscriptionDocument {
    SubscriptionDocument {
        tier: SubscriptionTier::from(tier),
        limits: limits.iter().copied().collect(),
        modules: modules.iter().copied().collect(),
        addons: HashMap::new(),
        billing_status: None,
    }
}
