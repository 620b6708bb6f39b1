//! Entry point of the entitlement layer.
//!
//! Owns the active principal, the three caches and the evaluators built on
//! them. Hosts call [`EntitlementService::on_context_changed`] whenever the
//! user selects another organization or stable, or signs out.

use std::sync::Arc;

use tokio::sync::watch;

use super::context::EntitlementContext;
use super::gate::GateCombinator;
use super::permission::PermissionEvaluator;
use super::subscription::SubscriptionEvaluator;
use crate::cache::LoadStatus;
use crate::client::EntitlementApi;
use crate::config::CacheConfig;
use crate::error::FetchError;
use crate::models::Principal;

#[derive(Clone)]
pub struct EntitlementService {
    context: Arc<EntitlementContext>,
    permissions: PermissionEvaluator,
    subscriptions: SubscriptionEvaluator,
    gates: GateCombinator,
}

impl std::fmt::Debug for EntitlementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementService")
            .field("principal", &self.context.principal())
            .finish()
    }
}

impl EntitlementService {
    #[must_use]
    pub fn new(api: Arc<dyn EntitlementApi>, config: &CacheConfig) -> Self {
        let context = Arc::new(EntitlementContext::new(api, config));
        let permissions = PermissionEvaluator::new(Arc::clone(&context));
        let subscriptions = SubscriptionEvaluator::new(Arc::clone(&context));
        let gates = GateCombinator::new(permissions.clone(), subscriptions.clone());
        Self {
            context,
            permissions,
            subscriptions,
            gates,
        }
    }

    /// Select a new principal (or none, on sign-out).
    ///
    /// Synchronous: all cached entitlements are dropped and in-flight fetches
    /// detached before this returns. The next query fetches for the new context.
    pub fn on_context_changed(&self, principal: Option<Principal>) {
        self.context.replace_principal(principal);
    }

    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.context.principal()
    }

    #[must_use]
    pub const fn permissions(&self) -> &PermissionEvaluator {
        &self.permissions
    }

    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionEvaluator {
        &self.subscriptions
    }

    #[must_use]
    pub const fn gates(&self) -> &GateCombinator {
        &self.gates
    }

    #[must_use]
    pub fn permission_status(&self) -> LoadStatus {
        self.context.permissions.status()
    }

    #[must_use]
    pub fn subscription_status(&self) -> LoadStatus {
        self.context.subscriptions.status()
    }

    #[must_use]
    pub fn tier_catalog_status(&self) -> LoadStatus {
        self.context.tiers.status()
    }

    pub fn subscribe_permission_status(&self) -> watch::Receiver<LoadStatus> {
        self.context.permissions.subscribe()
    }

    pub fn subscribe_subscription_status(&self) -> watch::Receiver<LoadStatus> {
        self.context.subscriptions.subscribe()
    }

    /// Resolve both documents for the active principal concurrently.
    ///
    /// Used after a context switch or by a retry affordance; gate queries do
    /// not need it, they fetch lazily.
    pub async fn prefetch(&self) -> Result<(), FetchError> {
        let (permissions, subscription) = futures::join!(
            self.context.resolve_permissions(),
            self.context.resolve_subscription()
        );
        permissions?;
        subscription?;
        Ok(())
    }
}
