//! Active principal and the caches scoped to it.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cache::{EntitlementCache, Resolved};
use crate::client::EntitlementApi;
use crate::config::CacheConfig;
use crate::error::FetchError;
use crate::models::{OrganizationId, PermissionAssignment, PermissionKey, Principal, SubscriptionDocument, TierDefinition};

/// State shared by the evaluators of one [`super::EntitlementService`]
pub(crate) struct EntitlementContext {
    api: Arc<dyn EntitlementApi>,
    principal: RwLock<Option<Principal>>,
    pub(crate) permissions: EntitlementCache<PermissionKey, PermissionAssignment>,
    pub(crate) subscriptions: EntitlementCache<OrganizationId, SubscriptionDocument>,
    /// Single catalog document, keyed by `()`
    pub(crate) tiers: EntitlementCache<(), Vec<TierDefinition>>,
}

impl EntitlementContext {
    pub(crate) fn new(api: Arc<dyn EntitlementApi>, config: &CacheConfig) -> Self {
        Self {
            api,
            principal: RwLock::new(None),
            permissions: EntitlementCache::new("permission", config.permission_policy()),
            subscriptions: EntitlementCache::new("subscription", config.subscription_policy()),
            tiers: EntitlementCache::new("tier_catalog", config.tier_policy()),
        }
    }

    pub(crate) fn principal(&self) -> Option<Principal> {
        self.principal.read().clone()
    }

    /// Replace the principal and drop everything cached for the old one.
    ///
    /// The write lock is held across the invalidation, so a reader that sees
    /// the new principal never sees entries fetched for the old one.
    pub(crate) fn replace_principal(&self, principal: Option<Principal>) {
        let mut current = self.principal.write();
        if *current == principal {
            debug!("Entitlement context reselected, refreshing");
        } else {
            info!(
                from = ?current.as_ref().map(Principal::permission_key),
                to = ?principal.as_ref().map(Principal::permission_key),
                "Entitlement context changed"
            );
        }
        self.permissions.invalidate_all();
        self.subscriptions.invalidate_all();
        self.tiers.invalidate_all();
        *current = principal;
    }

    fn permission_key(&self) -> Result<PermissionKey, FetchError> {
        self.principal
            .read()
            .as_ref()
            .map(Principal::permission_key)
            .ok_or(FetchError::NoActiveContext)
    }

    fn organization_id(&self) -> Result<OrganizationId, FetchError> {
        self.principal
            .read()
            .as_ref()
            .map(|p| p.organization_id.clone())
            .ok_or(FetchError::NoActiveContext)
    }

    /// Resolve the assignment of the active principal.
    ///
    /// The flight is started under the principal read lock, so a concurrent
    /// [`replace_principal`](Self::replace_principal) either sees and detaches
    /// it or runs before the key is read.
    pub(crate) async fn resolve_permissions(&self) -> Result<Resolved<PermissionAssignment>, FetchError> {
        let api = Arc::clone(&self.api);
        let lookup = {
            let principal = self.principal.read();
            let key = principal
                .as_ref()
                .map(Principal::permission_key)
                .ok_or(FetchError::NoActiveContext)?;
            self.permissions
                .get(key, move |key| async move { api.permission_assignment(&key).await })
        };
        lookup.await
    }

    pub(crate) async fn resolve_subscription(&self) -> Result<Resolved<SubscriptionDocument>, FetchError> {
        let api = Arc::clone(&self.api);
        let lookup = {
            let principal = self.principal.read();
            let organization_id = principal
                .as_ref()
                .map(|p| p.organization_id.clone())
                .ok_or(FetchError::NoActiveContext)?;
            self.subscriptions.get(organization_id, move |organization_id| async move {
                api.subscription(&organization_id).await
            })
        };
        lookup.await
    }

    pub(crate) async fn resolve_tier_catalog(&self) -> Result<Resolved<Vec<TierDefinition>>, FetchError> {
        let api = Arc::clone(&self.api);
        let lookup = {
            let _principal = self.principal.read();
            self.tiers.get((), move |()| async move { api.tier_catalog().await })
        };
        lookup.await
    }

    pub(crate) fn cached_permissions(&self) -> Option<Arc<PermissionAssignment>> {
        let key = self.permission_key().ok()?;
        self.permissions.peek(&key).map(|resolved| resolved.value)
    }

    pub(crate) fn cached_subscription(&self) -> Option<Arc<SubscriptionDocument>> {
        let organization_id = self.organization_id().ok()?;
        self.subscriptions.peek(&organization_id).map(|resolved| resolved.value)
    }
}
