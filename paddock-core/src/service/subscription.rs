//! Module and limit queries against the active organization's subscription

use std::sync::Arc;

use tracing::debug;

use super::context::EntitlementContext;
use crate::models::{LimitStatus, SubscriptionDocument, SubscriptionTier, TierDefinition};

#[derive(Clone)]
pub struct SubscriptionEvaluator {
    context: Arc<EntitlementContext>,
}

impl std::fmt::Debug for SubscriptionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEvaluator").finish()
    }
}

impl SubscriptionEvaluator {
    pub(crate) const fn new(context: Arc<EntitlementContext>) -> Self {
        Self { context }
    }

    /// Resolved subscription document, fetching it when missing or expired
    pub async fn snapshot(&self) -> Option<Arc<SubscriptionDocument>> {
        match self.context.resolve_subscription().await {
            Ok(resolved) => Some(resolved.value),
            Err(error) => {
                debug!(error = %error, "Subscription document unavailable, denying");
                None
            }
        }
    }

    /// Currently cached document, fresh or stale, without fetching
    #[must_use]
    pub fn cached(&self) -> Option<Arc<SubscriptionDocument>> {
        self.context.cached_subscription()
    }

    /// Whether the organization's plan enables `module`; absent modules are disabled
    pub async fn is_feature_available(&self, module: &str) -> bool {
        self.snapshot()
            .await
            .is_some_and(|doc| doc.modules.is_enabled(module))
    }

    /// Whether one more item fits under `limit_key` given `current_count` in use
    pub async fn is_within_limit(&self, limit_key: &str, current_count: u64) -> bool {
        self.limit_status(limit_key, current_count).await.is_admitted()
    }

    pub async fn limit_status(&self, limit_key: &str, current_count: u64) -> LimitStatus {
        self.snapshot()
            .await
            .map_or(LimitStatus::Unknown, |doc| doc.limits.status(limit_key, current_count))
    }

    pub async fn is_addon_active(&self, addon: &str) -> bool {
        self.snapshot()
            .await
            .is_some_and(|doc| doc.is_addon_active(addon))
    }

    /// Informational only; gating never matches on the tier
    pub async fn tier(&self) -> Option<SubscriptionTier> {
        self.snapshot().await.map(|doc| doc.tier.clone())
    }

    /// Catalog tiers whose plan enables `module`, for upgrade hints
    pub async fn tiers_unlocking(&self, module: &str) -> Vec<TierDefinition> {
        match self.context.resolve_tier_catalog().await {
            Ok(resolved) => resolved
                .value
                .iter()
                .filter(|tier| tier.modules.is_enabled(module))
                .cloned()
                .collect(),
            Err(error) => {
                debug!(error = %error, module, "Tier catalog unavailable");
                Vec::new()
            }
        }
    }

    #[must_use]
    pub fn is_feature_available_now(&self, module: &str) -> bool {
        self.cached()
            .is_some_and(|doc| doc.modules.is_enabled(module))
    }

    #[must_use]
    pub fn is_within_limit_now(&self, limit_key: &str, current_count: u64) -> bool {
        self.cached()
            .is_some_and(|doc| doc.limits.admits(limit_key, current_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockEntitlementApi;
    use crate::config::CacheConfig;
    use crate::error::FetchError;
    use crate::models::Principal;
    use crate::test_helpers::{subscription, tier};

    fn evaluator_with(api: MockEntitlementApi) -> SubscriptionEvaluator {
        let context = Arc::new(EntitlementContext::new(Arc::new(api), &CacheConfig::default()));
        context.replace_principal(Some(Principal::new("user1", "org1")));
        SubscriptionEvaluator::new(context)
    }

    fn basic_plan() -> MockEntitlementApi {
        let mut api = MockEntitlementApi::new();
        api.expect_subscription().times(1).returning(|_| {
            Ok(subscription(
                "basic",
                &[("horses", 5), ("stables", -1)],
                &[("lessons", true), ("analytics", false)],
            ))
        });
        api
    }

    #[tokio::test]
    async fn test_module_flags() {
        let evaluator = evaluator_with(basic_plan());

        assert!(evaluator.is_feature_available("lessons").await);
        assert!(!evaluator.is_feature_available("analytics").await);
        assert!(!evaluator.is_feature_available("newModule").await);
    }

    #[tokio::test]
    async fn test_limits() {
        let evaluator = evaluator_with(basic_plan());

        assert!(evaluator.is_within_limit("horses", 4).await);
        assert!(!evaluator.is_within_limit("horses", 5).await);
        assert_eq!(evaluator.limit_status("horses", 3).await, LimitStatus::Within { remaining: 2 });
        assert_eq!(evaluator.limit_status("horses", 9).await, LimitStatus::Reached { limit: 5 });

        for n in [0, 1, 1_000, u64::MAX] {
            assert!(evaluator.is_within_limit("stables", n).await);
        }
        // Keys the plan does not mention are not capped
        assert!(evaluator.is_within_limit("trainers", 50).await);
    }

    #[tokio::test]
    async fn test_missing_document_fails_closed() {
        let mut api = MockEntitlementApi::new();
        api.expect_subscription()
            .returning(|_| Err(FetchError::NotFound("subscription".to_string())));
        let evaluator = evaluator_with(api);

        assert!(!evaluator.is_feature_available("lessons").await);
        assert!(!evaluator.is_within_limit("horses", 0).await);
        assert_eq!(evaluator.limit_status("horses", 0).await, LimitStatus::Unknown);
        assert!(!evaluator.is_addon_active("sms").await);
        assert!(evaluator.tier().await.is_none());
    }

    #[tokio::test]
    async fn test_tier_and_addons() {
        let mut api = MockEntitlementApi::new();
        api.expect_subscription().returning(|_| {
            let mut doc = subscription("pro", &[], &[]);
            doc.addons.insert("sms".to_string(), true);
            doc.addons.insert("branding".to_string(), false);
            Ok(doc)
        });
        let evaluator = evaluator_with(api);

        assert_eq!(evaluator.tier().await, Some(SubscriptionTier::from("pro")));
        assert!(evaluator.is_addon_active("sms").await);
        assert!(!evaluator.is_addon_active("branding").await);
        assert!(!evaluator.is_addon_active("payroll").await);
    }

    #[tokio::test]
    async fn test_tiers_unlocking() {
        let mut api = MockEntitlementApi::new();
        api.expect_tier_catalog().times(1).returning(|| {
            Ok(vec![
                tier("basic", &[("lessons", true)]),
                tier("pro", &[("lessons", true), ("analytics", true)]),
                tier("enterprise", &[("lessons", true), ("analytics", true)]),
            ])
        });
        let evaluator = evaluator_with(api);

        let unlocking: Vec<_> = evaluator
            .tiers_unlocking("analytics")
            .await
            .into_iter()
            .map(|t| t.tier.to_string())
            .collect();
        assert_eq!(unlocking, ["pro", "enterprise"]);
        assert!(evaluator.tiers_unlocking("newModule").await.is_empty());
    }

    #[tokio::test]
    async fn test_tiers_unlocking_without_catalog() {
        let mut api = MockEntitlementApi::new();
        api.expect_tier_catalog()
            .returning(|| Err(FetchError::Status { code: 500, message: String::new() }));
        let evaluator = evaluator_with(api);

        assert!(evaluator.tiers_unlocking("analytics").await.is_empty());
    }

    #[tokio::test]
    async fn test_now_variants_read_cache_only() {
        let evaluator = evaluator_with(basic_plan());

        assert!(!evaluator.is_feature_available_now("lessons"));
        assert!(!evaluator.is_within_limit_now("stables", 1));

        evaluator.snapshot().await;
        assert!(evaluator.is_feature_available_now("lessons"));
        assert!(evaluator.is_within_limit_now("stables", 1));
        assert!(!evaluator.is_within_limit_now("horses", 5));
    }
}
