//! Subscription documents, module flags and usage limits.
//!
//! Tiers are opaque: the backend can define custom tiers at any time, so
//! nothing here branches on a tier name. Gating reads the resolved
//! [`ModuleFlags`] and [`SubscriptionLimits`] only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Subscription tier identifier as published by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionTier(pub String);

impl SubscriptionTier {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubscriptionTier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Module key -> enabled. A missing key means disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleFlags(pub HashMap<String, bool>);

impl ModuleFlags {
    #[must_use]
    pub fn is_enabled(&self, module: &str) -> bool {
        self.0.get(module).copied().unwrap_or(false)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(key, _)| key.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for ModuleFlags {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Admission outcome for a countable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LimitStatus {
    /// No ceiling applies
    Unlimited,
    /// `remaining` more can be created
    Within { remaining: u64 },
    /// The ceiling has been reached (or the configured value is malformed)
    Reached { limit: i64 },
    /// No subscription document is available
    Unknown,
}

impl LimitStatus {
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Unlimited | Self::Within { .. })
    }
}

/// Limit key -> ceiling, where [`SubscriptionLimits::UNLIMITED`] lifts the ceiling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionLimits(pub HashMap<String, i64>);

impl SubscriptionLimits {
    pub const UNLIMITED: i64 = -1;

    #[must_use]
    pub fn get(&self, key: &str) -> Option<i64> {
        self.0.get(key).copied()
    }

    /// Admission for `current_count` existing items.
    ///
    /// An absent key means the resource has no configured limit.
    #[must_use]
    pub fn status(&self, key: &str, current_count: u64) -> LimitStatus {
        match self.get(key) {
            None | Some(Self::UNLIMITED) => LimitStatus::Unlimited,
            Some(limit) => match u64::try_from(limit) {
                Ok(ceiling) if current_count < ceiling => LimitStatus::Within {
                    remaining: ceiling - current_count,
                },
                _ => LimitStatus::Reached { limit },
            },
        }
    }

    #[must_use]
    pub fn admits(&self, key: &str, current_count: u64) -> bool {
        self.status(key, current_count).is_admitted()
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for SubscriptionLimits {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Billing state reported with the subscription. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BillingStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Other(String),
}

impl From<String> for BillingStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            _ => Self::Other(s),
        }
    }
}

impl From<BillingStatus> for String {
    fn from(status: BillingStatus) -> Self {
        match status {
            BillingStatus::Active => "active".to_string(),
            BillingStatus::Trialing => "trialing".to_string(),
            BillingStatus::PastDue => "past_due".to_string(),
            BillingStatus::Canceled => "canceled".to_string(),
            BillingStatus::Unpaid => "unpaid".to_string(),
            BillingStatus::Other(s) => s,
        }
    }
}

/// Subscription state of one organization. Replaced as a whole on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDocument {
    pub tier: SubscriptionTier,
    #[serde(default)]
    pub limits: SubscriptionLimits,
    #[serde(default)]
    pub modules: ModuleFlags,
    #[serde(default)]
    pub addons: HashMap<String, bool>,
    #[serde(default)]
    pub billing_status: Option<BillingStatus>,
}

impl SubscriptionDocument {
    #[must_use]
    pub fn is_addon_active(&self, addon: &str) -> bool {
        self.addons.get(addon).copied().unwrap_or(false)
    }
}

/// One entry of the backend's tier catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDefinition {
    pub tier: SubscriptionTier,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub limits: SubscriptionLimits,
    #[serde(default)]
    pub modules: ModuleFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_module_is_disabled() {
        let flags: ModuleFlags = [("analytics", true), ("lessons", false)].into_iter().collect();
        assert!(flags.is_enabled("analytics"));
        assert!(!flags.is_enabled("lessons"));
        assert!(!flags.is_enabled("newModule"));
    }

    #[test]
    fn test_unlimited_admits_any_count() {
        let limits: SubscriptionLimits = [("horses", SubscriptionLimits::UNLIMITED)].into_iter().collect();
        for n in [0, 1, 10, 10_000, u64::MAX] {
            assert!(limits.admits("horses", n));
        }
    }

    #[test]
    fn test_limit_is_exclusive_ceiling() {
        let limits: SubscriptionLimits = [("horses", 5)].into_iter().collect();
        assert_eq!(limits.status("horses", 3), LimitStatus::Within { remaining: 2 });
        assert!(limits.admits("horses", 4));
        assert!(!limits.admits("horses", 5));
        assert_eq!(limits.status("horses", 6), LimitStatus::Reached { limit: 5 });
    }

    #[test]
    fn test_absent_limit_key_is_unlimited() {
        let limits = SubscriptionLimits::default();
        assert_eq!(limits.status("stables", 100), LimitStatus::Unlimited);
    }

    #[test]
    fn test_zero_and_malformed_limits_deny() {
        let limits: SubscriptionLimits = [("members", 0), ("stables", -7)].into_iter().collect();
        assert!(!limits.admits("members", 0));
        assert!(!limits.admits("stables", 0));
    }

    #[test]
    fn test_billing_status_preserves_unknown_values() {
        let status: BillingStatus = serde_json::from_str("\"paused_by_admin\"").unwrap();
        assert_eq!(status, BillingStatus::Other("paused_by_admin".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"paused_by_admin\"");

        let status: BillingStatus = serde_json::from_str("\"past_due\"").unwrap();
        assert_eq!(status, BillingStatus::PastDue);
    }

    #[test]
    fn test_decode_document_with_custom_tier() {
        let json = r#"{
            "tier": "founders-club",
            "limits": {"horses": -1, "members": 25},
            "modules": {"analytics": true},
            "addons": {"sms": true},
            "billingStatus": "trialing"
        }"#;
        let doc: SubscriptionDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.tier.as_str(), "founders-club");
        assert!(doc.modules.is_enabled("analytics"));
        assert!(doc.limits.admits("horses", 1_000));
        assert!(doc.is_addon_active("sms"));
        assert!(!doc.is_addon_active("whatsapp"));
        assert_eq!(doc.billing_status, Some(BillingStatus::Trialing));
    }

    #[test]
    fn test_decode_minimal_document() {
        let doc: SubscriptionDocument = serde_json::from_str(r#"{"tier": "free"}"#).unwrap();
        assert!(doc.modules.0.is_empty());
        assert!(doc.billing_status.is_none());
    }
}
