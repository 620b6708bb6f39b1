//! Remote API collaborator supplying entitlement documents.
//!
//! The backend owns the wire schema and remains the authority of record;
//! this layer only reads the fields it needs to evaluate gates.

pub mod http;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{OrganizationId, PermissionAssignment, PermissionKey, SubscriptionDocument, TierDefinition};

pub use http::HttpEntitlementApi;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntitlementApi: Send + Sync {
    /// Permission assignment of `key.user_id` within the organization/stable
    async fn permission_assignment(&self, key: &PermissionKey) -> Result<PermissionAssignment, FetchError>;

    /// Subscription document of an organization
    async fn subscription(&self, organization_id: &OrganizationId) -> Result<SubscriptionDocument, FetchError>;

    /// Tier catalog (all tiers the backend currently offers)
    async fn tier_catalog(&self) -> Result<Vec<TierDefinition>, FetchError>;
}
