use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub const fn from_string(id: String) -> Self {
                Self(id)
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Authenticated user identifier, as issued by the backend
    UserId
);

string_id!(
    /// Organization identifier
    OrganizationId
);

string_id!(
    /// Stable identifier, scoped to an organization
    StableId
);

/// The active authenticated user plus the selected organization and stable.
///
/// A user may belong to several organizations and stables; exactly one of
/// each is active at a time. Replaced only through
/// [`EntitlementService::on_context_changed`](crate::service::EntitlementService::on_context_changed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub stable_id: Option<StableId>,
}

impl Principal {
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, organization_id: impl Into<OrganizationId>) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: organization_id.into(),
            stable_id: None,
        }
    }

    #[must_use]
    pub fn with_stable(mut self, stable_id: impl Into<StableId>) -> Self {
        self.stable_id = Some(stable_id.into());
        self
    }

    /// Cache key of the permission assignment for this context
    #[must_use]
    pub fn permission_key(&self) -> PermissionKey {
        PermissionKey {
            user_id: self.user_id.clone(),
            organization_id: self.organization_id.clone(),
            stable_id: self.stable_id.clone(),
        }
    }
}

/// Identifies one permission-assignment document: (user, organization, stable)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionKey {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub stable_id: Option<StableId>,
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.stable_id {
            Some(stable) => write!(f, "{}:{}:{}", self.organization_id, stable, self.user_id),
            None => write!(f, "{}:{}", self.organization_id, self.user_id),
        }
    }
}
