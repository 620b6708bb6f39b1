//! Permission vocabulary and the resolved per-context permission assignment.
//!
//! Actions and roles are closed sets known at build time. Tokens the backend
//! sends that this build does not know are dropped while decoding, never
//! mapped onto a known value.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Whether an action applies to the whole organization or to a single stable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionScope {
    Organization,
    Stable,
}

/// Capability token checked before a UI affordance is shown or an action is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionAction {
    // ===== Organization scoped =====
    ManageOrgSettings,
    ManageBilling,
    ManageInvoices,
    ViewInvoices,
    ManageMembers,
    ManageStables,
    ViewReports,

    // ===== Stable scoped =====
    ManageHorses,
    ViewHorses,
    ManageLessons,
    ManageSchedules,
    ManageFeeding,
    ManageHealthRecords,
    ManageFacilities,
}

impl PermissionAction {
    pub const ALL: [Self; 14] = [
        Self::ManageOrgSettings,
        Self::ManageBilling,
        Self::ManageInvoices,
        Self::ViewInvoices,
        Self::ManageMembers,
        Self::ManageStables,
        Self::ViewReports,
        Self::ManageHorses,
        Self::ViewHorses,
        Self::ManageLessons,
        Self::ManageSchedules,
        Self::ManageFeeding,
        Self::ManageHealthRecords,
        Self::ManageFacilities,
    ];

    #[must_use]
    pub const fn scope(&self) -> ActionScope {
        match self {
            Self::ManageOrgSettings
            | Self::ManageBilling
            | Self::ManageInvoices
            | Self::ViewInvoices
            | Self::ManageMembers
            | Self::ManageStables
            | Self::ViewReports => ActionScope::Organization,
            Self::ManageHorses
            | Self::ViewHorses
            | Self::ManageLessons
            | Self::ManageSchedules
            | Self::ManageFeeding
            | Self::ManageHealthRecords
            | Self::ManageFacilities => ActionScope::Stable,
        }
    }

    #[must_use]
    pub const fn is_organization_scoped(&self) -> bool {
        matches!(self.scope(), ActionScope::Organization)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManageOrgSettings => "manage-org-settings",
            Self::ManageBilling => "manage-billing",
            Self::ManageInvoices => "manage-invoices",
            Self::ViewInvoices => "view-invoices",
            Self::ManageMembers => "manage-members",
            Self::ManageStables => "manage-stables",
            Self::ViewReports => "view-reports",
            Self::ManageHorses => "manage-horses",
            Self::ViewHorses => "view-horses",
            Self::ManageLessons => "manage-lessons",
            Self::ManageSchedules => "manage-schedules",
            Self::ManageFeeding => "manage-feeding",
            Self::ManageHealthRecords => "manage-health-records",
            Self::ManageFacilities => "manage-facilities",
        }
    }
}

impl FromStr for PermissionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("Unknown permission action: {s}"))
    }
}

impl std::fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organization role held by a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationRole {
    Owner,
    Administrator,
    Manager,
    Staff,
    Trainer,
    Member,
    Customer,
}

impl FromStr for OrganizationRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "administrator" => Ok(Self::Administrator),
            "manager" => Ok(Self::Manager),
            "staff" => Ok(Self::Staff),
            "trainer" => Ok(Self::Trainer),
            "member" => Ok(Self::Member),
            "customer" => Ok(Self::Customer),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

impl std::fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Administrator => write!(f, "administrator"),
            Self::Manager => write!(f, "manager"),
            Self::Staff => write!(f, "staff"),
            Self::Trainer => write!(f, "trainer"),
            Self::Member => write!(f, "member"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

/// Resolved permissions of the active principal within its organization/stable.
///
/// Fetched as a whole and replaced as a whole; never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PermissionAssignmentRecord")]
pub struct PermissionAssignment {
    pub roles: HashSet<OrganizationRole>,
    pub granted_actions: HashSet<PermissionAction>,
    pub is_org_owner: bool,
    pub is_system_admin: bool,
}

impl PermissionAssignment {
    /// Apply the bypass rules in order: system admin, owner on
    /// organization-scoped actions, explicit grant, default deny.
    #[must_use]
    pub fn allows(&self, action: PermissionAction) -> bool {
        if self.is_system_admin {
            return true;
        }
        if self.is_org_owner && action.is_organization_scoped() {
            return true;
        }
        self.granted_actions.contains(&action)
    }

    #[must_use]
    pub fn has_role(&self, role: OrganizationRole) -> bool {
        self.roles.contains(&role)
    }

    #[must_use]
    pub fn has_any_role(&self, roles: &[OrganizationRole]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}

/// Wire shape of the assignment, with tokens still as strings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PermissionAssignmentRecord {
    roles: Vec<String>,
    granted_actions: Vec<String>,
    is_org_owner: bool,
    is_system_admin: bool,
}

impl From<PermissionAssignmentRecord> for PermissionAssignment {
    fn from(record: PermissionAssignmentRecord) -> Self {
        let roles = record
            .roles
            .iter()
            .filter_map(|raw| match raw.parse() {
                Ok(role) => Some(role),
                Err(_) => {
                    tracing::debug!(role = %raw, "Ignoring unknown organization role");
                    None
                }
            })
            .collect();
        let granted_actions = record
            .granted_actions
            .iter()
            .filter_map(|raw| match raw.parse() {
                Ok(action) => Some(action),
                Err(_) => {
                    tracing::debug!(action = %raw, "Ignoring unknown permission action");
                    None
                }
            })
            .collect();

        Self {
            roles,
            granted_actions,
            is_org_owner: record.is_org_owner,
            is_system_admin: record.is_system_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(actions: &[PermissionAction]) -> PermissionAssignment {
        PermissionAssignment {
            granted_actions: actions.iter().copied().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_action_tokens_round_trip_through_from_str() {
        for action in PermissionAction::ALL {
            assert_eq!(action.as_str().parse::<PermissionAction>().unwrap(), action);
        }
        assert!("manage-everything".parse::<PermissionAction>().is_err());
    }

    #[test]
    fn test_serde_token_matches_as_str() {
        let json = serde_json::to_string(&PermissionAction::ManageHealthRecords).unwrap();
        assert_eq!(json, "\"manage-health-records\"");
    }

    #[test]
    fn test_explicit_grant() {
        let perms = assignment(&[PermissionAction::ManageHorses]);
        assert!(perms.allows(PermissionAction::ManageHorses));
        assert!(!perms.allows(PermissionAction::ManageBilling));
    }

    #[test]
    fn test_no_grant_no_flags_denies_everything() {
        let perms = PermissionAssignment::default();
        for action in PermissionAction::ALL {
            assert!(!perms.allows(action), "{action} should be denied");
        }
    }

    #[test]
    fn test_system_admin_bypasses_all() {
        let perms = PermissionAssignment {
            is_system_admin: true,
            ..Default::default()
        };
        for action in PermissionAction::ALL {
            assert!(perms.allows(action));
        }
    }

    #[test]
    fn test_owner_bypass_limited_to_organization_scope() {
        let perms = PermissionAssignment {
            is_org_owner: true,
            ..Default::default()
        };
        assert!(perms.allows(PermissionAction::ManageBilling));
        assert!(perms.allows(PermissionAction::ManageOrgSettings));
        assert!(!perms.allows(PermissionAction::ManageFeeding));

        let mut perms = perms;
        perms.granted_actions.insert(PermissionAction::ManageFeeding);
        assert!(perms.allows(PermissionAction::ManageFeeding));
    }

    #[test]
    fn test_decode_drops_unknown_tokens() {
        let json = r#"{
            "roles": ["owner", "groom"],
            "grantedActions": ["manage-horses", "teleport-horses"],
            "isOrgOwner": true
        }"#;
        let perms: PermissionAssignment = serde_json::from_str(json).unwrap();
        assert_eq!(perms.roles.len(), 1);
        assert!(perms.has_role(OrganizationRole::Owner));
        assert_eq!(perms.granted_actions.len(), 1);
        assert!(perms.is_org_owner);
        assert!(!perms.is_system_admin);
    }

    #[test]
    fn test_has_any_role() {
        let perms = PermissionAssignment {
            roles: [OrganizationRole::Staff].into_iter().collect(),
            ..Default::default()
        };
        assert!(perms.has_any_role(&[OrganizationRole::Owner, OrganizationRole::Staff]));
        assert!(!perms.has_any_role(&[OrganizationRole::Owner]));
        assert!(!perms.has_any_role(&[]));
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Administrator".parse::<OrganizationRole>().unwrap(), OrganizationRole::Administrator);
        assert!("groom".parse::<OrganizationRole>().is_err());
    }
}
