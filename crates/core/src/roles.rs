//! Roles and the static role → permission table.
//!
//! Role names must match the `CHECK` constraint on `users.role` in
//! `20260301000001_create_users.sql`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_DEVELOPER: &str = "developer";
pub const ROLE_BILLING: &str = "billing";
pub const ROLE_VIEWER: &str = "viewer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Developer,
    Billing,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Developer, Role::Billing, Role::Viewer];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Developer => ROLE_DEVELOPER,
            Role::Billing => ROLE_BILLING,
            Role::Viewer => ROLE_VIEWER,
        }
    }

    pub fn permissions(self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Admin => &[
                DashboardView,
                UsageView,
                LogsView,
                AlertsView,
                AlertsManage,
                ApiKeysView,
                ApiKeysCreate,
                ApiKeysDelete,
                BillingView,
                BillingManage,
                TeamView,
                ShareCreate,
                ShareManage,
                UsersView,
                UsersManage,
            ],
            Role::Developer => &[
                DashboardView,
                UsageView,
                LogsView,
                AlertsView,
                AlertsManage,
                ApiKeysView,
                ApiKeysCreate,
                TeamView,
                ShareCreate,
            ],
            Role::Billing => &[
                DashboardView,
                UsageView,
                AlertsView,
                BillingView,
                BillingManage,
                TeamView,
                ShareCreate,
            ],
            Role::Viewer => &[DashboardView, UsageView, AlertsView, TeamView],
        }
    }

    pub fn has_permission(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROLE_ADMIN => Ok(Role::Admin),
            ROLE_DEVELOPER => Ok(Role::Developer),
            ROLE_BILLING => Ok(Role::Billing),
            ROLE_VIEWER => Ok(Role::Viewer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Fine-grained capability, rendered as `resource:action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    DashboardView,
    UsageView,
    LogsView,
    AlertsView,
    AlertsManage,
    ApiKeysView,
    ApiKeysCreate,
    ApiKeysDelete,
    BillingView,
    BillingManage,
    TeamView,
    ShareCreate,
    ShareManage,
    UsersView,
    UsersManage,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::DashboardView => "dashboard:view",
            Permission::UsageView => "usage:view",
            Permission::LogsView => "logs:view",
            Permission::AlertsView => "alerts:view",
            Permission::AlertsManage => "alerts:manage",
            Permission::ApiKeysView => "api_keys:view",
            Permission::ApiKeysCreate => "api_keys:create",
            Permission::ApiKeysDelete => "api_keys:delete",
            Permission::BillingView => "billing:view",
            Permission::BillingManage => "billing:manage",
            Permission::TeamView => "team:view",
            Permission::ShareCreate => "share:create",
            Permission::ShareManage => "share:manage",
            Permission::UsersView => "users:view",
            Permission::UsersManage => "users:manage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that carries a role.
pub trait HasRole {
    fn role(&self) -> Role;
}

impl HasRole for Role {
    fn role(&self) -> Role {
        *self
    }
}

/// Pure lookup in the static permission table.
pub fn has_permission(subject: &impl HasRole, permission: Permission) -> bool {
    subject.role().has_permission(permission)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_cannot_manage_users() {
        assert!(!has_permission(&Role::Viewer, Permission::UsersManage));
        assert!(has_permission(&Role::Admin, Permission::UsersManage));
    }

    #[test]
    fn every_role_can_view_dashboard() {
        for role in Role::ALL {
            assert!(
                role.has_permission(Permission::DashboardView),
                "{role} must be able to view the dashboard"
            );
        }
    }

    #[test]
    fn only_admin_manages_shares_and_users() {
        for role in Role::ALL {
            let expected = role == Role::Admin;
            assert_eq!(role.has_permission(Permission::ShareManage), expected);
            assert_eq!(role.has_permission(Permission::UsersView), expected);
        }
    }

    #[test]
    fn billing_role_scope() {
        assert!(Role::Billing.has_permission(Permission::BillingManage));
        assert!(!Role::Billing.has_permission(Permission::ApiKeysCreate));
        assert!(!Role::Developer.has_permission(Permission::BillingView));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn permission_strings() {
        assert_eq!(Permission::UsersManage.to_string(), "users:manage");
        assert_eq!(Permission::ApiKeysCreate.as_str(), "api_keys:create");
    }
}
