/// Team roles and effective-permission derivation
use crate::error::{YamoError, YamoResult};
use serde::{Deserialize, Serialize};

/// Role a user holds within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Can view only, no mutations
    Viewer,
    /// Can create and edit book data
    Collaborator,
    /// Full control of the team: members, books, roles
    Admin,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Viewer => "viewer",
            TeamRole::Collaborator => "collaborator",
            TeamRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> YamoResult<Self> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(TeamRole::Viewer),
            "collaborator" => Ok(TeamRole::Collaborator),
            "admin" => Ok(TeamRole::Admin),
            _ => Err(YamoError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Check if this role can perform actions requiring another role
    pub fn can_act_as(&self, required: TeamRole) -> bool {
        self >= &required
    }
}

/// Resolved identity for a request or session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub is_superadmin: bool,
}

/// The team portion of a session token
///
/// Tagged union so that "a selected team always carries a role" holds by
/// construction rather than by optional-field discipline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TeamClaim {
    NoTeam,
    Selected {
        team_id: i64,
        team_name: String,
        role: TeamRole,
    },
}

impl Default for TeamClaim {
    fn default() -> Self {
        TeamClaim::NoTeam
    }
}

impl TeamClaim {
    pub fn team_id(&self) -> Option<i64> {
        match self {
            TeamClaim::NoTeam => None,
            TeamClaim::Selected { team_id, .. } => Some(*team_id),
        }
    }

    pub fn role(&self) -> Option<TeamRole> {
        match self {
            TeamClaim::NoTeam => None,
            TeamClaim::Selected { role, .. } => Some(*role),
        }
    }
}

/// Derived permission triple for the active context; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub is_admin: bool,
    pub can_write: bool,
    pub can_view: bool,
}

impl EffectivePermission {
    pub const NONE: EffectivePermission = EffectivePermission {
        is_admin: false,
        can_write: false,
        can_view: false,
    };

    pub fn from_role(role: TeamRole) -> Self {
        match role {
            TeamRole::Admin => EffectivePermission {
                is_admin: true,
                can_write: true,
                can_view: true,
            },
            TeamRole::Collaborator => EffectivePermission {
                is_admin: false,
                can_write: true,
                can_view: true,
            },
            TeamRole::Viewer => EffectivePermission {
                is_admin: false,
                can_write: false,
                can_view: true,
            },
        }
    }
}

/// Compute the effective permission for team-scoped surfaces.
///
/// `live_membership` is the authoritative role lookup for the claimed team:
/// - `Some(Some(role))`: live roster knows the user; the live role wins over
///   whatever the token claims (handles demotion after token issuance).
/// - `Some(None)`: live roster no longer contains the user; all flags drop.
/// - `None`: no lookup available; fall back to the token claim. Call sites
///   passing `None` accept stale-role reads until the next roster fetch.
///
/// Superadmin carries no implicit team permission: team surfaces require a
/// membership row like anyone else. Superadmin gating for the admin dashboard
/// is a separate check, `admin_surface`.
pub fn evaluate(
    _principal: &Principal,
    claim: &TeamClaim,
    live_membership: Option<Option<TeamRole>>,
) -> EffectivePermission {
    let role = match live_membership {
        Some(Some(role)) => Some(role),
        Some(None) => None,
        None => claim.role(),
    };

    // A role is only meaningful while a team is actually selected.
    if claim.team_id().is_none() {
        return EffectivePermission::NONE;
    }

    match role {
        Some(role) => EffectivePermission::from_role(role),
        None => EffectivePermission::NONE,
    }
}

/// Whether the principal may use admin-dashboard surfaces
pub fn admin_surface(principal: &Principal) -> bool {
    principal.is_superadmin
}
