/// Authentication gate: bearer extraction and request extractors
use crate::{
    context::AppContext,
    error::{YamoError, YamoResult},
    permission::{self, Principal, TeamClaim},
    token::Claims,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Authenticated context - resolved principal plus the token's team claim
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub team: TeamClaim,
    pub claims: Claims,
}

impl AuthContext {
    /// Decode the credential and re-verify it against the live user record.
    ///
    /// One persistence lookup per request: defends against users renamed or
    /// deleted after token issuance, and against superseded token versions.
    pub async fn resolve(ctx: &AppContext, headers: &HeaderMap) -> YamoResult<Self> {
        let token = extract_bearer_token(headers).ok_or_else(|| {
            YamoError::Unauthenticated("Missing authorization header".to_string())
        })?;

        let claims = ctx.codec.decode(&token)?;

        let user = ctx
            .users
            .verify_identity(claims.sub, &claims.username, claims.ver)
            .await?;

        Ok(AuthContext {
            principal: Principal {
                user_id: user.id,
                username: user.username,
                is_superadmin: user.is_superadmin,
            },
            team: claims.team.clone(),
            claims,
        })
    }

    /// The active team id, or Unauthorized when no team is selected
    pub fn require_team(&self) -> YamoResult<i64> {
        self.team
            .team_id()
            .ok_or_else(|| YamoError::Unauthorized("No team selected".to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = YamoError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        Self::resolve(state, &parts.headers).await
    }
}

/// Superadmin context - requires the global superadmin flag
///
/// Superadmin gates the admin dashboard only; team-scoped data still requires
/// a membership row, which this extractor deliberately does not look up.
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub principal: Principal,
}

impl AdminAuthContext {
    pub async fn resolve(ctx: &AppContext, headers: &HeaderMap) -> YamoResult<Self> {
        let auth = AuthContext::resolve(ctx, headers).await?;

        if !permission::admin_surface(&auth.principal) {
            tracing::warn!(
                user = %auth.principal.username,
                "superadmin surface denied"
            );
            return Err(YamoError::Unauthorized(
                "Superadmin role required".to_string(),
            ));
        }

        Ok(AdminAuthContext {
            principal: auth.principal,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = YamoError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        Self::resolve(state, &parts.headers).await
    }
}
