/// Team endpoints: creation, roster, role management, delete lifecycle
use crate::{
    auth::{AdminAuthContext, AuthContext},
    context::AppContext,
    db::models::{Team, TeamMembership},
    error::{YamoError, YamoResult},
    permission::TeamRole,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/teams", post(create_team))
        .route("/teams/:id/users", get(roster))
        .route("/teams/:id/users/:user_id", post(add_member).delete(remove_member))
        .route("/teams/:id/users/:user_id/role", put(set_role))
        .route("/teams/:id", delete(soft_delete_team))
        .route("/teams/:id/restore", post(restore_team))
        .route("/teams/:id/hard", delete(hard_delete_team))
}

/// Require a live role in the team at or above `required`.
///
/// The live membership lookup wins over the token claim: a demotion takes
/// effect here even if the caller's claim still says otherwise.
async fn require_role(
    ctx: &AppContext,
    auth: &AuthContext,
    team_id: i64,
    required: TeamRole,
) -> YamoResult<TeamRole> {
    let role = ctx
        .memberships
        .role_for(auth.principal.user_id, team_id)
        .await?
        .ok_or_else(|| YamoError::Unauthorized("Not a member of this team".to_string()))?;

    if !role.can_act_as(required) {
        return Err(YamoError::Unauthorized(format!(
            "Requires {} role or higher",
            required.as_str()
        )));
    }

    Ok(role)
}

#[derive(Debug, Deserialize)]
struct CreateTeamRequest {
    name: String,
}

/// `POST /teams` - any authenticated user; the creator becomes team admin
async fn create_team(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateTeamRequest>,
) -> YamoResult<Json<Team>> {
    let team = ctx.teams.create_team(&req.name).await?;
    ctx.memberships
        .add_member(team.id, auth.principal.user_id, TeamRole::Admin)
        .await?;

    tracing::info!(user = %auth.principal.username, team = %team.name, "team created");
    Ok(Json(team))
}

/// `GET /teams/:id/users` - roster for permission derivation.
/// Any member may read it; superadmins may read it for the admin dashboard.
async fn roster(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(team_id): Path<i64>,
) -> YamoResult<Json<Vec<TeamMembership>>> {
    let is_member = ctx
        .memberships
        .role_for(auth.principal.user_id, team_id)
        .await?
        .is_some();

    if !is_member && !auth.principal.is_superadmin {
        return Err(YamoError::Unauthorized(
            "Not a member of this team".to_string(),
        ));
    }

    let roster = ctx.memberships.roster(team_id).await?;
    Ok(Json(roster))
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    role: TeamRole,
}

/// `POST /teams/:id/users/:user_id` - add a member (team admin)
async fn add_member(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((team_id, user_id)): Path<(i64, i64)>,
    Json(req): Json<RoleRequest>,
) -> YamoResult<Json<Vec<TeamMembership>>> {
    require_role(&ctx, &auth, team_id, TeamRole::Admin).await?;

    ctx.users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| YamoError::NotFound(format!("User {} not found", user_id)))?;

    ctx.memberships.add_member(team_id, user_id, req.role).await?;
    Ok(Json(ctx.memberships.roster(team_id).await?))
}

/// `PUT /teams/:id/users/:user_id/role` - change a member's role (team admin).
/// Outstanding tokens of the affected user are invalidated via version bump.
async fn set_role(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((team_id, user_id)): Path<(i64, i64)>,
    Json(req): Json<RoleRequest>,
) -> YamoResult<Json<Vec<TeamMembership>>> {
    require_role(&ctx, &auth, team_id, TeamRole::Admin).await?;

    ctx.memberships
        .set_role(team_id, user_id, req.role, &ctx.users)
        .await?;

    tracing::info!(
        team_id,
        user_id,
        role = req.role.as_str(),
        by = %auth.principal.username,
        "role changed"
    );
    Ok(Json(ctx.memberships.roster(team_id).await?))
}

/// `DELETE /teams/:id/users/:user_id` - remove a member (team admin)
async fn remove_member(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((team_id, user_id)): Path<(i64, i64)>,
) -> YamoResult<Json<Vec<TeamMembership>>> {
    require_role(&ctx, &auth, team_id, TeamRole::Admin).await?;

    ctx.memberships
        .remove_member(team_id, user_id, &ctx.users)
        .await?;
    Ok(Json(ctx.memberships.roster(team_id).await?))
}

/// `DELETE /teams/:id` - soft delete (team admin)
async fn soft_delete_team(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(team_id): Path<i64>,
) -> YamoResult<Json<serde_json::Value>> {
    require_role(&ctx, &auth, team_id, TeamRole::Admin).await?;

    ctx.teams.soft_delete_team(team_id).await?;
    Ok(Json(serde_json::json!({ "deleted": team_id })))
}

/// `POST /teams/:id/restore` - clear the soft-delete timestamp.
///
/// The normal role lookup cannot see soft-deleted teams, so this checks the
/// raw membership row instead.
async fn restore_team(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(team_id): Path<i64>,
) -> YamoResult<Json<serde_json::Value>> {
    let role = ctx
        .memberships
        .role_for_any(auth.principal.user_id, team_id)
        .await?;

    let allowed = auth.principal.is_superadmin || role == Some(TeamRole::Admin);
    if !allowed {
        return Err(YamoError::Unauthorized(
            "Requires admin role or higher".to_string(),
        ));
    }

    ctx.teams.restore_team(team_id).await?;
    Ok(Json(serde_json::json!({ "restored": team_id })))
}

/// `DELETE /teams/:id/hard` - permanent removal, superadmin only
async fn hard_delete_team(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(team_id): Path<i64>,
) -> YamoResult<Json<serde_json::Value>> {
    ctx.teams.hard_delete_team(team_id).await?;

    tracing::warn!(team_id, by = %admin.principal.username, "team hard-deleted");
    Ok(Json(serde_json::json!({ "deleted": team_id })))
}
