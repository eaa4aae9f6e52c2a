/// User endpoints: login, identity re-validation, team selection
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::TeamMembership,
    error::{YamoError, YamoResult},
    permission::{Principal, TeamClaim, TeamRole},
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users/login", post(login))
        .route("/users/me", get(me))
        .route("/users/me/teams", get(my_teams))
        .route("/users/select-team", post(select_team))
        .route("/users/exit-team", post(exit_team))
}

/// Public view of a user, password hash omitted
#[derive(Debug, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub is_superadmin: bool,
}

impl From<&Principal> for UserView {
    fn from(p: &Principal) -> Self {
        UserView {
            id: p.user_id,
            username: p.username.clone(),
            is_superadmin: p.is_superadmin,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

/// `POST /users/login` - issue a base token with no team claim
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> YamoResult<Json<LoginResponse>> {
    let user = ctx.users.login(&req.username, &req.password).await?;

    let principal = Principal {
        user_id: user.id,
        username: user.username.clone(),
        is_superadmin: user.is_superadmin,
    };
    let token = ctx
        .codec
        .issue(&principal, TeamClaim::NoTeam, user.token_version)?;

    tracing::info!(user = %user.username, "login");

    Ok(Json(LoginResponse {
        token,
        user: UserView::from(&principal),
    }))
}

/// Identity plus the token's active team claim, as the server sees them
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserView,
    pub team: TeamClaim,
}

/// `GET /users/me` - used by clients to re-validate a persisted token.
/// Echoes the team claim so a restarting client can rebuild its context
/// without decoding the token itself.
async fn me(auth: AuthContext) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserView::from(&auth.principal),
        team: auth.team,
    })
}

/// `GET /users/me/teams`
async fn my_teams(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> YamoResult<Json<Vec<TeamMembership>>> {
    let teams = ctx.memberships.teams_for(auth.principal.user_id).await?;
    Ok(Json(teams))
}

#[derive(Debug, Deserialize)]
struct SelectTeamRequest {
    team_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectTeamResponse {
    pub token: String,
    pub team_id: i64,
    pub team_name: String,
    pub role: TeamRole,
}

/// `POST /users/select-team` - re-validate membership and sign a fresh token
/// embedding the team claim.
///
/// Superadmins get no bypass here: team data always requires membership.
async fn select_team(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<SelectTeamRequest>,
) -> YamoResult<Json<SelectTeamResponse>> {
    let role = ctx
        .memberships
        .role_for(auth.principal.user_id, req.team_id)
        .await?
        .ok_or_else(|| YamoError::Unauthorized("Not a member of this team".to_string()))?;

    let team = ctx
        .teams
        .find_team(req.team_id)
        .await?
        .ok_or_else(|| YamoError::NotFound(format!("Team {} not found", req.team_id)))?;

    let claim = TeamClaim::Selected {
        team_id: team.id,
        team_name: team.name.clone(),
        role,
    };
    let token = ctx.codec.issue(&auth.principal, claim, auth.claims.ver)?;

    tracing::info!(
        user = %auth.principal.username,
        team = %team.name,
        role = role.as_str(),
        "team selected"
    );

    Ok(Json(SelectTeamResponse {
        token,
        team_id: team.id,
        team_name: team.name,
        role,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExitTeamResponse {
    pub token: String,
}

/// `POST /users/exit-team` - re-issue the token without a team claim
async fn exit_team(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> YamoResult<Json<ExitTeamResponse>> {
    let token = ctx
        .codec
        .issue(&auth.principal, TeamClaim::NoTeam, auth.claims.ver)?;

    Ok(Json(ExitTeamResponse { token }))
}
