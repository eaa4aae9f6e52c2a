/// User and team-membership stores
///
/// The membership table is the authoritative source of truth for roles; token
/// claims are a cached copy of it. Every mutation here bumps the affected
/// user's token version so stale claims die at the auth gate.
use crate::{
    db::models::{TeamMembership, User},
    error::{YamoError, YamoResult},
    permission::TeamRole,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// User persistence and credential verification
#[derive(Clone)]
pub struct UserStore {
    db: SqlitePool,
}

impl UserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a user with an argon2-hashed password
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        is_superadmin: bool,
    ) -> YamoResult<User> {
        if username.trim().is_empty() {
            return Err(YamoError::Validation("Username must not be empty".to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| YamoError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, is_superadmin, token_version, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(is_superadmin)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                YamoError::Conflict(format!("Username {} already taken", username))
            }
            other => YamoError::Database(other),
        })?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            password_hash,
            is_superadmin,
            token_version: 0,
            created_at: now,
        })
    }

    /// Verify credentials, returning the user on success
    pub async fn login(&self, username: &str, password: &str) -> YamoResult<User> {
        let user = self
            .find_by_username(username)
            .await?
            .ok_or_else(|| YamoError::InvalidCredential("Invalid credentials".to_string()))?;

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| YamoError::Internal(format!("Corrupt password hash: {}", e)))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| YamoError::InvalidCredential("Invalid credentials".to_string()))?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: i64) -> YamoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, is_superadmin, token_version, created_at
             FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> YamoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, is_superadmin, token_version, created_at
             FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// Re-verify that a token's identity claims still describe a live user.
    ///
    /// Rejects renamed and deleted users, and tokens whose embedded version
    /// lags the stored one (role changed since issuance).
    pub async fn verify_identity(
        &self,
        user_id: i64,
        username: &str,
        token_version: i64,
    ) -> YamoResult<User> {
        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| YamoError::InvalidCredential("User no longer exists".to_string()))?;

        if user.username != username {
            return Err(YamoError::InvalidCredential(
                "Token identity does not match user record".to_string(),
            ));
        }

        if user.token_version != token_version {
            return Err(YamoError::InvalidCredential(
                "Token has been superseded".to_string(),
            ));
        }

        Ok(user)
    }

    /// Invalidate every outstanding token for a user
    pub async fn bump_token_version(&self, user_id: i64) -> YamoResult<()> {
        sqlx::query("UPDATE users SET token_version = token_version + 1 WHERE id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

/// Team-membership persistence
#[derive(Clone)]
pub struct MembershipStore {
    db: SqlitePool,
}

impl MembershipStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Role the user holds in the team, if any. Soft-deleted teams count as
    /// having no members.
    pub async fn role_for(&self, user_id: i64, team_id: i64) -> YamoResult<Option<TeamRole>> {
        let row = sqlx::query(
            "SELECT tu.role FROM team_users tu
             JOIN teams t ON t.id = tu.team_id
             WHERE tu.user_id = ?1 AND tu.team_id = ?2 AND t.deleted_at IS NULL",
        )
        .bind(user_id)
        .bind(team_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let role_str: String = row.get("role");
                Ok(Some(TeamRole::from_str(&role_str)?))
            }
            None => Ok(None),
        }
    }

    /// Role lookup that still sees soft-deleted teams. Used only by restore,
    /// where the team is deleted by definition.
    pub async fn role_for_any(&self, user_id: i64, team_id: i64) -> YamoResult<Option<TeamRole>> {
        let row = sqlx::query(
            "SELECT role FROM team_users WHERE user_id = ?1 AND team_id = ?2",
        )
        .bind(user_id)
        .bind(team_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let role_str: String = row.get("role");
                Ok(Some(TeamRole::from_str(&role_str)?))
            }
            None => Ok(None),
        }
    }

    /// All memberships of a team (the roster)
    pub async fn roster(&self, team_id: i64) -> YamoResult<Vec<TeamMembership>> {
        let rows = sqlx::query(
            "SELECT tu.team_id, t.name AS team_name, tu.user_id, u.username, tu.role
             FROM team_users tu
             JOIN teams t ON t.id = tu.team_id
             JOIN users u ON u.id = tu.user_id
             WHERE tu.team_id = ?1 AND t.deleted_at IS NULL
             ORDER BY u.username",
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::membership_from_row).collect()
    }

    /// All teams a user belongs to
    pub async fn teams_for(&self, user_id: i64) -> YamoResult<Vec<TeamMembership>> {
        let rows = sqlx::query(
            "SELECT tu.team_id, t.name AS team_name, tu.user_id, u.username, tu.role
             FROM team_users tu
             JOIN teams t ON t.id = tu.team_id
             JOIN users u ON u.id = tu.user_id
             WHERE tu.user_id = ?1 AND t.deleted_at IS NULL
             ORDER BY t.name",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::membership_from_row).collect()
    }

    /// Add a member to a team
    pub async fn add_member(
        &self,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
    ) -> YamoResult<()> {
        if self.role_for(user_id, team_id).await?.is_some() {
            return Err(YamoError::Conflict(
                "User is already a member of this team".to_string(),
            ));
        }

        sqlx::query(
            "INSERT INTO team_users (team_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Change a member's role; takes effect on the member's next token issuance
    /// and, via the version bump, kills their outstanding tokens immediately.
    pub async fn set_role(
        &self,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
        users: &UserStore,
    ) -> YamoResult<()> {
        let result = sqlx::query(
            "UPDATE team_users SET role = ?1 WHERE team_id = ?2 AND user_id = ?3",
        )
        .bind(role.as_str())
        .bind(team_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(YamoError::NotFound(format!(
                "No membership for user {} in team {}",
                user_id, team_id
            )));
        }

        users.bump_token_version(user_id).await?;
        Ok(())
    }

    /// Remove a member from a team
    pub async fn remove_member(
        &self,
        team_id: i64,
        user_id: i64,
        users: &UserStore,
    ) -> YamoResult<()> {
        let result = sqlx::query("DELETE FROM team_users WHERE team_id = ?1 AND user_id = ?2")
            .bind(team_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(YamoError::NotFound(format!(
                "No membership for user {} in team {}",
                user_id, team_id
            )));
        }

        users.bump_token_version(user_id).await?;
        Ok(())
    }

    fn membership_from_row(row: sqlx::sqlite::SqliteRow) -> YamoResult<TeamMembership> {
        let role_str: String = row.get("role");
        Ok(TeamMembership {
            team_id: row.get("team_id"),
            team_name: row.get("team_name"),
            user_id: row.get("user_id"),
            username: row.get("username"),
            role: TeamRole::from_str(&role_str)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn seed_team(db: &SqlitePool, name: &str) -> i64 {
        sqlx::query("INSERT INTO teams (name, created_at) VALUES (?1, ?2)")
            .bind(name)
            .bind(Utc::now())
            .execute(db)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_create_and_login() {
        let db = test_pool().await;
        let users = UserStore::new(db);

        let user = users.create_user("mittens", "hunter2", false).await.unwrap();
        assert!(!user.is_superadmin);
        assert_eq!(user.token_version, 0);

        let logged_in = users.login("mittens", "hunter2").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            users.login("mittens", "wrong").await,
            Err(YamoError::InvalidCredential(_))
        ));
        assert!(matches!(
            users.login("nobody", "hunter2").await,
            Err(YamoError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let db = test_pool().await;
        let users = UserStore::new(db);

        users.create_user("mittens", "a", false).await.unwrap();
        assert!(matches!(
            users.create_user("mittens", "b", false).await,
            Err(YamoError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_identity_rejects_stale_version() {
        let db = test_pool().await;
        let users = UserStore::new(db);
        let user = users.create_user("mittens", "hunter2", false).await.unwrap();

        users
            .verify_identity(user.id, "mittens", 0)
            .await
            .unwrap();

        users.bump_token_version(user.id).await.unwrap();

        assert!(matches!(
            users.verify_identity(user.id, "mittens", 0).await,
            Err(YamoError::InvalidCredential(_))
        ));
        users.verify_identity(user.id, "mittens", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_identity_rejects_rename_and_deletion() {
        let db = test_pool().await;
        let users = UserStore::new(db.clone());
        let user = users.create_user("mittens", "hunter2", false).await.unwrap();

        assert!(matches!(
            users.verify_identity(user.id, "whiskers", 0).await,
            Err(YamoError::InvalidCredential(_))
        ));
        assert!(matches!(
            users.verify_identity(user.id + 1, "mittens", 0).await,
            Err(YamoError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_membership_lifecycle() {
        let db = test_pool().await;
        let users = UserStore::new(db.clone());
        let memberships = MembershipStore::new(db.clone());

        let user = users.create_user("mittens", "x", false).await.unwrap();
        let team = seed_team(&db, "Household").await;

        assert_eq!(memberships.role_for(user.id, team).await.unwrap(), None);

        memberships
            .add_member(team, user.id, TeamRole::Viewer)
            .await
            .unwrap();
        assert_eq!(
            memberships.role_for(user.id, team).await.unwrap(),
            Some(TeamRole::Viewer)
        );

        // One role per (team, user)
        assert!(matches!(
            memberships.add_member(team, user.id, TeamRole::Admin).await,
            Err(YamoError::Conflict(_))
        ));

        memberships
            .set_role(team, user.id, TeamRole::Admin, &users)
            .await
            .unwrap();
        assert_eq!(
            memberships.role_for(user.id, team).await.unwrap(),
            Some(TeamRole::Admin)
        );

        // Role change invalidated outstanding tokens
        let refreshed = users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(refreshed.token_version, 1);

        memberships.remove_member(team, user.id, &users).await.unwrap();
        assert_eq!(memberships.role_for(user.id, team).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_soft_deleted_team_hides_memberships() {
        let db = test_pool().await;
        let users = UserStore::new(db.clone());
        let memberships = MembershipStore::new(db.clone());

        let user = users.create_user("mittens", "x", false).await.unwrap();
        let team = seed_team(&db, "Household").await;
        memberships
            .add_member(team, user.id, TeamRole::Admin)
            .await
            .unwrap();

        sqlx::query("UPDATE teams SET deleted_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(team)
            .execute(&db)
            .await
            .unwrap();

        assert_eq!(memberships.role_for(user.id, team).await.unwrap(), None);
        assert!(memberships.teams_for(user.id).await.unwrap().is_empty());
        assert!(memberships.roster(team).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roster_lists_all_members() {
        let db = test_pool().await;
        let users = UserStore::new(db.clone());
        let memberships = MembershipStore::new(db.clone());

        let a = users.create_user("alice", "x", false).await.unwrap();
        let b = users.create_user("bob", "x", false).await.unwrap();
        let team = seed_team(&db, "Household").await;

        memberships.add_member(team, a.id, TeamRole::Admin).await.unwrap();
        memberships.add_member(team, b.id, TeamRole::Viewer).await.unwrap();

        let roster = memberships.roster(team).await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].username, "alice");
        assert_eq!(roster[0].role, TeamRole::Admin);
        assert_eq!(roster[1].username, "bob");
        assert_eq!(roster[1].role, TeamRole::Viewer);
    }
}
