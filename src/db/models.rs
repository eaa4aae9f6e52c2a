/// Database row models
use crate::permission::TeamRole;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_superadmin: bool,
    pub token_version: i64,
    pub created_at: DateTime<Utc>,
}

/// Team record; `deleted_at` set means soft-deleted
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Membership row: one role per (team, user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMembership {
    pub team_id: i64,
    pub team_name: String,
    pub user_id: i64,
    pub username: String,
    pub role: TeamRole,
}

/// Book (ledger) owned by exactly one team
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Account within a book
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub book_id: i64,
    pub name: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// Category within a book
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub book_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Transaction within a book
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub book_id: i64,
    pub account_id: Option<i64>,
    pub category_id: Option<i64>,
    pub description: String,
    pub amount_cents: i64,
    pub entry_date: NaiveDate,
    pub exercised: bool,
    pub created_at: DateTime<Utc>,
}
