/// Application context and dependency injection
use crate::{
    books::{BookStore, TeamStore},
    config::ServerConfig,
    db,
    error::YamoResult,
    membership::{MembershipStore, UserStore},
    token::TokenCodec,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub codec: TokenCodec,
    pub users: UserStore,
    pub memberships: MembershipStore,
    pub teams: TeamStore,
    pub books: BookStore,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> YamoResult<Self> {
        config.validate()?;

        let pool = db::create_pool(&config.storage.finance_db, db::DatabaseOptions::default())
            .await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Ok(Self::with_pool(config, pool))
    }

    /// Build a context over an existing pool (used by tests)
    pub fn with_pool(config: ServerConfig, pool: SqlitePool) -> Self {
        let codec = TokenCodec::new(
            &config.authentication.jwt_secret,
            config.authentication.token_ttl_minutes,
        );

        Self {
            config: Arc::new(config),
            db: pool.clone(),
            codec,
            users: UserStore::new(pool.clone()),
            memberships: MembershipStore::new(pool.clone()),
            teams: TeamStore::new(pool.clone()),
            books: BookStore::new(pool),
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
