/// Client-side session store: one owned context object per app instance
///
/// Holds the principal, token, active team claim, and the book-scoped
/// collections the context switcher manages. Permission flags are derived on
/// read from the claim and the live roster, never stored.
use crate::{
    db::models::{Account, Book, Category, TeamMembership, Transaction},
    error::{YamoError, YamoResult},
    permission::{self, EffectivePermission, Principal, TeamClaim},
    session::api::{FinanceApi, TokenStorage},
    session::switcher::ContextState,
};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub principal: Option<Principal>,
    pub token: Option<String>,
    pub team: TeamClaim,
    pub context: ContextState,
    pub roster: Vec<TeamMembership>,
    pub books: Vec<Book>,
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
}

/// Read-only view of the session for UI and route guards
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub principal: Option<Principal>,
    pub team: TeamClaim,
    pub context: ContextState,
    pub permission: EffectivePermission,
    pub roster: Vec<TeamMembership>,
    pub books: Vec<Book>,
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
}

pub struct SessionStore {
    pub(crate) api: Arc<dyn FinanceApi>,
    pub(crate) storage: Arc<dyn TokenStorage>,
    pub(crate) state: RwLock<SessionState>,
    /// Collapses concurrent initialization into one in-flight validation
    init: OnceCell<bool>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn FinanceApi>, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            api,
            storage,
            state: RwLock::new(SessionState::default()),
            init: OnceCell::new(),
        }
    }

    /// Load a persisted token and re-validate it against the server before
    /// trusting it. Returns whether the session is authenticated; validation
    /// failure clears state rather than erroring.
    ///
    /// Idempotent: duplicate and concurrent calls share a single validation.
    pub async fn initialize_from_persisted(&self) -> bool {
        *self
            .init
            .get_or_init(|| async {
                match self.try_restore().await {
                    Ok(restored) => restored,
                    Err(e) => {
                        tracing::debug!("session restore failed: {}", e);
                        let _ = self.storage.clear().await;
                        false
                    }
                }
            })
            .await
    }

    async fn try_restore(&self) -> YamoResult<bool> {
        let Some(token) = self.storage.load().await? else {
            return Ok(false);
        };

        // One auth-gate round trip; the server echoes the active team claim.
        let me = self.api.me(&token).await?;

        let mut state = self.state.write().await;
        state.principal = Some(Principal {
            user_id: me.user.id,
            username: me.user.username,
            is_superadmin: me.user.is_superadmin,
        });
        state.context = match me.team.team_id() {
            Some(team_id) => ContextState::TeamSelected { team_id },
            None => ContextState::NoContext,
        };
        state.team = me.team;
        state.token = Some(token);

        Ok(true)
    }

    /// Authenticate and persist the base token (no team claim yet)
    pub async fn login(&self, username: &str, password: &str) -> YamoResult<()> {
        let response = self.api.login(username, password).await?;
        self.storage.save(&response.token).await?;

        let mut state = self.state.write().await;
        *state = SessionState::default();
        state.principal = Some(Principal {
            user_id: response.user.id,
            username: response.user.username,
            is_superadmin: response.user.is_superadmin,
        });
        state.token = Some(response.token);

        Ok(())
    }

    /// Discard token and all in-memory state unconditionally
    pub async fn logout(&self) {
        let _ = self.storage.clear().await;
        let mut state = self.state.write().await;
        *state = SessionState::default();
    }

    pub async fn token(&self) -> YamoResult<String> {
        self.state
            .read()
            .await
            .token
            .clone()
            .ok_or_else(|| YamoError::Unauthenticated("Not logged in".to_string()))
    }

    /// Effective permission for the active context, derived reactively.
    ///
    /// When the roster for the claimed team is loaded it is the live lookup
    /// and wins over the claim; before the roster arrives we fall back to the
    /// claim. That fallback trades consistency for availability: a demotion
    /// becomes visible client-side with the next roster fetch, and the server
    /// re-checks live roles on every request regardless.
    pub async fn permission(&self) -> EffectivePermission {
        let state = self.state.read().await;
        Self::derive_permission(&state)
    }

    fn derive_permission(state: &SessionState) -> EffectivePermission {
        let Some(principal) = &state.principal else {
            return EffectivePermission::NONE;
        };

        let live = if state.roster.is_empty() {
            None
        } else {
            Some(
                state
                    .roster
                    .iter()
                    .find(|m| m.user_id == principal.user_id)
                    .map(|m| m.role),
            )
        };

        permission::evaluate(principal, &state.team, live)
    }

    /// Point-in-time view for rendering and route guards
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            principal: state.principal.clone(),
            team: state.team.clone(),
            context: state.context,
            permission: Self::derive_permission(&state),
            roster: state.roster.clone(),
            books: state.books.clone(),
            accounts: state.accounts.clone(),
            categories: state.categories.clone(),
            transactions: state.transactions.clone(),
        }
    }

    pub async fn context(&self) -> ContextState {
        self.state.read().await.context
    }
}
