/// Context switcher: orchestrates team/book selection transitions
///
/// The one hard invariant here: at no point are accounts or categories from
/// team A observable while the active claim reflects team B. Book-scoped
/// collections are cleared BEFORE any new fetch is issued, transitions are
/// serialized behind a mutex, and every async load carries a monotonic epoch
/// so a result that resolves after a newer transition is discarded instead of
/// overwriting newer state.
use crate::{
    error::{YamoError, YamoResult},
    permission::TeamClaim,
    session::store::SessionStore,
};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where the session currently stands in the team/book selection flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    #[default]
    NoContext,
    TeamSelected {
        team_id: i64,
    },
    BookLoaded {
        team_id: i64,
        book_id: i64,
    },
}

pub struct ContextSwitcher {
    store: Arc<SessionStore>,
    /// Serializes transitions; a second selection waits for the first
    transition_lock: Mutex<()>,
    /// Monotonic transition counter for stale-result discard
    epoch: AtomicU64,
}

impl ContextSwitcher {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            transition_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    fn begin_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Select a team: request a re-issued token carrying the team claim, swap
    /// it atomically, and drop every book-scoped collection.
    ///
    /// On any failure the session keeps its previous token and state; the old
    /// token is only discarded after the new one is persisted.
    pub async fn select_team(&self, team_id: i64) -> YamoResult<()> {
        let _guard = self.transition_lock.lock().await;
        // Invalidates any transaction load still in flight from the old context.
        self.begin_epoch();

        let token = self.store.token().await?;
        let response = self.store.api.select_team(&token, team_id).await?;

        // Persist the new token before the old one is dropped from memory.
        self.store.storage.save(&response.token).await?;

        let mut state = self.store.state.write().await;
        state.token = Some(response.token);
        state.team = TeamClaim::Selected {
            team_id: response.team_id,
            team_name: response.team_name,
            role: response.role,
        };
        // Reset dependent collections before anything new is fetched.
        state.roster.clear();
        state.books.clear();
        state.accounts.clear();
        state.categories.clear();
        state.transactions.clear();
        state.context = ContextState::TeamSelected { team_id };

        Ok(())
    }

    /// Select a book within the active team: fetch the roster, then accounts
    /// and categories in parallel, and publish `BookLoaded` only when all of
    /// it arrived. On failure the state rolls back to `TeamSelected` with the
    /// book-scoped collections empty.
    ///
    /// Transactions are not loaded here; they arrive lazily per date range
    /// via [`load_transactions`](Self::load_transactions).
    pub async fn select_book(&self, book_id: i64) -> YamoResult<()> {
        let _guard = self.transition_lock.lock().await;
        self.begin_epoch();

        let (token, team_id) = {
            let state = self.store.state.read().await;
            let token = state
                .token
                .clone()
                .ok_or_else(|| YamoError::Unauthenticated("Not logged in".to_string()))?;
            let team_id = match state.context {
                ContextState::TeamSelected { team_id }
                | ContextState::BookLoaded { team_id, .. } => team_id,
                ContextState::NoContext => {
                    return Err(YamoError::Transition("No team selected".to_string()));
                }
            };
            (token, team_id)
        };

        // Reset before fetch: a failed or abandoned load must leave empty
        // collections, never the previous book's data.
        {
            let mut state = self.store.state.write().await;
            state.accounts.clear();
            state.categories.clear();
            state.transactions.clear();
            state.context = ContextState::TeamSelected { team_id };
        }

        let books = self.store.api.books(&token).await?;
        if !books.iter().any(|b| b.id == book_id) {
            return Err(YamoError::Transition(format!(
                "Book {} does not belong to the active team",
                book_id
            )));
        }

        let roster = self.store.api.roster(&token, team_id).await?;

        let (accounts, categories) = tokio::join!(
            self.store.api.accounts(&token, book_id),
            self.store.api.categories(&token, book_id),
        );
        let accounts = accounts?;
        let categories = categories?;

        let mut state = self.store.state.write().await;
        state.roster = roster;
        state.books = books;
        state.accounts = accounts;
        state.categories = categories;
        state.context = ContextState::BookLoaded { team_id, book_id };

        Ok(())
    }

    /// Lazy transaction load for the current book, by date range.
    ///
    /// Runs outside the transition lock; the epoch taken at the start discards
    /// the result if a context switch completed while the fetch was in flight.
    pub async fn load_transactions(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> YamoResult<()> {
        let epoch = self.epoch.load(Ordering::SeqCst);

        let (token, book_id) = {
            let state = self.store.state.read().await;
            let token = state
                .token
                .clone()
                .ok_or_else(|| YamoError::Unauthenticated("Not logged in".to_string()))?;
            let book_id = match state.context {
                ContextState::BookLoaded { book_id, .. } => book_id,
                _ => return Err(YamoError::Transition("No book loaded".to_string())),
            };
            (token, book_id)
        };

        let transactions = self
            .store
            .api
            .transactions(&token, book_id, from, to)
            .await?;

        if !self.is_current(epoch) {
            // A newer transition won; its reset stands.
            tracing::debug!(book_id, "discarding stale transaction load");
            return Ok(());
        }

        let mut state = self.store.state.write().await;
        match state.context {
            ContextState::BookLoaded {
                book_id: current, ..
            } if current == book_id => {
                state.transactions = transactions;
            }
            _ => {}
        }
        Ok(())
    }

    /// Step out of team mode back to the no-context state (superadmin
    /// returning to the admin dashboard): token is re-issued without a team
    /// claim and all team-scoped state is dropped.
    pub async fn exit_team_mode(&self) -> YamoResult<()> {
        let _guard = self.transition_lock.lock().await;
        self.begin_epoch();

        let token = self.store.token().await?;
        let new_token = self.store.api.exit_team(&token).await?;
        self.store.storage.save(&new_token).await?;

        let mut state = self.store.state.write().await;
        state.token = Some(new_token);
        state.team = TeamClaim::NoTeam;
        state.roster.clear();
        state.books.clear();
        state.accounts.clear();
        state.categories.clear();
        state.transactions.clear();
        state.context = ContextState::NoContext;

        Ok(())
    }

    /// Unconditional teardown regardless of current state
    pub async fn logout(&self) {
        let _guard = self.transition_lock.lock().await;
        self.begin_epoch();
        self.store.logout().await;
    }
}
