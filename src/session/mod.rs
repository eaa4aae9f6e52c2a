/// Client-side session core: token persistence, session store, and the
/// context switcher that keeps team/book state and its dependent collections
/// consistent across transitions.

pub mod api;
pub mod store;
pub mod switcher;

pub use api::{FileTokenStorage, FinanceApi, HttpFinanceApi, MemoryTokenStorage, TokenStorage};
pub use store::{SessionSnapshot, SessionStore};
pub use switcher::{ContextState, ContextSwitcher};
