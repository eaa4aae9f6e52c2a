//! YAMO (Purrfect Finances) core: team-scoped permissions and book context
//! resolution for a multi-tenant finance tracker.
//!
//! Two halves share this crate:
//! - the server core: token codec, auth gate, permission evaluator, and the
//!   thin REST surface over SQLite;
//! - the client core: session store and context switcher, written against the
//!   [`session::FinanceApi`] trait so the transition invariants are testable
//!   without a server.

pub mod api;
pub mod auth;
pub mod books;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod membership;
pub mod permission;
pub mod server;
pub mod session;
pub mod token;

pub use context::AppContext;
pub use error::{YamoError, YamoResult};
pub use permission::{EffectivePermission, Principal, TeamClaim, TeamRole};
