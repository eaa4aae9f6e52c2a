/// API routes and handlers
pub mod books;
pub mod health;
pub mod teams;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(users::routes())
        .merge(teams::routes())
        .merge(books::routes())
}
