/// Book-scoped endpoints: books, accounts, categories, transactions
///
/// Every handler here resolves the active team from the token claim, then
/// re-checks the caller's live role before touching book data. Write gates run
/// before any persistence mutation.
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::{Account, Book, Category, Transaction},
    error::{YamoError, YamoResult},
    permission::{self, EffectivePermission},
};
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/:id", delete(soft_delete_book))
        .route("/books/:id/restore", post(restore_book))
        .route("/accounts", get(list_accounts))
        .route("/categories", get(list_categories))
        .route("/transactions", get(list_transactions))
        .route("/transactions/:id/exercised", put(set_exercised))
}

/// Resolve the active team and the caller's live effective permission in it
async fn team_permission(
    ctx: &AppContext,
    auth: &AuthContext,
) -> YamoResult<(i64, EffectivePermission)> {
    let team_id = auth.require_team()?;
    let live = ctx
        .memberships
        .role_for(auth.principal.user_id, team_id)
        .await?;

    let perm = permission::evaluate(&auth.principal, &auth.team, Some(live));
    Ok((team_id, perm))
}

/// Check that a book is live and belongs to the active team
async fn require_book_in_team(ctx: &AppContext, book_id: i64, team_id: i64) -> YamoResult<()> {
    if !ctx.books.book_belongs_to_team(book_id, team_id).await? {
        return Err(YamoError::NotFound(format!(
            "Book {} not found in active team",
            book_id
        )));
    }
    Ok(())
}

/// `GET /books` - books of the active team
async fn list_books(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> YamoResult<Json<Vec<Book>>> {
    let (team_id, perm) = team_permission(&ctx, &auth).await?;
    if !perm.can_view {
        return Err(YamoError::Unauthorized("View permission required".to_string()));
    }

    Ok(Json(ctx.books.books_for_team(team_id).await?))
}

#[derive(Debug, Deserialize)]
struct CreateBookRequest {
    name: String,
}

/// `POST /books` - team admin only
async fn create_book(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateBookRequest>,
) -> YamoResult<Json<Book>> {
    let (team_id, perm) = team_permission(&ctx, &auth).await?;
    if !perm.is_admin {
        return Err(YamoError::Unauthorized("Admin role required".to_string()));
    }

    Ok(Json(ctx.books.create_book(team_id, &req.name).await?))
}

/// `DELETE /books/:id` - soft delete, team admin only
async fn soft_delete_book(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(book_id): Path<i64>,
) -> YamoResult<Json<serde_json::Value>> {
    let (team_id, perm) = team_permission(&ctx, &auth).await?;
    if !perm.is_admin {
        return Err(YamoError::Unauthorized("Admin role required".to_string()));
    }
    require_book_in_team(&ctx, book_id, team_id).await?;

    ctx.books.soft_delete_book(book_id).await?;
    Ok(Json(serde_json::json!({ "deleted": book_id })))
}

/// `POST /books/:id/restore` - team admin only.
///
/// The live-book ownership check cannot see soft-deleted books, so this
/// resolves the owning team through the raw row instead and refuses books
/// outside the active team.
async fn restore_book(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(book_id): Path<i64>,
) -> YamoResult<Json<serde_json::Value>> {
    let (team_id, perm) = team_permission(&ctx, &auth).await?;
    if !perm.is_admin {
        return Err(YamoError::Unauthorized("Admin role required".to_string()));
    }

    let owner = ctx
        .books
        .book_team_any(book_id)
        .await?
        .ok_or_else(|| YamoError::NotFound(format!("Book {} not found", book_id)))?;
    if owner != team_id {
        return Err(YamoError::NotFound(format!(
            "Book {} not found in active team",
            book_id
        )));
    }

    ctx.books.restore_book(book_id).await?;
    Ok(Json(serde_json::json!({ "restored": book_id })))
}

#[derive(Debug, Deserialize)]
struct BookQuery {
    book_id: i64,
}

/// `GET /accounts?book_id=`
async fn list_accounts(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<BookQuery>,
) -> YamoResult<Json<Vec<Account>>> {
    let (team_id, perm) = team_permission(&ctx, &auth).await?;
    if !perm.can_view {
        return Err(YamoError::Unauthorized("View permission required".to_string()));
    }
    require_book_in_team(&ctx, query.book_id, team_id).await?;

    Ok(Json(ctx.books.accounts_for_book(query.book_id).await?))
}

/// `GET /categories?book_id=`
async fn list_categories(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<BookQuery>,
) -> YamoResult<Json<Vec<Category>>> {
    let (team_id, perm) = team_permission(&ctx, &auth).await?;
    if !perm.can_view {
        return Err(YamoError::Unauthorized("View permission required".to_string()));
    }
    require_book_in_team(&ctx, query.book_id, team_id).await?;

    Ok(Json(ctx.books.categories_for_book(query.book_id).await?))
}

#[derive(Debug, Deserialize)]
struct TransactionQuery {
    book_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

/// `GET /transactions?book_id=&from=&to=` - lazy, date-ranged
async fn list_transactions(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<TransactionQuery>,
) -> YamoResult<Json<Vec<Transaction>>> {
    let (team_id, perm) = team_permission(&ctx, &auth).await?;
    if !perm.can_view {
        return Err(YamoError::Unauthorized("View permission required".to_string()));
    }
    require_book_in_team(&ctx, query.book_id, team_id).await?;

    Ok(Json(
        ctx.books
            .transactions_for_book(query.book_id, query.from, query.to)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct ExercisedRequest {
    exercised: bool,
}

/// `PUT /transactions/:id/exercised` - write-gated before any mutation
async fn set_exercised(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(tx_id): Path<i64>,
    Json(req): Json<ExercisedRequest>,
) -> YamoResult<Json<Transaction>> {
    let (team_id, perm) = team_permission(&ctx, &auth).await?;
    if !perm.can_write {
        return Err(YamoError::Unauthorized(
            "Write permission required".to_string(),
        ));
    }

    let tx = ctx
        .books
        .find_transaction(tx_id)
        .await?
        .ok_or_else(|| YamoError::NotFound(format!("Transaction {} not found", tx_id)))?;
    require_book_in_team(&ctx, tx.book_id, team_id).await?;

    ctx.books.set_exercised(tx_id, req.exercised).await?;
    let updated = ctx
        .books
        .find_transaction(tx_id)
        .await?
        .ok_or_else(|| YamoError::Internal("Transaction vanished mid-update".to_string()))?;

    Ok(Json(updated))
}
