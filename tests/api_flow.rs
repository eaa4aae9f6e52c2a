/// End-to-end API tests over the in-process router
///
/// Exercises the auth gate, team selection, role gating, and the superadmin
/// boundary without a running server.
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;
use yamo::config::{AuthConfig, LoggingConfig, ServerConfig, ServiceConfig, StorageConfig};
use yamo::permission::TeamRole;
use yamo::server::build_router;
use yamo::AppContext;

fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 0,
            version: "test".to_string(),
        },
        storage: StorageConfig {
            data_directory: "./data".into(),
            finance_db: ":memory:".into(),
        },
        authentication: AuthConfig {
            jwt_secret: "a-test-secret-that-is-long-enough".to_string(),
            token_ttl_minutes: 60,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

/// Seeded world: admin/collab/viewer in team "Household" with one book and
/// one transaction; "root" is a superadmin with no memberships.
struct World {
    router: Router,
    ctx: AppContext,
    team_id: i64,
    book_id: i64,
    tx_id: i64,
}

async fn world() -> World {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    yamo::db::run_migrations(&pool).await.unwrap();
    let ctx = AppContext::with_pool(test_config(), pool);

    for (name, superadmin) in [
        ("admin", false),
        ("collab", false),
        ("viewer", false),
        ("root", true),
    ] {
        ctx.users.create_user(name, "pw", superadmin).await.unwrap();
    }

    let team = ctx.teams.create_team("Household").await.unwrap();
    for (name, role) in [
        ("admin", TeamRole::Admin),
        ("collab", TeamRole::Collaborator),
        ("viewer", TeamRole::Viewer),
    ] {
        let user = ctx.users.find_by_username(name).await.unwrap().unwrap();
        ctx.memberships
            .add_member(team.id, user.id, role)
            .await
            .unwrap();
    }

    let book = ctx.books.create_book(team.id, "2026 Budget").await.unwrap();
    let tx_id = sqlx::query(
        "INSERT INTO transactions (book_id, description, amount_cents, entry_date, created_at)
         VALUES (?1, 'rent', -90000, '2026-01-01', ?2)",
    )
    .bind(book.id)
    .bind(chrono::Utc::now())
    .execute(&ctx.db)
    .await
    .unwrap()
    .last_insert_rowid();

    World {
        router: build_router(ctx.clone()),
        ctx,
        team_id: team.id,
        book_id: book.id,
        tx_id,
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(world: &World, username: &str) -> String {
    let (status, body) = send(
        &world.router,
        Method::POST,
        "/users/login",
        None,
        Some(json!({ "username": username, "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn select_team(world: &World, token: &str) -> String {
    let (status, body) = send(
        &world.router,
        Method::POST,
        "/users/select-team",
        Some(token),
        Some(json!({ "team_id": world.team_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "select-team failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_needs_no_auth() {
    let world = world().await;
    let (status, body) = send(&world.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_token_is_401_and_bad_token_is_403() {
    let world = world().await;

    let (status, body) = send(&world.router, Method::GET, "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AuthenticationRequired");

    let (status, body) =
        send(&world.router, Method::GET, "/users/me", Some("junk"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "InvalidCredential");
}

#[tokio::test]
async fn login_token_carries_no_team_claim() {
    let world = world().await;
    let token = login(&world, "admin").await;

    let (status, body) = send(&world.router, Method::GET, "/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["team"]["kind"], "no_team");

    // Book data is unreachable until a team is selected
    let (status, _) = send(&world.router, Method::GET, "/books", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn select_team_embeds_claim_and_unlocks_book_data() {
    let world = world().await;
    let base = login(&world, "admin").await;
    let token = select_team(&world, &base).await;

    let (status, body) = send(&world.router, Method::GET, "/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team"]["kind"], "selected");
    assert_eq!(body["team"]["role"], "admin");

    let (status, body) = send(&world.router, Method::GET, "/books", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let uri = format!("/accounts?book_id={}", world.book_id);
    let (status, _) = send(&world.router, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn viewer_write_is_rejected_before_mutation() {
    let world = world().await;
    let base = login(&world, "viewer").await;
    let token = select_team(&world, &base).await;

    let uri = format!("/transactions/{}/exercised", world.tx_id);
    let (status, body) = send(
        &world.router,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "exercised": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    // No persistence mutation happened
    let tx = world
        .ctx
        .books
        .find_transaction(world.tx_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!tx.exercised);

    // A collaborator's write goes through
    let base = login(&world, "collab").await;
    let token = select_team(&world, &base).await;
    let (status, body) = send(
        &world.router,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "exercised": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "collab write failed: {}", body);
    assert_eq!(body["exercised"], true);
}

#[tokio::test]
async fn superadmin_gets_admin_surfaces_but_not_team_data() {
    let world = world().await;
    let token = login(&world, "root").await;

    // Not a member: cannot enter the team
    let (status, _) = send(
        &world.router,
        Method::POST,
        "/users/select-team",
        Some(&token),
        Some(json!({ "team_id": world.team_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // But may read the roster for the admin dashboard
    let uri = format!("/teams/{}/users", world.team_id);
    let (status, body) = send(&world.router, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    // And may hard-delete a team; a team admin may not
    let admin_token = login(&world, "admin").await;
    let uri = format!("/teams/{}/hard", world.team_id);
    let (status, _) = send(&world.router, Method::DELETE, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&world.router, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn role_change_invalidates_outstanding_tokens() {
    let world = world().await;

    let admin_base = login(&world, "admin").await;
    let admin_token = select_team(&world, &admin_base).await;

    let collab_base = login(&world, "collab").await;
    let collab_token = select_team(&world, &collab_base).await;

    // Admin demotes collab to viewer
    let collab = world
        .ctx
        .users
        .find_by_username("collab")
        .await
        .unwrap()
        .unwrap();
    let uri = format!("/teams/{}/users/{}/role", world.team_id, collab.id);
    let (status, _) = send(
        &world.router,
        Method::PUT,
        &uri,
        Some(&admin_token),
        Some(json!({ "role": "viewer" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The outstanding collaborator token is now superseded
    let (status, body) = send(
        &world.router,
        Method::GET,
        "/users/me",
        Some(&collab_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "InvalidCredential");

    // After re-login and re-selection the new role applies
    let base = login(&world, "collab").await;
    let token = select_team(&world, &base).await;
    let uri = format!("/transactions/{}/exercised", world.tx_id);
    let (status, _) = send(
        &world.router,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "exercised": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn soft_delete_and_restore_lifecycle() {
    let world = world().await;
    let base = login(&world, "admin").await;
    let token = select_team(&world, &base).await;

    // Soft delete the team
    let uri = format!("/teams/{}", world.team_id);
    let (status, _) = send(&world.router, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Team data is now invisible, even to its admin
    let (status, _) = send(&world.router, Method::GET, "/books", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The raw membership row still authorizes a restore
    let uri = format!("/teams/{}/restore", world.team_id);
    let (status, _) = send(&world.router, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&world.router, Method::GET, "/books", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn book_restore_is_scoped_to_the_active_team() {
    let world = world().await;

    // A second tenant with its own admin and a soft-deleted book
    let rival = world.ctx.users.create_user("rival", "pw", false).await.unwrap();
    let other_team = world.ctx.teams.create_team("Rivals").await.unwrap();
    world
        .ctx
        .memberships
        .add_member(other_team.id, rival.id, TeamRole::Admin)
        .await
        .unwrap();
    let other_book = world
        .ctx
        .books
        .create_book(other_team.id, "Secret Ledger")
        .await
        .unwrap();
    world.ctx.books.soft_delete_book(other_book.id).await.unwrap();

    // Admin of a different team cannot restore it, and it stays deleted
    let base = login(&world, "admin").await;
    let token = select_team(&world, &base).await;
    let uri = format!("/books/{}/restore", other_book.id);
    let (status, body) = send(&world.router, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "cross-team restore: {}", body);
    assert!(world
        .ctx
        .books
        .books_for_team(other_team.id)
        .await
        .unwrap()
        .is_empty());

    // The owning team's admin can
    let base = login(&world, "rival").await;
    let (status, body) = send(
        &world.router,
        Method::POST,
        "/users/select-team",
        Some(&base),
        Some(json!({ "team_id": other_team.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "select-team failed: {}", body);
    let rival_token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(&world.router, Method::POST, &uri, Some(&rival_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        world
            .ctx
            .books
            .books_for_team(other_team.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn exit_team_drops_the_claim() {
    let world = world().await;
    let base = login(&world, "admin").await;
    let token = select_team(&world, &base).await;

    let (status, body) = send(
        &world.router,
        Method::POST,
        "/users/exit-team",
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bare = body["token"].as_str().unwrap();

    let (status, body) = send(&world.router, Method::GET, "/users/me", Some(bare), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["team"]["kind"], "no_team");
}
