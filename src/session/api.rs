/// The persistence API the session core consumes, plus its HTTP implementation
/// and token storage.
///
/// The trait seam exists so the context-switcher invariants can be exercised
/// against a mock without a running server.
use crate::{
    api::users::{LoginResponse, MeResponse, SelectTeamResponse},
    db::models::{Account, Book, Category, TeamMembership, Transaction},
    error::{YamoError, YamoResult},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// REST/JSON persistence API consumed by the session store and switcher
#[async_trait]
pub trait FinanceApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> YamoResult<LoginResponse>;
    async fn me(&self, token: &str) -> YamoResult<MeResponse>;
    async fn my_teams(&self, token: &str) -> YamoResult<Vec<TeamMembership>>;
    async fn select_team(&self, token: &str, team_id: i64) -> YamoResult<SelectTeamResponse>;
    async fn exit_team(&self, token: &str) -> YamoResult<String>;
    async fn roster(&self, token: &str, team_id: i64) -> YamoResult<Vec<TeamMembership>>;
    async fn books(&self, token: &str) -> YamoResult<Vec<Book>>;
    async fn accounts(&self, token: &str, book_id: i64) -> YamoResult<Vec<Account>>;
    async fn categories(&self, token: &str, book_id: i64) -> YamoResult<Vec<Category>>;
    async fn transactions(
        &self,
        token: &str,
        book_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> YamoResult<Vec<Transaction>>;
}

/// HTTP implementation over reqwest
pub struct HttpFinanceApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFinanceApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Map a non-success response to the error taxonomy using the server's
    /// structured `{error, message}` body.
    async fn check<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> YamoResult<T> {
        if response.status().is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| YamoError::Transition(format!("Malformed response: {}", e)));
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let code = body["error"].as_str().unwrap_or("").to_string();
        let message = body["message"].as_str().unwrap_or("request failed").to_string();

        Err(match code.as_str() {
            "AuthenticationRequired" => YamoError::Unauthenticated(message),
            "InvalidCredential" => YamoError::InvalidCredential(message),
            "Forbidden" => YamoError::Unauthorized(message),
            "NotFound" => YamoError::NotFound(message),
            _ => YamoError::Transition(message),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> YamoResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| YamoError::Transition(format!("Network error: {}", e)))?;
        Self::check(response).await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        token: Option<&str>,
        path: &str,
        body: &serde_json::Value,
    ) -> YamoResult<T> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| YamoError::Transition(format!("Network error: {}", e)))?;
        Self::check(response).await
    }
}

#[async_trait]
impl FinanceApi for HttpFinanceApi {
    async fn login(&self, username: &str, password: &str) -> YamoResult<LoginResponse> {
        self.post(
            None,
            "/users/login",
            &serde_json::json!({ "username": username, "password": password }),
        )
        .await
    }

    async fn me(&self, token: &str) -> YamoResult<MeResponse> {
        self.get(token, "/users/me", &[]).await
    }

    async fn my_teams(&self, token: &str) -> YamoResult<Vec<TeamMembership>> {
        self.get(token, "/users/me/teams", &[]).await
    }

    async fn select_team(&self, token: &str, team_id: i64) -> YamoResult<SelectTeamResponse> {
        self.post(
            Some(token),
            "/users/select-team",
            &serde_json::json!({ "team_id": team_id }),
        )
        .await
    }

    async fn exit_team(&self, token: &str) -> YamoResult<String> {
        let response: serde_json::Value = self
            .post(Some(token), "/users/exit-team", &serde_json::json!({}))
            .await?;
        response["token"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| YamoError::Transition("Missing token in response".to_string()))
    }

    async fn roster(&self, token: &str, team_id: i64) -> YamoResult<Vec<TeamMembership>> {
        self.get(token, &format!("/teams/{}/users", team_id), &[]).await
    }

    async fn books(&self, token: &str) -> YamoResult<Vec<Book>> {
        self.get(token, "/books", &[]).await
    }

    async fn accounts(&self, token: &str, book_id: i64) -> YamoResult<Vec<Account>> {
        self.get(token, "/accounts", &[("book_id", book_id.to_string())])
            .await
    }

    async fn categories(&self, token: &str, book_id: i64) -> YamoResult<Vec<Category>> {
        self.get(token, "/categories", &[("book_id", book_id.to_string())])
            .await
    }

    async fn transactions(
        &self,
        token: &str,
        book_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> YamoResult<Vec<Transaction>> {
        let mut query = vec![("book_id", book_id.to_string())];
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = to {
            query.push(("to", to.to_string()));
        }
        self.get(token, "/transactions", &query).await
    }
}

/// Durable storage for the session token, keyed by one well-known location
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn load(&self) -> YamoResult<Option<String>>;
    async fn save(&self, token: &str) -> YamoResult<()>;
    async fn clear(&self) -> YamoResult<()>;
}

/// File-backed token storage
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn load(&self) -> YamoResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(token) => {
                let token = token.trim().to_string();
                Ok(if token.is_empty() { None } else { Some(token) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, token: &str) -> YamoResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, token).await?;
        Ok(())
    }

    async fn clear(&self) -> YamoResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory token storage, for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<String>>,
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn load(&self) -> YamoResult<Option<String>> {
        Ok(self.token.lock().await.clone())
    }

    async fn save(&self, token: &str) -> YamoResult<()> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> YamoResult<()> {
        *self.token.lock().await = None;
        Ok(())
    }
}
