/// Team catalog and book-scoped collection stores
use crate::{
    db::models::{Account, Book, Category, Team, Transaction},
    error::{YamoError, YamoResult},
};
use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

/// Team lifecycle: create, soft delete, restore, hard delete
#[derive(Clone)]
pub struct TeamStore {
    db: SqlitePool,
}

impl TeamStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_team(&self, name: &str) -> YamoResult<Team> {
        if name.trim().is_empty() {
            return Err(YamoError::Validation("Team name must not be empty".to_string()));
        }

        let now = Utc::now();
        let result = sqlx::query("INSERT INTO teams (name, created_at) VALUES (?1, ?2)")
            .bind(name)
            .bind(now)
            .execute(&self.db)
            .await?;

        Ok(Team {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            created_at: now,
            deleted_at: None,
        })
    }

    pub async fn find_team(&self, team_id: i64) -> YamoResult<Option<Team>> {
        let team = sqlx::query_as::<_, Team>(
            "SELECT id, name, created_at, deleted_at FROM teams
             WHERE id = ?1 AND deleted_at IS NULL",
        )
        .bind(team_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(team)
    }

    /// Soft-delete: the team disappears from memberships and catalogs but the
    /// rows survive until a superadmin hard-deletes.
    pub async fn soft_delete_team(&self, team_id: i64) -> YamoResult<()> {
        let result =
            sqlx::query("UPDATE teams SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL")
                .bind(Utc::now())
                .bind(team_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(YamoError::NotFound(format!("Team {} not found", team_id)));
        }

        Ok(())
    }

    pub async fn restore_team(&self, team_id: i64) -> YamoResult<()> {
        let result =
            sqlx::query("UPDATE teams SET deleted_at = NULL WHERE id = ?1 AND deleted_at IS NOT NULL")
                .bind(team_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(YamoError::NotFound(format!(
                "No soft-deleted team {} to restore",
                team_id
            )));
        }

        Ok(())
    }

    /// Hard delete: superadmin-only, removes the team and everything under it
    pub async fn hard_delete_team(&self, team_id: i64) -> YamoResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "DELETE FROM transactions WHERE book_id IN (SELECT id FROM books WHERE team_id = ?1)",
        )
        .bind(team_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM accounts WHERE book_id IN (SELECT id FROM books WHERE team_id = ?1)",
        )
        .bind(team_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM categories WHERE book_id IN (SELECT id FROM books WHERE team_id = ?1)",
        )
        .bind(team_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM books WHERE team_id = ?1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM team_users WHERE team_id = ?1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM teams WHERE id = ?1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(YamoError::NotFound(format!("Team {} not found", team_id)));
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Book catalog and book-scoped collections
#[derive(Clone)]
pub struct BookStore {
    db: SqlitePool,
}

impl BookStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_book(&self, team_id: i64, name: &str) -> YamoResult<Book> {
        let now = Utc::now();
        let result = sqlx::query("INSERT INTO books (team_id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(team_id)
            .bind(name)
            .bind(now)
            .execute(&self.db)
            .await?;

        Ok(Book {
            id: result.last_insert_rowid(),
            team_id,
            name: name.to_string(),
            created_at: now,
            deleted_at: None,
        })
    }

    /// Books of a team, soft-deleted books and teams excluded
    pub async fn books_for_team(&self, team_id: i64) -> YamoResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT b.id, b.team_id, b.name, b.created_at, b.deleted_at
             FROM books b
             JOIN teams t ON t.id = b.team_id
             WHERE b.team_id = ?1 AND b.deleted_at IS NULL AND t.deleted_at IS NULL
             ORDER BY b.name",
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;

        Ok(books)
    }

    /// Whether the book exists, is live, and belongs to the given team
    pub async fn book_belongs_to_team(&self, book_id: i64, team_id: i64) -> YamoResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM books b
             JOIN teams t ON t.id = b.team_id
             WHERE b.id = ?1 AND b.team_id = ?2
               AND b.deleted_at IS NULL AND t.deleted_at IS NULL",
        )
        .bind(book_id)
        .bind(team_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.is_some())
    }

    /// Team owning the book, soft-deleted books included. Used only by
    /// restore, where the book is deleted by definition.
    pub async fn book_team_any(&self, book_id: i64) -> YamoResult<Option<i64>> {
        let row = sqlx::query("SELECT team_id FROM books WHERE id = ?1")
            .bind(book_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|r| r.get("team_id")))
    }

    pub async fn soft_delete_book(&self, book_id: i64) -> YamoResult<()> {
        let result =
            sqlx::query("UPDATE books SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL")
                .bind(Utc::now())
                .bind(book_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(YamoError::NotFound(format!("Book {} not found", book_id)));
        }

        Ok(())
    }

    pub async fn restore_book(&self, book_id: i64) -> YamoResult<()> {
        let result =
            sqlx::query("UPDATE books SET deleted_at = NULL WHERE id = ?1 AND deleted_at IS NOT NULL")
                .bind(book_id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(YamoError::NotFound(format!(
                "No soft-deleted book {} to restore",
                book_id
            )));
        }

        Ok(())
    }

    pub async fn accounts_for_book(&self, book_id: i64) -> YamoResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT id, book_id, name, kind, created_at FROM accounts
             WHERE book_id = ?1 ORDER BY name",
        )
        .bind(book_id)
        .fetch_all(&self.db)
        .await?;

        Ok(accounts)
    }

    pub async fn categories_for_book(&self, book_id: i64) -> YamoResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, book_id, name, created_at FROM categories
             WHERE book_id = ?1 ORDER BY name",
        )
        .bind(book_id)
        .fetch_all(&self.db)
        .await?;

        Ok(categories)
    }

    /// Transactions in a date range; open-ended when bounds are omitted
    pub async fn transactions_for_book(
        &self,
        book_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> YamoResult<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(
            "SELECT id, book_id, account_id, category_id, description, amount_cents,
                    entry_date, exercised, created_at
             FROM transactions
             WHERE book_id = ?1
               AND (?2 IS NULL OR entry_date >= ?2)
               AND (?3 IS NULL OR entry_date <= ?3)
             ORDER BY entry_date, id",
        )
        .bind(book_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(transactions)
    }

    pub async fn find_transaction(&self, tx_id: i64) -> YamoResult<Option<Transaction>> {
        let tx = sqlx::query_as::<_, Transaction>(
            "SELECT id, book_id, account_id, category_id, description, amount_cents,
                    entry_date, exercised, created_at
             FROM transactions WHERE id = ?1",
        )
        .bind(tx_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(tx)
    }

    pub async fn set_exercised(&self, tx_id: i64, exercised: bool) -> YamoResult<()> {
        let result = sqlx::query("UPDATE transactions SET exercised = ?1 WHERE id = ?2")
            .bind(exercised)
            .bind(tx_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(YamoError::NotFound(format!("Transaction {} not found", tx_id)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn seed(db: &SqlitePool) -> (TeamStore, BookStore, i64, i64) {
        let teams = TeamStore::new(db.clone());
        let books = BookStore::new(db.clone());
        let team = teams.create_team("Household").await.unwrap();
        let book = books.create_book(team.id, "2026 Budget").await.unwrap();
        (teams, books, team.id, book.id)
    }

    #[tokio::test]
    async fn test_books_scoped_to_live_team() {
        let db = test_pool().await;
        let (teams, books, team_id, book_id) = seed(&db).await;

        assert!(books.book_belongs_to_team(book_id, team_id).await.unwrap());
        assert!(!books.book_belongs_to_team(book_id, team_id + 1).await.unwrap());
        assert_eq!(books.books_for_team(team_id).await.unwrap().len(), 1);

        teams.soft_delete_team(team_id).await.unwrap();
        assert!(!books.book_belongs_to_team(book_id, team_id).await.unwrap());
        assert!(books.books_for_team(team_id).await.unwrap().is_empty());

        teams.restore_team(team_id).await.unwrap();
        assert!(books.book_belongs_to_team(book_id, team_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_book_soft_delete_and_restore() {
        let db = test_pool().await;
        let (_teams, books, team_id, book_id) = seed(&db).await;

        books.soft_delete_book(book_id).await.unwrap();
        assert!(books.books_for_team(team_id).await.unwrap().is_empty());

        // Ownership stays resolvable while soft-deleted
        assert_eq!(books.book_team_any(book_id).await.unwrap(), Some(team_id));
        assert_eq!(books.book_team_any(book_id + 99).await.unwrap(), None);

        // Restoring clears the timestamp
        books.restore_book(book_id).await.unwrap();
        assert_eq!(books.books_for_team(team_id).await.unwrap().len(), 1);

        // Restore is only valid for soft-deleted books
        assert!(matches!(
            books.restore_book(book_id).await,
            Err(YamoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hard_delete_removes_everything() {
        let db = test_pool().await;
        let (teams, books, team_id, book_id) = seed(&db).await;

        sqlx::query(
            "INSERT INTO accounts (book_id, name, kind, created_at) VALUES (?1, 'Checking', 'cash', ?2)",
        )
        .bind(book_id)
        .bind(Utc::now())
        .execute(&db)
        .await
        .unwrap();

        teams.hard_delete_team(team_id).await.unwrap();

        assert!(books.books_for_team(team_id).await.unwrap().is_empty());
        assert!(books.accounts_for_book(book_id).await.unwrap().is_empty());
        assert!(matches!(
            teams.hard_delete_team(team_id).await,
            Err(YamoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_transaction_date_range() {
        let db = test_pool().await;
        let (_teams, books, _team_id, book_id) = seed(&db).await;

        for (date, cents) in [("2026-01-05", 100), ("2026-02-10", 200), ("2026-03-15", 300)] {
            sqlx::query(
                "INSERT INTO transactions (book_id, description, amount_cents, entry_date, created_at)
                 VALUES (?1, 'x', ?2, ?3, ?4)",
            )
            .bind(book_id)
            .bind(cents)
            .bind(date)
            .bind(Utc::now())
            .execute(&db)
            .await
            .unwrap();
        }

        let all = books.transactions_for_book(book_id, None, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let feb = books
            .transactions_for_book(
                book_id,
                Some(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()),
                Some(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(feb.len(), 1);
        assert_eq!(feb[0].amount_cents, 200);
    }

    #[tokio::test]
    async fn test_set_exercised() {
        let db = test_pool().await;
        let (_teams, books, _team_id, book_id) = seed(&db).await;

        let tx_id = sqlx::query(
            "INSERT INTO transactions (book_id, description, amount_cents, entry_date, created_at)
             VALUES (?1, 'rent', -90000, '2026-01-01', ?2)",
        )
        .bind(book_id)
        .bind(Utc::now())
        .execute(&db)
        .await
        .unwrap()
        .last_insert_rowid();

        books.set_exercised(tx_id, true).await.unwrap();
        let tx = books.find_transaction(tx_id).await.unwrap().unwrap();
        assert!(tx.exercised);

        assert!(matches!(
            books.set_exercised(tx_id + 99, true).await,
            Err(YamoError::NotFound(_))
        ));
    }
}
