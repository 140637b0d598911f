//! Login repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{Login, LoginId};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[async_trait]
pub trait LoginRepository: Send + Sync {
    /// Insert the login or refresh its profile fields
    async fn upsert(&self, login: &Login) -> Result<()>;

    async fn get(&self, id: LoginId) -> Result<Option<Login>>;

    /// Record activity for a login
    ///
    /// # Errors
    /// `LibraryError::NotFound` if the login was never stored.
    async fn touch(&self, id: LoginId, last_used: i64) -> Result<()>;

    /// Logins ordered by `last_used`, newest first
    async fn most_recent(&self, limit: u32) -> Result<Vec<Login>>;
}

pub struct SqliteLoginRepository {
    pool: SqlitePool,
}

impl SqliteLoginRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

type LoginRow = (i64, String, Option<String>, i64);

fn from_row((id, name, medium_avatar, last_used): LoginRow) -> Login {
    Login {
        id: LoginId(id),
        name,
        medium_avatar,
        last_used,
    }
}

#[async_trait]
impl LoginRepository for SqliteLoginRepository {
    async fn upsert(&self, login: &Login) -> Result<()> {
        if login.name.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "name".to_string(),
                message: "Login name cannot be empty".to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO logins (id, name, medium_avatar, last_used)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                medium_avatar = excluded.medium_avatar,
                last_used = MAX(logins.last_used, excluded.last_used)
            "#,
        )
        .bind(login.id.0)
        .bind(&login.name)
        .bind(&login.medium_avatar)
        .bind(login.last_used)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: LoginId) -> Result<Option<Login>> {
        let row: Option<LoginRow> = sqlx::query_as(
            "SELECT id, name, medium_avatar, last_used FROM logins WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    async fn touch(&self, id: LoginId, last_used: i64) -> Result<()> {
        let result = sqlx::query("UPDATE logins SET last_used = ? WHERE id = ?")
            .bind(last_used)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Login".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn most_recent(&self, limit: u32) -> Result<Vec<Login>> {
        let rows: Vec<LoginRow> = sqlx::query_as(
            "SELECT id, name, medium_avatar, last_used FROM logins ORDER BY last_used DESC, id ASC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn login(id: i64, name: &str, last_used: i64) -> Login {
        Login {
            id: LoginId(id),
            name: name.to_string(),
            medium_avatar: Some(format!("https://img.example/{}.png", id)),
            last_used,
        }
    }

    async fn setup() -> SqliteLoginRepository {
        SqliteLoginRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = setup().await;
        repo.upsert(&login(1, "alice", 100)).await.unwrap();

        let mut renamed = login(1, "alice2", 50);
        renamed.medium_avatar = None;
        repo.upsert(&renamed).await.unwrap();

        let stored = repo.get(LoginId(1)).await.unwrap().unwrap();
        assert_eq!(stored.name, "alice2");
        assert_eq!(stored.medium_avatar, None);
        // last_used never moves backwards on re-registration
        assert_eq!(stored.last_used, 100);
    }

    #[tokio::test]
    async fn test_upsert_rejects_blank_name() {
        let repo = setup().await;
        let result = repo.upsert(&login(1, " ", 0)).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_touch_and_most_recent() {
        let repo = setup().await;
        repo.upsert(&login(1, "alice", 100)).await.unwrap();
        repo.upsert(&login(2, "bob", 200)).await.unwrap();

        repo.touch(LoginId(1), 300).await.unwrap();

        let recent = repo.most_recent(10).await.unwrap();
        let ids: Vec<i64> = recent.iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_touch_unknown_login() {
        let repo = setup().await;
        let result = repo.touch(LoginId(9), 1).await;
        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }
}
