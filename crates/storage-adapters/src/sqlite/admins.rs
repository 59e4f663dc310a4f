use async_trait::async_trait;
use domains::{Admin, AdminRepository, DomainError, Result};
use sqlx::Row;

use super::{storage, SqliteStore};

#[async_trait]
impl AdminRepository for SqliteStore {
    async fn get_admin(&self, username: &str) -> Result<Admin> {
        let row = sqlx::query("SELECT username, password_hash FROM admins WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| DomainError::not_found("admin", username))?;

        Ok(Admin {
            username: row.try_get("username").map_err(storage)?,
            password_hash: row.try_get("password_hash").map_err(storage)?,
        })
    }

    /// Creates the account or replaces its password hash.
    async fn put_admin(&self, admin: Admin) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admins (username, password_hash) VALUES (?, ?)
            ON CONFLICT(username) DO UPDATE SET password_hash = excluded.password_hash
            "#,
        )
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }
}
