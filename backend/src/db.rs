use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::BudgetData;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::domain::BudgetStore;

/// DbConnection manages database operations
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Private in-memory database, one per call
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        use sqlx::sqlite::SqlitePoolOptions;

        // A single connection that never recycles keeps the memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS budget_entries (
                username TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (username, key)
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Store one entry, overwriting any existing value for the same key.
    pub async fn put_value(&self, username: &str, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO budget_entries (username, key, value) VALUES (?, ?, ?)")
            .bind(username)
            .bind(key)
            .bind(value)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_value(&self, username: &str, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM budget_entries WHERE username = ? AND key = ?")
            .bind(username)
            .bind(key)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    /// Delete an entry, returning whether it existed
    pub async fn delete_value(&self, username: &str, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM budget_entries WHERE username = ? AND key = ?")
            .bind(username)
            .bind(key)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All entries of a user, ordered by key
    pub async fn list_values(&self, username: &str) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT key, value FROM budget_entries WHERE username = ? ORDER BY key")
            .bind(username)
            .fetch_all(&*self.pool)
            .await?;
        Ok(rows.iter().map(|row| (row.get("key"), row.get("value"))).collect())
    }

    /// Replace every entry of a user in one transaction
    pub async fn replace_values(&self, username: &str, entries: &[(String, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM budget_entries WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        for (key, value) in entries {
            sqlx::query("INSERT INTO budget_entries (username, key, value) VALUES (?, ?, ?)")
                .bind(username)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl BudgetStore for DbConnection {
    async fn load(&self, username: &str) -> Result<BudgetData> {
        self.list_values(username)
            .await?
            .into_iter()
            .map(|(key, raw)| {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt JSON stored under {}", key))?;
                Ok::<_, anyhow::Error>((key, value))
            })
            .collect()
    }

    async fn save(&self, username: &str, data: &BudgetData) -> Result<()> {
        let entries = data
            .iter()
            .map(|(key, value)| Ok::<_, anyhow::Error>((key.clone(), serde_json::to_string(value)?)))
            .collect::<Result<Vec<_>>>()?;
        self.replace_values(username, &entries).await
    }

    async fn get_entry(&self, username: &str, key: &str) -> Result<Option<serde_json::Value>> {
        match self.get_value(username, key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put_entry(&self, username: &str, key: &str, value: &serde_json::Value) -> Result<()> {
        self.put_value(username, key, &serde_json::to_string(value)?).await
    }

    async fn delete_entry(&self, username: &str, key: &str) -> Result<bool> {
        self.delete_value(username, key).await
    }
}
