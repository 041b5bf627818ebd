use anyhow::Result;
use sqlx::SqlitePool;

/// Dashboard key/value settings (the UI language lives here).
pub struct SettingsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT INTO settings (key, value) VALUES (?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn update(&self, key: &str, value: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE settings SET value = ?2 WHERE key = ?1")
            .bind(key)
            .bind(value)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?1")
                .bind(key)
                .fetch_optional(self.pool)
                .await?;
        Ok(value.map(|(v,)| v))
    }
}
