use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub mod settings;
pub mod tasks;

pub use settings::SettingsRepository;
pub use tasks::{NewTask, RunMode, TaskRepository, TaskRow, TaskStatus};

/// Embedded SQLite store behind a connection pool. Schema creation is
/// idempotent and runs at connect time.
#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url: {url}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("connecting to database")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                plan        TEXT NOT NULL,
                task        TEXT NOT NULL UNIQUE,
                model       TEXT NOT NULL,
                threads     INTEGER NOT NULL,
                status      TEXT NOT NULL DEFAULT 'Running',
                success_num INTEGER NOT NULL DEFAULT 0,
                fail_num    INTEGER NOT NULL DEFAULT 0,
                stime       TEXT NOT NULL,
                etime       TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn settings(&self) -> SettingsRepository<'_> {
        SettingsRepository::new(&self.pool)
    }

    pub fn tasks(&self) -> TaskRepository<'_> {
        TaskRepository::new(&self.pool)
    }
}
