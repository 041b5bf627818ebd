use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum::{Display, EnumString};

/// Execution model recorded with every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunMode {
    #[default]
    Local,
    Remote,
}

/// Lifecycle of a task row. `Running` rows belong to a live subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum TaskStatus {
    Running,
    Done,
    Error,
}

/// One timestamped run of a plan.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TaskRow {
    pub id: i64,
    pub plan: String,
    pub task: String,
    pub model: String,
    pub threads: i64,
    pub status: String,
    pub success_num: i64,
    pub fail_num: i64,
    pub stime: DateTime<Utc>,
    pub etime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub plan: String,
    pub task: String,
    pub model: RunMode,
    pub threads: u32,
}

pub struct TaskRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TaskRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a fresh `Running` row, start time now.
    pub async fn create(&self, new: &NewTask) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (plan, task, model, threads, status, stime)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&new.plan)
        .bind(&new.task)
        .bind(new.model.to_string())
        .bind(new.threads as i64)
        .bind(TaskStatus::Running.to_string())
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Close out a finished run with its pass/fail counts.
    pub async fn complete(&self, task: &str, success_num: i64, fail_num: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?2, success_num = ?3, fail_num = ?4, etime = ?5
            WHERE task = ?1
            "#,
        )
        .bind(task)
        .bind(TaskStatus::Done.to_string())
        .bind(success_num)
        .bind(fail_num)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_error(&self, task: &str) -> Result<()> {
        sqlx::query("UPDATE tasks SET status = ?2, etime = ?3 WHERE task = ?1")
            .bind(task)
            .bind(TaskStatus::Error.to_string())
            .bind(Utc::now())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_one(&self, plan: &str, task: &str) -> Result<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE plan = ?1 AND task = ?2",
        )
        .bind(plan)
        .bind(task)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_for_plan(&self, plan: &str) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE plan = ?1 ORDER BY stime DESC",
        )
        .bind(plan)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_all(&self) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks ORDER BY stime DESC")
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Cascade used when a plan directory is deleted.
    pub async fn delete_for_plan(&self, plan: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE plan = ?1")
            .bind(plan)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    async fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let store = Store::connect(&url).await.unwrap();
        (dir, store)
    }

    fn new_task(plan: &str, task: &str) -> NewTask {
        NewTask {
            plan: plan.into(),
            task: task.into(),
            model: RunMode::Local,
            threads: 10,
        }
    }

    #[tokio::test]
    async fn create_and_complete() {
        let (_dir, store) = temp_store().await;
        store.tasks().create(&new_task("smoke", "smoke-240101010101")).await.unwrap();

        let row = store.tasks().find_one("smoke", "smoke-240101010101").await.unwrap().unwrap();
        assert_eq!(row.status, "Running");
        assert!(row.etime.is_none());

        store.tasks().complete("smoke-240101010101", 95, 5).await.unwrap();
        let row = store.tasks().find_one("smoke", "smoke-240101010101").await.unwrap().unwrap();
        assert_eq!(row.status, "Done");
        assert_eq!(row.success_num, 95);
        assert_eq!(row.fail_num, 5);
        assert!(row.etime.is_some());
    }

    #[tokio::test]
    async fn mark_error_closes_the_row() {
        let (_dir, store) = temp_store().await;
        store.tasks().create(&new_task("smoke", "smoke-240101010101")).await.unwrap();
        store.tasks().mark_error("smoke-240101010101").await.unwrap();

        let row = store.tasks().find_one("smoke", "smoke-240101010101").await.unwrap().unwrap();
        assert_eq!(row.status, "Error");
        assert!(row.etime.is_some());
    }

    #[tokio::test]
    async fn duplicate_task_id_rejected() {
        let (_dir, store) = temp_store().await;
        store.tasks().create(&new_task("smoke", "smoke-240101010101")).await.unwrap();
        assert!(store.tasks().create(&new_task("smoke", "smoke-240101010101")).await.is_err());
    }

    #[tokio::test]
    async fn listing_and_cascade_delete() {
        let (_dir, store) = temp_store().await;
        store.tasks().create(&new_task("a", "a-1")).await.unwrap();
        store.tasks().create(&new_task("a", "a-2")).await.unwrap();
        store.tasks().create(&new_task("b", "b-1")).await.unwrap();

        assert_eq!(store.tasks().list_for_plan("a").await.unwrap().len(), 2);
        assert_eq!(store.tasks().list_all().await.unwrap().len(), 3);

        let deleted = store.tasks().delete_for_plan("a").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.tasks().list_for_plan("a").await.unwrap().is_empty());
    }

    #[test]
    fn run_mode_round_trips_as_text() {
        assert_eq!(RunMode::Local.to_string(), "local");
        assert_eq!(RunMode::Remote.to_string(), "remote");
        assert_eq!("remote".parse::<RunMode>().unwrap(), RunMode::Remote);
    }
}
