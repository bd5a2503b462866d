use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Pool, Sqlite};

use crate::config::DatabaseConfig;

pub mod execution_status;
pub mod jobs;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        // Create database if it doesn't exist (file-backed SQLite only)
        if !config.url.contains(":memory:") && !Sqlite::database_exists(&config.url).await? {
            Sqlite::create_database(&config.url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(10))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scheduler_jobs (
                id TEXT PRIMARY KEY,
                job_name TEXT NOT NULL,
                job_group TEXT NOT NULL,
                schedule_kind TEXT NOT NULL,
                cron_expression TEXT,
                delay_ms INTEGER,
                rate_ms INTEGER,
                start_at TEXT,
                is_stopped BOOLEAN NOT NULL DEFAULT FALSE,
                instance_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (job_name, job_group)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_execution_status (
                id TEXT PRIMARY KEY,
                job_name TEXT NOT NULL,
                job_group TEXT NOT NULL,
                executed_at TEXT NOT NULL,
                success BOOLEAN NOT NULL,
                failure_reason TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scheduler_jobs_stopped
             ON scheduler_jobs (is_stopped)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_job_execution_status_job
             ON job_execution_status (job_name, job_group)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Helper function to parse datetime from either RFC3339 or SQLite format
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    Err(sqlx::Error::Decode(
        format!("Failed to parse datetime: {s}").into(),
    ))
}
