//! Append-only execution status records. The core never mutates or deletes
//! rows here; retention is an external concern.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_datetime, Database};
use crate::models::{JobExecutionRecord, JobKey};

fn map_record_row(row: &SqliteRow) -> Result<JobExecutionRecord, sqlx::Error> {
    let id: String = row.get("id");
    let executed_at: String = row.get("executed_at");
    let created_at: String = row.get("created_at");

    Ok(JobExecutionRecord {
        id: Uuid::parse_str(&id).map_err(|e| sqlx::Error::Decode(e.to_string().into()))?,
        job_name: row.get("job_name"),
        job_group: row.get("job_group"),
        executed_at: parse_datetime(&executed_at)?,
        success: row.get("success"),
        failure_reason: row.get("failure_reason"),
        created_at: parse_datetime(&created_at)?,
    })
}

impl Database {
    pub async fn insert_execution_record(
        &self,
        record: &JobExecutionRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO job_execution_status
            (id, job_name, job_group, executed_at, success, failure_reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.job_name)
        .bind(&record.job_group)
        .bind(record.executed_at.to_rfc3339())
        .bind(record.success)
        .bind(&record.failure_reason)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent execution records for one job identity.
    pub async fn list_execution_records(
        &self,
        key: &JobKey,
        limit: i64,
    ) -> Result<Vec<JobExecutionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, job_name, job_group, executed_at, success, failure_reason, created_at
             FROM job_execution_status
             WHERE job_name = ? AND job_group = ?
             ORDER BY executed_at DESC
             LIMIT ?",
        )
        .bind(&key.name)
        .bind(&key.group)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_record_row).collect()
    }
}
