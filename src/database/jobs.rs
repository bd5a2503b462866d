//! Job definition CRUD and the active-job query backing startup
//! reconciliation.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_datetime, Database};
use crate::models::{JobDefinition, JobKey, ScheduleKind};

const JOB_COLUMNS: &str = "id, job_name, job_group, schedule_kind, cron_expression, delay_ms,
     rate_ms, start_at, is_stopped, instance_id, created_at, updated_at";

fn map_job_row(row: &SqliteRow) -> Result<JobDefinition, sqlx::Error> {
    let kind_str: String = row.get("schedule_kind");
    let kind = ScheduleKind::parse(&kind_str)
        .ok_or_else(|| sqlx::Error::Decode(format!("Unknown schedule kind: {kind_str}").into()))?;

    let id: String = row.get("id");
    let instance_id: String = row.get("instance_id");
    let start_at: Option<String> = row.get("start_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(JobDefinition {
        id: Uuid::parse_str(&id).map_err(|e| sqlx::Error::Decode(e.to_string().into()))?,
        name: row.get("job_name"),
        group: row.get("job_group"),
        kind,
        cron_expression: row.get("cron_expression"),
        delay_ms: row.get("delay_ms"),
        rate_ms: row.get("rate_ms"),
        start_at: start_at.map(|s| parse_datetime(&s)).transpose()?,
        stopped: row.get("is_stopped"),
        instance_id: Uuid::parse_str(&instance_id)
            .map_err(|e| sqlx::Error::Decode(e.to_string().into()))?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

impl Database {
    pub async fn create_job(&self, def: &JobDefinition) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_jobs
            (id, job_name, job_group, schedule_kind, cron_expression, delay_ms, rate_ms,
             start_at, is_stopped, instance_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(def.id.to_string())
        .bind(&def.name)
        .bind(&def.group)
        .bind(def.kind.as_str())
        .bind(&def.cron_expression)
        .bind(def.delay_ms)
        .bind(def.rate_ms)
        .bind(def.start_at.map(|t| t.to_rfc3339()))
        .bind(def.stopped)
        .bind(def.instance_id.to_string())
        .bind(def.created_at.to_rfc3339())
        .bind(def.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Option<JobDefinition>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM scheduler_jobs WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_job_row).transpose()
    }

    pub async fn get_job_by_key(&self, key: &JobKey) -> Result<Option<JobDefinition>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM scheduler_jobs WHERE job_name = ? AND job_group = ?"
        ))
        .bind(&key.name)
        .bind(&key.group)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_job_row).transpose()
    }

    pub async fn update_job(&self, def: &JobDefinition) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE scheduler_jobs
            SET job_name = ?, job_group = ?, schedule_kind = ?, cron_expression = ?,
                delay_ms = ?, rate_ms = ?, start_at = ?, is_stopped = ?, instance_id = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&def.name)
        .bind(&def.group)
        .bind(def.kind.as_str())
        .bind(&def.cron_expression)
        .bind(def.delay_ms)
        .bind(def.rate_ms)
        .bind(def.start_at.map(|t| t.to_rfc3339()))
        .bind(def.stopped)
        .bind(def.instance_id.to_string())
        .bind(def.updated_at.to_rfc3339())
        .bind(def.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_job_stopped(&self, key: &JobKey, stopped: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE scheduler_jobs SET is_stopped = ?, updated_at = ?
             WHERE job_name = ? AND job_group = ?",
        )
        .bind(stopped)
        .bind(Utc::now().to_rfc3339())
        .bind(&key.name)
        .bind(&key.group)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_job(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM scheduler_jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All definitions with `stopped = false`, in stable order.
    pub async fn find_active_jobs(&self) -> Result<Vec<JobDefinition>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM scheduler_jobs
             WHERE is_stopped = ? ORDER BY job_group, job_name"
        ))
        .bind(false)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_job_row).collect()
    }
}
