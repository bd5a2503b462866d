//! Execution status recording

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::database::Database;
use crate::models::JobExecutionRecord;

/// Persists one record per execution attempt, on the firing task, after the
/// body has run. Recording failures are logged and swallowed so they never
/// alter the job's own outcome.
#[derive(Clone)]
pub struct ExecutionStatusRecorder {
    database: Database,
}

impl ExecutionStatusRecorder {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn record(
        &self,
        job_name: &str,
        job_group: &str,
        success: bool,
        failure_reason: Option<&str>,
    ) {
        let now = Utc::now();
        let record = JobExecutionRecord {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            job_group: job_group.to_string(),
            executed_at: now,
            success,
            failure_reason: if success {
                None
            } else {
                failure_reason.map(|r| r.to_string())
            },
            created_at: now,
        };

        if let Err(e) = self.database.insert_execution_record(&record).await {
            warn!(
                "Failed to record execution status for job '{}.{}': {}",
                job_group, job_name, e
            );
        }
    }
}
