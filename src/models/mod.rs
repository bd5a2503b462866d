use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a job's fire times are derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Cron,
    FixedDelay,
    FixedRate,
    OneTime,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Cron => "cron",
            ScheduleKind::FixedDelay => "fixed_delay",
            ScheduleKind::FixedRate => "fixed_rate",
            ScheduleKind::OneTime => "one_time",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cron" => Some(ScheduleKind::Cron),
            "fixed_delay" => Some(ScheduleKind::FixedDelay),
            "fixed_rate" => Some(ScheduleKind::FixedRate),
            "one_time" => Some(ScheduleKind::OneTime),
            _ => None,
        }
    }
}

/// Job identity: `(name, group)` unique together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub name: String,
    pub group: String,
}

impl JobKey {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Durable description of what to run and when.
///
/// Exactly one of `cron_expression`, `delay_ms`, `rate_ms`, `start_at` is
/// populated, consistent with `kind`. The row persists after a stop
/// (soft-disable) until an explicit delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub id: Uuid,
    pub name: String,
    pub group: String,
    pub kind: ScheduleKind,
    pub cron_expression: Option<String>,
    pub delay_ms: Option<i64>,
    pub rate_ms: Option<i64>,
    pub start_at: Option<DateTime<Utc>>,
    pub stopped: bool,
    /// Regenerated on every reschedule; fires armed under an older value
    /// are discarded as stale.
    pub instance_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobDefinition {
    pub fn key(&self) -> JobKey {
        JobKey::new(&self.name, &self.group)
    }

    /// Human-readable trigger expression for list responses: the cron text,
    /// the interval in milliseconds, or the absolute fire time.
    pub fn trigger_expression(&self) -> String {
        match self.kind {
            ScheduleKind::Cron => self.cron_expression.clone().unwrap_or_default(),
            ScheduleKind::FixedDelay => self.delay_ms.map(|ms| ms.to_string()).unwrap_or_default(),
            ScheduleKind::FixedRate => self.rate_ms.map(|ms| ms.to_string()).unwrap_or_default(),
            ScheduleKind::OneTime => self.start_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        }
    }
}

/// Append-only record of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionRecord {
    pub id: Uuid,
    pub job_name: String,
    pub job_group: String,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for scheduling a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobScheduleRequest {
    pub name: String,
    pub group: String,
    pub kind: ScheduleKind,
    pub cron_expression: Option<String>,
    pub delay_ms: Option<i64>,
    pub rate_ms: Option<i64>,
    pub start_at: Option<DateTime<Utc>>,
}

/// Request body for updating an existing job's schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobUpdateRequest {
    pub group: String,
    pub kind: ScheduleKind,
    pub cron_expression: Option<String>,
    pub delay_ms: Option<i64>,
    pub rate_ms: Option<i64>,
    pub start_at: Option<DateTime<Utc>>,
}

/// One entry per currently armed trigger, as returned by list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTriggerInfo {
    pub name: String,
    pub group: String,
    pub trigger_kind: ScheduleKind,
    pub trigger_expression: String,
}

/// Human-readable outcome of a lifecycle operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_kind_round_trip() {
        for kind in [
            ScheduleKind::Cron,
            ScheduleKind::FixedDelay,
            ScheduleKind::FixedRate,
            ScheduleKind::OneTime,
        ] {
            assert_eq!(ScheduleKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ScheduleKind::parse("simple"), None);
    }

    #[test]
    fn test_trigger_expression_per_kind() {
        let now = Utc::now();
        let mut def = JobDefinition {
            id: Uuid::new_v4(),
            name: "nightly".to_string(),
            group: "batch".to_string(),
            kind: ScheduleKind::Cron,
            cron_expression: Some("0 0 0 * * * *".to_string()),
            delay_ms: None,
            rate_ms: None,
            start_at: None,
            stopped: false,
            instance_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(def.trigger_expression(), "0 0 0 * * * *");

        def.kind = ScheduleKind::FixedDelay;
        def.cron_expression = None;
        def.delay_ms = Some(5000);
        assert_eq!(def.trigger_expression(), "5000");

        def.kind = ScheduleKind::OneTime;
        def.delay_ms = None;
        def.start_at = Some(now);
        assert_eq!(def.trigger_expression(), now.to_rfc3339());
    }

    #[test]
    fn test_job_key_display() {
        let key = JobKey::new("nightly", "batch");
        assert_eq!(key.to_string(), "batch.nightly");
    }
}
