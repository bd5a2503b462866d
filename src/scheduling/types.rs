//! Scheduling type definitions

use chrono::{DateTime, Utc};
use cron::Schedule;
use futures::future::BoxFuture;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::SchedulerError;
use crate::models::{JobDefinition, ScheduleKind};

/// Parsed, validated schedule for one job; one arm per schedule kind.
#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    /// Evaluated against a fixed time zone; fires indefinitely until canceled.
    Cron(Schedule),
    /// Next fire `delay` after the previous fire completes (non-overlapping).
    FixedDelay(Duration),
    /// Fires every `rate` from the initial fire time; fires may overlap.
    FixedRate(Duration),
    /// Fires exactly once at the given instant, then the handle self-retires.
    OneTime(DateTime<Utc>),
}

impl ScheduleSpec {
    pub fn from_definition(def: &JobDefinition) -> Result<Self, SchedulerError> {
        Self::from_fields(
            def.kind,
            def.cron_expression.as_deref(),
            def.delay_ms,
            def.rate_ms,
            def.start_at,
        )
    }

    /// Validate that exactly one schedule field is populated and that it
    /// matches the declared kind, then parse it. Rejecting here, before any
    /// store write, is what keeps a bad request from leaving a row behind.
    pub fn from_fields(
        kind: ScheduleKind,
        cron_expression: Option<&str>,
        delay_ms: Option<i64>,
        rate_ms: Option<i64>,
        start_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SchedulerError> {
        let populated = [
            cron_expression.is_some(),
            delay_ms.is_some(),
            rate_ms.is_some(),
            start_at.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();

        if populated != 1 {
            return Err(SchedulerError::validation(
                "Exactly one of cron_expression, delay_ms, rate_ms or start_at \
                 must be provided; choose one",
            ));
        }

        match kind {
            ScheduleKind::Cron => {
                let expr = cron_expression.ok_or_else(|| {
                    SchedulerError::validation("cron jobs require cron_expression")
                })?;
                let schedule = Schedule::from_str(expr).map_err(|e| {
                    SchedulerError::validation(format!("Invalid cron expression '{expr}': {e}"))
                })?;
                Ok(ScheduleSpec::Cron(schedule))
            }
            ScheduleKind::FixedDelay => {
                let ms = delay_ms.ok_or_else(|| {
                    SchedulerError::validation("fixed_delay jobs require delay_ms")
                })?;
                if ms <= 0 {
                    return Err(SchedulerError::validation("delay_ms must be positive"));
                }
                Ok(ScheduleSpec::FixedDelay(Duration::from_millis(ms as u64)))
            }
            ScheduleKind::FixedRate => {
                let ms = rate_ms
                    .ok_or_else(|| SchedulerError::validation("fixed_rate jobs require rate_ms"))?;
                if ms <= 0 {
                    return Err(SchedulerError::validation("rate_ms must be positive"));
                }
                Ok(ScheduleSpec::FixedRate(Duration::from_millis(ms as u64)))
            }
            ScheduleKind::OneTime => {
                let at = start_at
                    .ok_or_else(|| SchedulerError::validation("one_time jobs require start_at"))?;
                Ok(ScheduleSpec::OneTime(at))
            }
        }
    }

    pub fn kind(&self) -> ScheduleKind {
        match self {
            ScheduleSpec::Cron(_) => ScheduleKind::Cron,
            ScheduleSpec::FixedDelay(_) => ScheduleKind::FixedDelay,
            ScheduleSpec::FixedRate(_) => ScheduleKind::FixedRate,
            ScheduleSpec::OneTime(_) => ScheduleKind::OneTime,
        }
    }
}

/// What a fire callback tells the engine loop after each dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Keep the trigger armed.
    Continue,
    /// Stop firing; the job was stopped, replaced or completed.
    Retire,
}

/// Callback invoked on every fire; owns the stale-check, the job body and
/// the status recording.
pub type FireCallback = Arc<dyn Fn() -> BoxFuture<'static, FireOutcome> + Send + Sync>;
