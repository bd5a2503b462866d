#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use job_scheduler::config::DatabaseConfig;
use job_scheduler::database::Database;
use job_scheduler::models::{JobDefinition, JobScheduleRequest, ScheduleKind};
use job_scheduler::scheduling::{JobRunner, SchedulingCoordinator, TriggerEngine};

/// Job body that counts fires and can simulate failures.
pub struct CountingRunner {
    pub fired: AtomicUsize,
    pub fail: bool,
}

impl CountingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fired: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fired: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn fire_count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRunner for CountingRunner {
    async fn run(&self, _definition: &JobDefinition) -> Result<()> {
        self.fired.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("simulated job failure");
        }
        Ok(())
    }
}

pub async fn test_database() -> Database {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
    };
    let database = Database::new(&config).await.expect("database setup");
    database.migrate().await.expect("migrations");
    database
}

pub fn test_coordinator(database: Database, runner: Arc<dyn JobRunner>) -> SchedulingCoordinator {
    let engine = TriggerEngine::new(chrono_tz::UTC, true);
    SchedulingCoordinator::new(database, engine, runner)
}

pub fn cron_request(name: &str, group: &str, expression: &str) -> JobScheduleRequest {
    JobScheduleRequest {
        name: name.to_string(),
        group: group.to_string(),
        kind: ScheduleKind::Cron,
        cron_expression: Some(expression.to_string()),
        delay_ms: None,
        rate_ms: None,
        start_at: None,
    }
}

pub fn fixed_delay_request(name: &str, group: &str, delay_ms: i64) -> JobScheduleRequest {
    JobScheduleRequest {
        name: name.to_string(),
        group: group.to_string(),
        kind: ScheduleKind::FixedDelay,
        cron_expression: None,
        delay_ms: Some(delay_ms),
        rate_ms: None,
        start_at: None,
    }
}

pub fn fixed_rate_request(name: &str, group: &str, rate_ms: i64) -> JobScheduleRequest {
    JobScheduleRequest {
        name: name.to_string(),
        group: group.to_string(),
        kind: ScheduleKind::FixedRate,
        cron_expression: None,
        delay_ms: None,
        rate_ms: Some(rate_ms),
        start_at: None,
    }
}

pub fn one_time_request(
    name: &str,
    group: &str,
    start_at: chrono::DateTime<chrono::Utc>,
) -> JobScheduleRequest {
    JobScheduleRequest {
        name: name.to_string(),
        group: group.to_string(),
        kind: ScheduleKind::OneTime,
        cron_expression: None,
        delay_ms: None,
        rate_ms: None,
        start_at: Some(start_at),
    }
}
