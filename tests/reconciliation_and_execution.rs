//! Startup reconciliation and execution recording tests.

mod common;

use chrono::{Duration, Utc};
use common::*;

use job_scheduler::models::JobKey;

#[tokio::test]
async fn test_reconciliation_arms_all_active_rows() {
    let database = test_database().await;

    // Seed the store directly: three active rows, one stopped, no handles
    let seeding = test_coordinator(database.clone(), CountingRunner::new());
    seeding
        .schedule(cron_request("a", "batch", "0 0 0 * * * *"))
        .await
        .unwrap();
    seeding
        .schedule(fixed_delay_request("b", "batch", 60_000))
        .await
        .unwrap();
    seeding
        .schedule(fixed_rate_request("c", "infra", 60_000))
        .await
        .unwrap();
    seeding
        .schedule(fixed_delay_request("d", "infra", 60_000))
        .await
        .unwrap();
    seeding.stop("d", "infra").await.unwrap();

    // A fresh coordinator simulates a process restart: empty registry,
    // populated store
    let coordinator = test_coordinator(database, CountingRunner::new());
    assert!(coordinator.list().is_empty());

    let armed = coordinator.reconcile().await.unwrap();
    assert_eq!(armed, 3);

    let listed = coordinator.list();
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().any(|info| info.name == "a"));
    assert!(listed.iter().any(|info| info.name == "b"));
    assert!(listed.iter().any(|info| info.name == "c"));
    assert!(!listed.iter().any(|info| info.name == "d"));
}

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let database = test_database().await;

    let seeding = test_coordinator(database.clone(), CountingRunner::new());
    seeding
        .schedule(cron_request("a", "batch", "0 0 0 * * * *"))
        .await
        .unwrap();

    let coordinator = test_coordinator(database, CountingRunner::new());
    assert_eq!(coordinator.reconcile().await.unwrap(), 1);
    // Second pass finds the handle already armed
    assert_eq!(coordinator.reconcile().await.unwrap(), 0);
    assert_eq!(coordinator.list().len(), 1);
}

#[tokio::test]
async fn test_file_backed_store_survives_restart() {
    use job_scheduler::config::DatabaseConfig;
    use job_scheduler::database::Database;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("scheduler.db").display());
    let config = DatabaseConfig {
        url,
        max_connections: Some(5),
    };

    let database = Database::new(&config).await.unwrap();
    database.migrate().await.unwrap();
    let coordinator = test_coordinator(database, CountingRunner::new());
    coordinator
        .schedule(cron_request("a", "batch", "0 0 0 * * * *"))
        .await
        .unwrap();
    drop(coordinator);

    // A fresh pool over the same file simulates a process restart
    let database = Database::new(&config).await.unwrap();
    database.migrate().await.unwrap();
    let coordinator = test_coordinator(database, CountingRunner::new());
    assert_eq!(coordinator.reconcile().await.unwrap(), 1);

    let listed = coordinator.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "a");
    assert_eq!(listed[0].trigger_expression, "0 0 0 * * * *");
}

#[tokio::test]
async fn test_one_time_job_fires_once_and_soft_disables() {
    let database = test_database().await;
    let runner = CountingRunner::new();
    let coordinator = test_coordinator(database.clone(), runner.clone());

    coordinator
        .schedule(one_time_request(
            "migration",
            "infra",
            Utc::now() + Duration::milliseconds(300),
        ))
        .await
        .unwrap();
    assert_eq!(coordinator.list().len(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    assert_eq!(runner.fire_count(), 1);
    assert!(coordinator.list().is_empty());

    let key = JobKey::new("migration", "infra");
    let def = database.get_job_by_key(&key).await.unwrap().unwrap();
    assert!(def.stopped);

    let records = database.list_execution_records(&key, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert!(records[0].failure_reason.is_none());
}

#[tokio::test]
async fn test_failed_execution_is_recorded_with_reason() {
    let database = test_database().await;
    let runner = CountingRunner::failing();
    let coordinator = test_coordinator(database.clone(), runner.clone());

    coordinator
        .schedule(one_time_request(
            "flaky",
            "infra",
            Utc::now() + Duration::milliseconds(300),
        ))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    assert_eq!(runner.fire_count(), 1);

    let key = JobKey::new("flaky", "infra");
    let records = database.list_execution_records(&key, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(
        records[0].failure_reason.as_deref(),
        Some("simulated job failure")
    );
}

#[tokio::test]
async fn test_stopped_flag_halts_interval_job_on_next_fire() {
    let database = test_database().await;
    let runner = CountingRunner::new();
    let coordinator = test_coordinator(database.clone(), runner.clone());

    coordinator
        .schedule(fixed_delay_request("poller", "batch", 200))
        .await
        .unwrap();

    // Flip the persisted flag behind the coordinator's back; the fire-time
    // store check must notice and let the trigger wind down on its own
    let key = JobKey::new("poller", "batch");
    database.set_job_stopped(&key, true).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    assert_eq!(runner.fire_count(), 0);
    assert!(coordinator.list().is_empty());
}
