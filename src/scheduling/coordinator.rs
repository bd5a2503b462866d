//! Scheduling coordinator: the lifecycle state machine for jobs.
//!
//! Owns the in-memory registry of armed triggers and keeps it consistent
//! with the durable store. The store is the single source of truth; the
//! registry is a cache of "what is currently armed" and every fire
//! re-checks the store's `stopped` flag and `instance_id` before running.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::recorder::ExecutionStatusRecorder;
use super::runner::JobRunner;
use super::trigger::{TriggerEngine, TriggerHandle};
use super::types::{FireCallback, FireOutcome, ScheduleSpec};
use crate::database::Database;
use crate::errors::SchedulerError;
use crate::models::{
    JobDefinition, JobKey, JobScheduleRequest, JobTriggerInfo, JobUpdateRequest, ScheduleKind,
};

/// Runtime-only registry entry: the armed trigger plus the instance id it
/// was created for. Never persisted.
struct ActiveHandle {
    handle: TriggerHandle,
    instance_id: Uuid,
    expression: String,
}

/// Coordinates job lifecycle operations against the trigger engine and the
/// durable store.
///
/// Each `(name, group)` identity has its own lock: operations on different
/// jobs proceed fully in parallel, operations on the same job are totally
/// ordered. Lock entries are retained for the life of the coordinator;
/// removing one while a caller still holds its `Arc` would let two callers
/// serialize on different mutexes for the same identity.
#[derive(Clone)]
pub struct SchedulingCoordinator {
    database: Database,
    engine: TriggerEngine,
    recorder: ExecutionStatusRecorder,
    runner: Arc<dyn JobRunner>,
    registry: Arc<DashMap<JobKey, ActiveHandle>>,
    job_locks: Arc<DashMap<JobKey, Arc<Mutex<()>>>>,
}

impl SchedulingCoordinator {
    pub fn new(database: Database, engine: TriggerEngine, runner: Arc<dyn JobRunner>) -> Self {
        let recorder = ExecutionStatusRecorder::new(database.clone());
        Self {
            database,
            engine,
            recorder,
            runner,
            registry: Arc::new(DashMap::new()),
            job_locks: Arc::new(DashMap::new()),
        }
    }

    fn job_lock(&self, key: &JobKey) -> Arc<Mutex<()>> {
        self.job_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn has_active_handle(&self, key: &JobKey) -> bool {
        self.registry
            .get(key)
            .map(|entry| entry.handle.is_active())
            .unwrap_or(false)
    }

    /// Validate, persist and arm a new job definition.
    ///
    /// The store write happens-before the handle registration: a crash
    /// between the two leaves a "defined but not armed" row that the next
    /// startup reconciliation re-arms.
    pub async fn schedule(&self, request: JobScheduleRequest) -> Result<String, SchedulerError> {
        let spec = ScheduleSpec::from_fields(
            request.kind,
            request.cron_expression.as_deref(),
            request.delay_ms,
            request.rate_ms,
            request.start_at,
        )?;

        let key = JobKey::new(&request.name, &request.group);
        let lock = self.job_lock(&key);
        let _guard = lock.lock().await;

        if self.database.get_job_by_key(&key).await?.is_some() {
            return Err(SchedulerError::conflict(&key));
        }

        let now = Utc::now();
        let def = JobDefinition {
            id: Uuid::new_v4(),
            name: request.name,
            group: request.group,
            kind: request.kind,
            cron_expression: request.cron_expression,
            delay_ms: request.delay_ms,
            rate_ms: request.rate_ms,
            start_at: request.start_at,
            stopped: false,
            instance_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };

        self.database.create_job(&def).await?;
        self.arm_job(&def, spec);

        info!("Scheduled job '{}' ({})", key, def.kind.as_str());
        Ok("Job scheduled successfully and persisted".to_string())
    }

    /// One entry per currently armed, non-paused trigger. Reads the live
    /// handles, not the store, so stopped and paused jobs are omitted by
    /// construction.
    pub fn list(&self) -> Vec<JobTriggerInfo> {
        self.registry
            .iter()
            .filter(|entry| entry.handle.is_active() && !entry.handle.is_paused())
            .map(|entry| JobTriggerInfo {
                name: entry.key().name.clone(),
                group: entry.key().group.clone(),
                trigger_kind: entry.handle.kind(),
                trigger_expression: entry.expression.clone(),
            })
            .collect()
    }

    /// Cancel the job's trigger and soft-disable its row. Idempotent: a job
    /// with no active handle is a no-op success.
    pub async fn stop(&self, name: &str, group: &str) -> Result<String, SchedulerError> {
        let key = JobKey::new(name, group);
        let lock = self.job_lock(&key);
        let _guard = lock.lock().await;

        let def = self
            .database
            .get_job_by_key(&key)
            .await?
            .ok_or_else(|| SchedulerError::not_found(&key))?;

        let had_handle = self.cancel_and_mark_stopped(&key, &def).await?;
        if had_handle {
            info!("Stopped job '{}'", key);
        } else {
            debug!("Job '{}' has no active trigger, stop is a no-op", key);
        }
        Ok("Job stopped successfully".to_string())
    }

    /// Re-arm a stopped job from its stored schedule.
    pub async fn restart(&self, name: &str, group: &str) -> Result<String, SchedulerError> {
        let key = JobKey::new(name, group);
        let lock = self.job_lock(&key);
        let _guard = lock.lock().await;

        let def = self
            .database
            .get_job_by_key(&key)
            .await?
            .ok_or_else(|| SchedulerError::not_found(&key))?;

        if self.has_active_handle(&key) {
            info!("Job '{}' is already active, restart skipped", key);
            return Ok("Job is already active".to_string());
        }

        self.rearm_from_store(def).await?;
        info!("Restarted job '{}'", key);
        Ok("Job restarted successfully".to_string())
    }

    /// Suspend a cron job's dispatch while its handle stays registered.
    /// The fixed-interval kinds have no native pause in the underlying
    /// primitive, so pause degrades to a persisted stop.
    pub async fn pause(&self, name: &str, group: &str) -> Result<String, SchedulerError> {
        let key = JobKey::new(name, group);
        let lock = self.job_lock(&key);
        let _guard = lock.lock().await;

        let def = self
            .database
            .get_job_by_key(&key)
            .await?
            .ok_or_else(|| SchedulerError::not_found(&key))?;

        match def.kind {
            ScheduleKind::Cron => {
                match self.registry.get(&key) {
                    Some(entry) if entry.handle.is_active() => {
                        entry.handle.pause();
                        info!("Paused job '{}'", key);
                        Ok("Job paused successfully".to_string())
                    }
                    _ => Ok("Job has no active trigger".to_string()),
                }
            }
            _ => {
                self.cancel_and_mark_stopped(&key, &def).await?;
                info!("Paused job '{}' by stopping its trigger", key);
                Ok("Job paused successfully".to_string())
            }
        }
    }

    /// Resume a paused cron job, or re-arm a stopped job.
    pub async fn resume(&self, name: &str, group: &str) -> Result<String, SchedulerError> {
        let key = JobKey::new(name, group);
        let lock = self.job_lock(&key);
        let _guard = lock.lock().await;

        let def = self
            .database
            .get_job_by_key(&key)
            .await?
            .ok_or_else(|| SchedulerError::not_found(&key))?;

        if let Some(entry) = self.registry.get(&key) {
            if entry.handle.is_active() {
                if entry.handle.is_paused() {
                    entry.handle.resume();
                    info!("Resumed job '{}'", key);
                    return Ok("Job resumed successfully".to_string());
                }
                return Ok("Job is already active".to_string());
            }
        }

        self.rearm_from_store(def).await?;
        info!("Resumed job '{}' by re-arming its trigger", key);
        Ok("Job resumed successfully".to_string())
    }

    /// Apply new schedule fields to an existing job.
    ///
    /// The prior running/stopped state is preserved: a running job swaps
    /// seamlessly to the new schedule with no window where two handles
    /// exist, a stopped job stays stopped with the new fields persisted.
    pub async fn update(
        &self,
        name: &str,
        request: JobUpdateRequest,
    ) -> Result<String, SchedulerError> {
        let spec = ScheduleSpec::from_fields(
            request.kind,
            request.cron_expression.as_deref(),
            request.delay_ms,
            request.rate_ms,
            request.start_at,
        )?;

        let key = JobKey::new(name, &request.group);
        let lock = self.job_lock(&key);
        let _guard = lock.lock().await;

        let def = self
            .database
            .get_job_by_key(&key)
            .await?
            .ok_or_else(|| SchedulerError::not_found(&key))?;
        let was_running = !def.stopped;

        if let Some((_, active)) = self.registry.remove(&key) {
            active.handle.cancel();
        }

        let mut updated = def;
        updated.kind = request.kind;
        updated.cron_expression = request.cron_expression;
        updated.delay_ms = request.delay_ms;
        updated.rate_ms = request.rate_ms;
        updated.start_at = request.start_at;
        updated.instance_id = Uuid::new_v4();
        updated.updated_at = Utc::now();
        self.database.update_job(&updated).await?;

        if was_running {
            self.arm_job(&updated, spec);
        }

        info!("Updated job '{}' ({})", key, updated.kind.as_str());
        Ok("Job updated successfully".to_string())
    }

    /// Cancel any active trigger and delete the store row. Irreversible.
    pub async fn delete(&self, name: &str, group: &str) -> Result<String, SchedulerError> {
        let key = JobKey::new(name, group);
        let lock = self.job_lock(&key);
        let _guard = lock.lock().await;

        let def = self
            .database
            .get_job_by_key(&key)
            .await?
            .ok_or_else(|| SchedulerError::not_found(&key))?;

        if let Some((_, active)) = self.registry.remove(&key) {
            active.handle.cancel();
        }
        self.database.delete_job(def.id).await?;

        info!("Deleted job '{}'", key);
        Ok("Job deleted successfully".to_string())
    }

    /// Startup reconciliation: arm a handle for every definition the store
    /// reports as active, restoring the registry after a process restart.
    /// Also the recovery path for a crash between the store write and the
    /// handle registration in `schedule`.
    pub async fn reconcile(&self) -> Result<usize, SchedulerError> {
        let active_jobs = self.database.find_active_jobs().await?;
        info!("Reinitializing {} active jobs from store", active_jobs.len());

        let mut armed = 0;
        for def in active_jobs {
            let key = def.key();
            let lock = self.job_lock(&key);
            let _guard = lock.lock().await;

            if self.has_active_handle(&key) {
                continue;
            }

            match ScheduleSpec::from_definition(&def) {
                Ok(spec) => {
                    self.arm_job(&def, spec);
                    armed += 1;
                }
                Err(e) => {
                    warn!("Skipping job '{}' with invalid stored schedule: {}", key, e);
                }
            }
        }

        Ok(armed)
    }

    fn arm_job(&self, def: &JobDefinition, spec: ScheduleSpec) {
        let on_fire = self.fire_callback(def.clone());
        let handle = self.engine.arm(spec, on_fire);
        let previous = self.registry.insert(
            def.key(),
            ActiveHandle {
                handle,
                instance_id: def.instance_id,
                expression: def.trigger_expression(),
            },
        );
        // At most one handle per identity: a replaced entry is cancelled.
        if let Some(previous) = previous {
            debug!(
                "Replacing armed trigger for '{}' (instance {})",
                def.key(),
                previous.instance_id
            );
            previous.handle.cancel();
        }
    }

    async fn cancel_and_mark_stopped(
        &self,
        key: &JobKey,
        def: &JobDefinition,
    ) -> Result<bool, SchedulerError> {
        let had_handle = match self.registry.remove(key) {
            Some((_, active)) => {
                active.handle.cancel();
                true
            }
            None => false,
        };
        if !def.stopped {
            self.database.set_job_stopped(key, true).await?;
        }
        Ok(had_handle)
    }

    async fn rearm_from_store(&self, def: JobDefinition) -> Result<(), SchedulerError> {
        let mut def = def;
        def.stopped = false;
        def.instance_id = Uuid::new_v4();
        def.updated_at = Utc::now();

        let spec = ScheduleSpec::from_definition(&def)?;
        self.database.update_job(&def).await?;
        self.arm_job(&def, spec);
        Ok(())
    }

    /// Build the per-fire callback: store re-check (stale/stopped guard),
    /// body execution, status recording, one-shot completion.
    fn fire_callback(&self, def: JobDefinition) -> FireCallback {
        let database = self.database.clone();
        let recorder = self.recorder.clone();
        let runner = self.runner.clone();
        let registry = self.registry.clone();
        let armed_instance = def.instance_id;
        let one_time = def.kind == ScheduleKind::OneTime;

        Arc::new(move || {
            let database = database.clone();
            let recorder = recorder.clone();
            let runner = runner.clone();
            let registry = registry.clone();
            let key = def.key();

            Box::pin(async move {
                // The registry alone is never trusted for correctness: the
                // store's stopped flag and instance_id decide whether this
                // fire is still legitimate.
                let current = match database.get_job_by_key(&key).await {
                    Ok(Some(current)) => current,
                    Ok(None) => {
                        info!("Job '{}' no longer exists, retiring its trigger", key);
                        return FireOutcome::Retire;
                    }
                    Err(e) => {
                        warn!("Skipping fire for job '{}', store lookup failed: {}", key, e);
                        return FireOutcome::Continue;
                    }
                };

                if current.stopped {
                    info!("Job '{}' is stopped, exiting execution", key);
                    return FireOutcome::Retire;
                }
                if current.instance_id != armed_instance {
                    debug!("Ignoring stale fire for job '{}'", key);
                    return FireOutcome::Retire;
                }

                match runner.run(&current).await {
                    Ok(()) => {
                        recorder.record(&key.name, &key.group, true, None).await;
                    }
                    Err(e) => {
                        warn!("Job '{}' execution failed: {}", key, e);
                        recorder
                            .record(&key.name, &key.group, false, Some(&e.to_string()))
                            .await;
                    }
                }

                if one_time {
                    // One-shots soft-disable themselves after their single
                    // fire so reconciliation does not re-arm them. Only this
                    // generation's entry is removed; a newer handle armed by
                    // a concurrent update is left alone.
                    registry.remove_if(&key, |_, active| active.instance_id == armed_instance);
                    if let Err(e) = database.set_job_stopped(&key, true).await {
                        warn!("Failed to mark one-time job '{}' as stopped: {}", key, e);
                    }
                    return FireOutcome::Retire;
                }

                FireOutcome::Continue
            })
        })
    }
}
