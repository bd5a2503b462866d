//! Trigger engine: translates a schedule spec into an armed tokio task that
//! invokes a fire callback at the right times. The engine knows nothing
//! about jobs, storage or status recording.

use chrono::Utc;
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::types::{FireCallback, FireOutcome, ScheduleSpec};
use crate::models::ScheduleKind;

/// Runtime token for an armed, cancellable timer.
///
/// Cancellation is best-effort-immediate: an in-flight fire may still run to
/// completion, but no new fire is dispatched after `cancel` returns.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    kind: ScheduleKind,
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
}

impl TriggerHandle {
    pub fn kind(&self) -> ScheduleKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed) && !self.cancel.is_cancelled()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Suspend dispatch without disarming the timer. Only meaningful for
    /// cron triggers; the fixed-interval loops are stopped instead.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::Relaxed);
        self.cancel.cancel();
    }
}

/// Wraps the tokio timer primitives and the cron evaluator.
#[derive(Debug, Clone)]
pub struct TriggerEngine {
    timezone: Tz,
    run_missed_immediately: bool,
}

impl TriggerEngine {
    pub fn new(timezone: Tz, run_missed_immediately: bool) -> Self {
        Self {
            timezone,
            run_missed_immediately,
        }
    }

    /// Arm a trigger: spawns the per-kind timer loop and returns its handle.
    pub fn arm(&self, spec: ScheduleSpec, on_fire: FireCallback) -> TriggerHandle {
        let cancel = CancellationToken::new();
        let paused = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicBool::new(true));

        let handle = TriggerHandle {
            kind: spec.kind(),
            cancel: cancel.clone(),
            paused: paused.clone(),
            active: active.clone(),
        };

        let timezone = self.timezone;
        let run_missed_immediately = self.run_missed_immediately;
        tokio::spawn(async move {
            run_trigger_loop(
                spec,
                on_fire,
                cancel,
                paused,
                timezone,
                run_missed_immediately,
            )
            .await;
            active.store(false, Ordering::Relaxed);
        });

        handle
    }
}

/// Dispatch one fire without blocking the timer loop. A `Retire` outcome
/// cancels the loop's token so the trigger winds down on its own.
fn dispatch_fire(on_fire: &FireCallback, cancel: &CancellationToken) {
    let fire = on_fire();
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if let FireOutcome::Retire = fire.await {
            cancel.cancel();
        }
    });
}

async fn run_trigger_loop(
    spec: ScheduleSpec,
    on_fire: FireCallback,
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    timezone: Tz,
    run_missed_immediately: bool,
) {
    match spec {
        ScheduleSpec::Cron(schedule) => {
            let mut after = Utc::now().with_timezone(&timezone);
            loop {
                let next = match schedule.after(&after).next() {
                    Some(next) => next,
                    None => {
                        debug!("Cron schedule has no future fire times, retiring trigger");
                        break;
                    }
                };
                let delay = (next.with_timezone(&Utc) - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => {
                        after = next;
                        if paused.load(Ordering::Relaxed) {
                            debug!("Trigger is paused, skipping fire at {}",
                                next.format("%Y-%m-%d %H:%M:%S %Z"));
                            continue;
                        }
                        dispatch_fire(&on_fire, &cancel);
                    }
                }
            }
        }
        ScheduleSpec::FixedDelay(delay) => {
            // Next delay is measured from the completion of the previous
            // fire, so the fire is awaited in-loop (non-overlapping).
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => {
                        if let FireOutcome::Retire = on_fire().await {
                            break;
                        }
                    }
                }
            }
        }
        ScheduleSpec::FixedRate(rate) => {
            let mut ticker = interval_at(Instant::now() + rate, rate);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Fires are spawned, not awaited: a slow body may
                        // overlap the next tick.
                        dispatch_fire(&on_fire, &cancel);
                    }
                }
            }
        }
        ScheduleSpec::OneTime(at) => {
            let now = Utc::now();
            if at <= now && !run_missed_immediately {
                info!(
                    "One-time trigger for {} is in the past, retiring without firing",
                    at.to_rfc3339()
                );
                return;
            }
            let delay = (at - now).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(delay) => {
                    // Fires exactly once, then the handle self-retires.
                    on_fire().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback(
        counter: Arc<AtomicUsize>,
        outcome: FireOutcome,
    ) -> FireCallback {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                outcome
            })
        })
    }

    #[tokio::test]
    async fn test_one_time_fires_once_and_retires() {
        let engine = TriggerEngine::new(chrono_tz::UTC, true);
        let fired = Arc::new(AtomicUsize::new(0));
        let at = Utc::now() + chrono::Duration::milliseconds(50);

        let handle = engine.arm(
            ScheduleSpec::OneTime(at),
            counting_callback(fired.clone(), FireOutcome::Continue),
        );
        assert!(handle.is_active());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());

        // Cancel after self-retire is a no-op
        handle.cancel();
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn test_cancel_prevents_future_fires() {
        let engine = TriggerEngine::new(chrono_tz::UTC, true);
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = engine.arm(
            ScheduleSpec::FixedDelay(Duration::from_millis(100)),
            counting_callback(fired.clone(), FireOutcome::Continue),
        );
        handle.cancel();
        assert!(!handle.is_active());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retire_outcome_stops_fixed_delay_loop() {
        let engine = TriggerEngine::new(chrono_tz::UTC, true);
        let fired = Arc::new(AtomicUsize::new(0));

        let handle = engine.arm(
            ScheduleSpec::FixedDelay(Duration::from_millis(50)),
            counting_callback(fired.clone(), FireOutcome::Retire),
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn test_past_one_time_skipped_when_missed_runs_disabled() {
        let engine = TriggerEngine::new(chrono_tz::UTC, false);
        let fired = Arc::new(AtomicUsize::new(0));
        let at = Utc::now() - chrono::Duration::minutes(5);

        let handle = engine.arm(
            ScheduleSpec::OneTime(at),
            counting_callback(fired.clone(), FireOutcome::Continue),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!handle.is_active());
    }
}
