//! The persistent job scheduler (spec §4.G): interval and cron triggers,
//! an overlap guard per job name, run-now merging with an in-flight run,
//! and cancellation with a bounded grace period.
//!
//! This is new logic the teacher does not have in this exact shape — its
//! `WeightedFairScheduler` fair-shares *ready work* across libraries rather
//! than running *time-triggered* jobs — so it is learned from the pack: cron
//! parsing uses the `cron` crate's 6-field `sec min hr dom mon dow`
//! convention, job envelopes follow `ferrex-core::scan::orchestration::job`'s
//! typed-row shape, the overlap guard follows
//! `ferrex-core::scan::orchestration::lease::JobLease` (one lease per job
//! name), and cancellation handles follow
//! `ferrex-core::scan::orchestration::dispatcher`'s shutdown-signal pattern.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use relaybridge_contracts::persistence::{RepositoryError, SchedulerRepository};
use relaybridge_model::{JobTrigger, LastRun, NextRun, RunStatus, ScheduledJob, ScheduledJobId};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("job {0} is already running")]
    AlreadyRunning(ScheduledJobId),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Computes the next run instant for `trigger` given the last run and now
/// (spec §4.G "Interval"/"Cron").
pub fn next_run(trigger: &JobTrigger, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<NextRun> {
    match trigger {
        JobTrigger::Interval { days, hours, minutes, seconds, run_immediately } => {
            let duration = chrono::Duration::days(*days as i64)
                + chrono::Duration::hours(*hours as i64)
                + chrono::Duration::minutes(*minutes as i64)
                + chrono::Duration::seconds(*seconds as i64);
            match last_run {
                Some(last) => Ok(NextRun { time: last + duration, estimated: false }),
                None if *run_immediately => Ok(NextRun { time: now, estimated: false }),
                None => Ok(NextRun { time: now + duration, estimated: true }),
            }
        }
        JobTrigger::Cron { expression } => {
            let schedule = cron::Schedule::from_str(expression).map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;
            let after = last_run.unwrap_or(now);
            schedule
                .after(&after)
                .next()
                .map(|time| NextRun { time, estimated: false })
                .ok_or_else(|| SchedulerError::InvalidCron(format!("no future occurrence for `{expression}`")))
        }
    }
}

/// A cancellation handle passed into every job run (spec §5 "cancellation
/// and timeouts"); `tokio::sync::watch` lets many job tasks observe one
/// shutdown signal without polling.
#[derive(Clone)]
pub struct CancelHandle {
    receiver: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn cancelled(&mut self) {
        let _ = self.receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Owns the shutdown signal every [`CancelHandle`] observes.
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, CancelHandle { receiver })
    }

    pub fn signal(&self) {
        let _ = self.sender.send(true);
    }
}

/// Runs one job to completion, honoring `cancel`.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, cancel: CancelHandle) -> std::result::Result<(), String>;
}

/// Owns the overlap guard (one in-flight run per job name) and dispatches
/// run-now / scheduled executions (spec §4.G "Concurrency discipline").
pub struct Scheduler {
    repo: Arc<dyn SchedulerRepository>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    shutdown: ShutdownSignal,
    shutdown_receiver: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(repo: Arc<dyn SchedulerRepository>) -> Self {
        let (shutdown, handle) = ShutdownSignal::new();
        Self { repo, in_flight: DashMap::new(), shutdown, shutdown_receiver: handle.receiver }
    }

    /// Hands out a handle observing this scheduler's single shutdown signal
    /// (spec §5 "the scheduler passes a cancellation handle into each job").
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { receiver: self.shutdown_receiver.clone() }
    }

    pub fn shutdown(&self) {
        self.shutdown.signal();
    }

    /// Runs `job` through `runner` if no run for this job name is already
    /// in flight; a concurrent request for the same job observes the
    /// existing run instead of starting a second one (spec §4.G "run-now
    /// merges with in-flight run").
    pub async fn run_job(&self, job: &ScheduledJob, runner: &dyn JobRunner, cancel: CancelHandle) -> Result<()> {
        let lock = self.in_flight.entry(job.name.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        let Ok(_guard) = lock.try_lock() else {
            return Err(SchedulerError::AlreadyRunning(job.id));
        };

        let started_at = Utc::now();
        let outcome = runner.run(cancel).await;
        let mut updated = job.clone();
        updated.last_run = Some(match &outcome {
            Ok(()) => LastRun { time: started_at, status: RunStatus::Completed, error: None },
            Err(err) => LastRun { time: started_at, status: RunStatus::Failed, error: Some(err.clone()) },
        });
        updated.next_run = next_run(&updated.trigger, Some(started_at), Utc::now()).ok();
        self.repo.upsert(&updated).await?;

        match outcome {
            Ok(()) => {
                info!(job = %job.name, "job run completed");
                Ok(())
            }
            Err(err) => {
                warn!(job = %job.name, error = %err, "job run failed");
                Ok(())
            }
        }
    }

    /// Enables or disables `job`, persisting and recomputing `next_run`
    /// (spec §4.G "enable/disable (persists and re-plans)").
    pub async fn set_enabled(&self, mut job: ScheduledJob, enabled: bool) -> Result<ScheduledJob> {
        job.enabled = enabled;
        job.next_run = if enabled {
            next_run(&job.trigger, job.last_run.as_ref().map(|r| r.time), Utc::now()).ok()
        } else {
            None
        };
        self.repo.upsert(&job).await?;
        Ok(job)
    }

    /// Updates `job`'s trigger, re-planning `next_run` (spec §4.G "update
    /// config...`next_run` is recomputed after every...config change").
    pub async fn update_trigger(&self, mut job: ScheduledJob, trigger: JobTrigger) -> Result<ScheduledJob> {
        job.trigger = trigger;
        job.next_run = next_run(&job.trigger, job.last_run.as_ref().map(|r| r.time), Utc::now()).ok();
        self.repo.upsert(&job).await?;
        Ok(job)
    }

    /// Loads every enabled job, keyed by name (spec §4.G "loads all enabled
    /// jobs at startup").
    pub async fn load_enabled(&self) -> Result<HashMap<String, ScheduledJob>> {
        Ok(self.repo.list().await?.into_iter().filter(|j| j.enabled).map(|j| (j.name.clone(), j)).collect())
    }
}

/// Waits up to `grace_period` for in-flight jobs to observe cancellation,
/// returning whether they settled in time (spec §5 "waits up to a bounded
/// grace period before aborting").
pub async fn shutdown_with_grace_period(signal: &ShutdownSignal, grace_period: StdDuration, mut handles: Vec<tokio::task::JoinHandle<()>>) -> bool {
    signal.signal();
    let deadline = tokio::time::Instant::now() + grace_period;
    for handle in handles.drain(..) {
        if tokio::time::timeout_at(deadline, handle).await.is_err() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn interval_next_run_uses_run_immediately_when_never_run() {
        let trigger = JobTrigger::Interval { days: 0, hours: 1, minutes: 0, seconds: 0, run_immediately: true };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let result = next_run(&trigger, None, now).unwrap();
        assert_eq!(result.time, now);
        assert!(!result.estimated);
    }

    #[test]
    fn interval_next_run_is_estimated_without_run_immediately() {
        let trigger = JobTrigger::Interval { days: 0, hours: 1, minutes: 0, seconds: 0, run_immediately: false };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let result = next_run(&trigger, None, now).unwrap();
        assert!(result.estimated);
        assert_eq!(result.time, now + chrono::Duration::hours(1));
    }

    #[test]
    fn interval_next_run_from_last_run_ignores_now() {
        let trigger = JobTrigger::Interval { days: 1, hours: 0, minutes: 0, seconds: 0, run_immediately: false };
        let last = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let result = next_run(&trigger, Some(last), now).unwrap();
        assert_eq!(result.time, last + chrono::Duration::days(1));
    }

    #[test]
    fn cron_next_run_parses_six_field_expression() {
        let trigger = JobTrigger::Cron { expression: "0 0 3 * * *".to_string() };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let result = next_run(&trigger, None, now).unwrap();
        assert_eq!(result.time.hour(), 3);
    }

    #[test]
    fn invalid_cron_expression_is_rejected() {
        let trigger = JobTrigger::Cron { expression: "not a cron expression".to_string() };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(next_run(&trigger, None, now).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_run_is_rejected_while_one_is_in_flight() {
        use relaybridge_model::ScheduledJobId;
        use std::sync::Arc as StdArc;

        struct SlowRunner;
        #[async_trait::async_trait]
        impl JobRunner for SlowRunner {
            async fn run(&self, _cancel: CancelHandle) -> std::result::Result<(), String> {
                tokio::time::sleep(StdDuration::from_millis(50)).await;
                Ok(())
            }
        }

        struct NoopRepo;
        #[async_trait::async_trait]
        impl SchedulerRepository for NoopRepo {
            async fn get(&self, _id: ScheduledJobId) -> relaybridge_contracts::persistence::Result<ScheduledJob> {
                unimplemented!()
            }
            async fn list(&self) -> relaybridge_contracts::persistence::Result<Vec<ScheduledJob>> {
                Ok(Vec::new())
            }
            async fn upsert(&self, _job: &ScheduledJob) -> relaybridge_contracts::persistence::Result<()> {
                Ok(())
            }
        }

        let scheduler = Scheduler::new(StdArc::new(NoopRepo));
        let job = ScheduledJob {
            id: ScheduledJobId::new(),
            name: "ingest".to_string(),
            trigger: JobTrigger::Interval { days: 0, hours: 1, minutes: 0, seconds: 0, run_immediately: true },
            enabled: true,
            last_run: None,
            next_run: None,
        };

        let runner = SlowRunner;
        // `run_job` acquires the overlap-guard lock synchronously before its
        // first await point, so polling `first` once (via join!'s initial
        // poll order) guarantees the lock is held before `second` is polled.
        let first = scheduler.run_job(&job, &runner, scheduler.cancel_handle());
        let second = scheduler.run_job(&job, &runner, scheduler.cancel_handle());
        let (first_result, second_result) = tokio::join!(first, second);
        assert!(first_result.is_ok());
        assert!(matches!(second_result, Err(SchedulerError::AlreadyRunning(_))));
    }
}
