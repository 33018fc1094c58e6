// src/ingest/scheduler.rs
//! Once-a-day delivery scheduler holding at most one job.
//!
//! One worker task per registration sleeps until the next local fire time,
//! runs the job, then computes the following slot. Registering again
//! retires the old worker, so there is never more than one live job. Runs
//! share a single in-flight lock: a fire that arrives while the previous
//! run is still going is coalesced into it.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::SendTime;

pub const JOB_ID: &str = "daily_news_email";
pub const JOB_NAME: &str = "Daily News Email";
/// A slot missed by no more than this still runs once.
pub const MISFIRE_GRACE: Duration = Duration::from_secs(5 * 60);

/// Wall-clock source for slot arithmetic. Timers still run on tokio time.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str {
        JOB_NAME
    }
    async fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Completed,
    Failed,
    /// A previous run was still in flight.
    Coalesced,
    NoJob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub job_id: Option<&'static str>,
    pub job_name: Option<String>,
    pub send_time: Option<String>,
    pub next_run: Option<DateTime<Local>>,
    pub job_count: usize,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scheduler_fires_total", "Scheduled job executions started.");
        describe_counter!("scheduler_failures_total", "Scheduled job executions that failed.");
        describe_counter!("scheduler_coalesced_total", "Fires merged into an in-flight run.");
        describe_counter!("scheduler_misfires_total", "Slots skipped past the grace window.");
    });
}

/// First occurrence of `at` strictly after `after`, on the clock of `after`.
/// A local time that does not exist (DST gap) moves to the next day; an
/// ambiguous one (DST overlap) takes the earlier instant.
pub fn next_fire_after<Tz: TimeZone>(after: &DateTime<Tz>, at: SendTime) -> DateTime<Tz> {
    let tz = after.timezone();
    let mut date = after.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = date
            .and_time(at.as_time())
            .and_local_timezone(tz.clone())
            .earliest()
        {
            if candidate > *after {
                return candidate;
            }
        }
        date = match date.succ_opt() {
            Some(d) => d,
            None => break,
        };
    }
    after.clone() + chrono::Duration::days(1)
}

/// Whether a slot reached late at `now` should still run.
pub fn within_grace<Tz: TimeZone>(
    scheduled: &DateTime<Tz>,
    now: &DateTime<Tz>,
    grace: Duration,
) -> bool {
    let late = now.clone().signed_duration_since(scheduled.clone());
    match late.to_std() {
        Ok(late) => late <= grace,
        // Not late at all.
        Err(_) => true,
    }
}

/// The slot to wait for after `prev`, skipping any already past grace.
fn following_slot(prev: &DateTime<Local>, now: &DateTime<Local>, at: SendTime, grace: Duration) -> DateTime<Local> {
    let mut slot = next_fire_after(prev, at);
    while !within_grace(&slot, now, grace) {
        counter!("scheduler_misfires_total").increment(1);
        tracing::warn!(target: "scheduler", missed = %slot, "slot missed beyond grace; skipping");
        slot = next_fire_after(&slot, at);
    }
    slot
}

struct Registered {
    at: SendTime,
    job: Arc<dyn ScheduledJob>,
    next_run: Arc<Mutex<Option<DateTime<Local>>>>,
    stop: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

struct Inner {
    state: SchedulerState,
    current: Option<Registered>,
    retired: Vec<JoinHandle<()>>,
}

/// Share it behind an `Arc`; every method takes `&self`.
pub struct DeliveryScheduler {
    inner: Mutex<Inner>,
    in_flight: Arc<tokio::sync::Mutex<()>>,
    grace: Duration,
    clock: Clock,
}

impl Default for DeliveryScheduler {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SchedulerState::Stopped,
                current: None,
                retired: Vec::new(),
            }),
            in_flight: Arc::new(tokio::sync::Mutex::new(())),
            grace: MISFIRE_GRACE,
            clock: Arc::new(Local::now),
        }
    }
}

impl DeliveryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Replace the wall clock, e.g. to simulate a late wake-up after suspend.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Register `job` to fire daily at `at`, replacing any existing
    /// registration, and mark the scheduler running. Must be called from
    /// inside a tokio runtime.
    pub fn schedule(&self, at: SendTime, job: Arc<dyn ScheduledJob>) {
        ensure_metrics_described();
        let mut inner = self.lock();

        if let Some(old) = inner.current.take() {
            let _ = old.stop.send(true);
            inner.retired.push(old.worker);
            tracing::info!(target: "scheduler", job_id = JOB_ID, old = %old.at, new = %at, "replacing scheduled job");
        }
        inner.retired.retain(|h| !h.is_finished());

        let first = next_fire_after(&(self.clock)(), at);
        let next_run = Arc::new(Mutex::new(Some(first)));
        let (stop, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(
            at,
            first,
            Arc::clone(&job),
            Arc::clone(&self.in_flight),
            Arc::clone(&next_run),
            stop_rx,
            self.grace,
            Arc::clone(&self.clock),
        ));

        inner.current = Some(Registered {
            at,
            job,
            next_run,
            stop,
            worker,
        });
        if inner.state == SchedulerState::Stopped {
            inner.state = SchedulerState::Running;
            tracing::info!(target: "scheduler", "scheduler started");
        }
        tracing::info!(target: "scheduler", job_id = JOB_ID, send_time = %at, "daily job scheduled");
    }

    /// Stop every worker and wait for them. A run already in progress is
    /// allowed to finish.
    pub async fn shutdown(&self) {
        let handles = {
            let mut inner = self.lock();
            inner.state = SchedulerState::Stopped;
            let mut handles = std::mem::take(&mut inner.retired);
            if let Some(reg) = inner.current.take() {
                let _ = reg.stop.send(true);
                handles.push(reg.worker);
            }
            handles
        };
        for h in handles {
            if let Err(e) = h.await {
                tracing::warn!(target: "scheduler", error = %e, "worker ended abnormally");
            }
        }
        tracing::info!(target: "scheduler", "scheduler stopped");
    }

    /// Run the registered job now, through the same coalescing path as a
    /// timed fire.
    pub async fn fire_now(&self) -> FireOutcome {
        let job = match self.lock().current.as_ref() {
            Some(reg) => Arc::clone(&reg.job),
            None => return FireOutcome::NoJob,
        };
        fire(&job, &self.in_flight).await
    }

    pub fn job_count(&self) -> usize {
        usize::from(self.lock().current.is_some())
    }

    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    pub fn status(&self) -> SchedulerStatus {
        let inner = self.lock();
        match inner.current.as_ref() {
            Some(reg) => SchedulerStatus {
                state: inner.state,
                job_id: Some(JOB_ID),
                job_name: Some(reg.job.name().to_string()),
                send_time: Some(reg.at.to_string()),
                next_run: *reg.next_run.lock().unwrap_or_else(|p| p.into_inner()),
                job_count: 1,
            },
            None => SchedulerStatus {
                state: inner.state,
                job_id: None,
                job_name: None,
                send_time: None,
                next_run: None,
                job_count: 0,
            },
        }
    }
}

async fn fire(job: &Arc<dyn ScheduledJob>, in_flight: &Arc<tokio::sync::Mutex<()>>) -> FireOutcome {
    let Ok(_guard) = in_flight.try_lock() else {
        counter!("scheduler_coalesced_total").increment(1);
        tracing::info!(target: "scheduler", job_id = JOB_ID, "previous run still in progress; coalescing");
        return FireOutcome::Coalesced;
    };

    counter!("scheduler_fires_total").increment(1);
    let started = Instant::now();
    tracing::info!(target: "scheduler", job_id = JOB_ID, job = job.name(), "running scheduled job");

    // A separate task so a panic in the job cannot take the worker down.
    let task_job = Arc::clone(job);
    let res = tokio::spawn(async move { task_job.run().await }).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match res {
        Ok(Ok(())) => {
            tracing::info!(target: "scheduler", job_id = JOB_ID, elapsed_ms, "scheduled job finished");
            FireOutcome::Completed
        }
        Ok(Err(e)) => {
            counter!("scheduler_failures_total").increment(1);
            tracing::error!(target: "scheduler", job_id = JOB_ID, elapsed_ms, error = %format!("{e:#}"), "scheduled job failed");
            FireOutcome::Failed
        }
        Err(e) => {
            counter!("scheduler_failures_total").increment(1);
            tracing::error!(target: "scheduler", job_id = JOB_ID, elapsed_ms, error = %e, "scheduled job panicked");
            FireOutcome::Failed
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    at: SendTime,
    first: DateTime<Local>,
    job: Arc<dyn ScheduledJob>,
    in_flight: Arc<tokio::sync::Mutex<()>>,
    next_run: Arc<Mutex<Option<DateTime<Local>>>>,
    mut stop: watch::Receiver<bool>,
    grace: Duration,
    clock: Clock,
) {
    let publish = |slot: Option<DateTime<Local>>| {
        *next_run.lock().unwrap_or_else(|p| p.into_inner()) = slot;
    };

    let mut slot = first;
    loop {
        publish(Some(slot));
        tracing::debug!(target: "scheduler", next_run = %slot, "waiting for next slot");

        let wait = slot
            .signed_duration_since(clock())
            .to_std()
            .unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            // Stop requested or the scheduler was dropped.
            _ = stop.changed() => break,
        }
        if *stop.borrow() {
            break;
        }

        let now = clock();
        if now < slot {
            // Woke early (wall clock moved back); wait out the rest.
            continue;
        }
        if within_grace(&slot, &now, grace) {
            fire(&job, &in_flight).await;
        } else {
            counter!("scheduler_misfires_total").increment(1);
            tracing::warn!(target: "scheduler", missed = %slot, "slot missed beyond grace; skipping");
        }
        slot = following_slot(&slot, &clock(), at, grace);
    }
    publish(None);
}
