// tests/scheduler.rs
use async_trait::async_trait;
use news_digest::config::SendTime;
use news_digest::ingest::scheduler::{
    DeliveryScheduler, FireOutcome, ScheduledJob, SchedulerState, JOB_ID,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn at(s: &str) -> SendTime {
    s.parse().unwrap()
}

/// Blocks each run until released, so a second fire can arrive mid-run.
#[derive(Default)]
struct Gated {
    runs: AtomicUsize,
    started: Notify,
    release: Notify,
}

#[async_trait]
impl ScheduledJob for Gated {
    async fn run(&self) -> anyhow::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl ScheduledJob for Failing {
    fn name(&self) -> &str {
        "failing"
    }
    async fn run(&self) -> anyhow::Result<()> {
        anyhow::bail!("smtp unreachable")
    }
}

struct Panicking;

#[async_trait]
impl ScheduledJob for Panicking {
    async fn run(&self) -> anyhow::Result<()> {
        panic!("boom")
    }
}

#[tokio::test]
async fn back_to_back_reschedules_leave_one_job() {
    let s = DeliveryScheduler::new();
    s.schedule(at("07:00"), Arc::new(Failing));
    s.schedule(at("08:30"), Arc::new(Failing));
    s.schedule(at("06:15"), Arc::new(Failing));

    assert_eq!(s.job_count(), 1);
    let st = s.status();
    assert_eq!(st.job_id, Some(JOB_ID));
    assert_eq!(st.send_time.as_deref(), Some("06:15"));

    let next = st.next_run.unwrap();
    assert_eq!(next.format("%H:%M").to_string(), "06:15");
    assert!(next > chrono::Local::now());
    assert!(next - chrono::Local::now() <= chrono::Duration::days(1));

    s.shutdown().await;
    assert_eq!(s.job_count(), 0);
    assert_eq!(s.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn overlapping_fire_is_coalesced() {
    let s = Arc::new(DeliveryScheduler::new());
    let job = Arc::new(Gated::default());
    s.schedule(at("07:00"), job.clone());

    let first = {
        let s = s.clone();
        tokio::spawn(async move { s.fire_now().await })
    };
    job.started.notified().await;

    assert_eq!(s.fire_now().await, FireOutcome::Coalesced);

    job.release.notify_one();
    assert_eq!(first.await.unwrap(), FireOutcome::Completed);
    assert_eq!(job.runs.load(Ordering::SeqCst), 1);

    // Lock released: the next fire runs normally.
    let again = {
        let s = s.clone();
        tokio::spawn(async move { s.fire_now().await })
    };
    job.started.notified().await;
    job.release.notify_one();
    assert_eq!(again.await.unwrap(), FireOutcome::Completed);
    assert_eq!(job.runs.load(Ordering::SeqCst), 2);

    s.shutdown().await;
}

#[tokio::test]
async fn failed_or_panicking_job_keeps_the_schedule() {
    let s = DeliveryScheduler::new();

    s.schedule(at("07:00"), Arc::new(Failing));
    assert_eq!(s.status().job_name.as_deref(), Some("failing"));
    assert_eq!(s.fire_now().await, FireOutcome::Failed);
    assert_eq!(s.state(), SchedulerState::Running);
    assert_eq!(s.job_count(), 1);

    s.schedule(at("07:00"), Arc::new(Panicking));
    assert_eq!(s.fire_now().await, FireOutcome::Failed);
    assert_eq!(s.state(), SchedulerState::Running);
    assert_eq!(s.job_count(), 1);

    s.shutdown().await;
}

#[tokio::test]
async fn shutdown_waits_for_workers_and_is_idempotent() {
    let s = DeliveryScheduler::new().with_grace(Duration::from_secs(60));
    s.schedule(at("23:59"), Arc::new(Failing));
    tokio::time::timeout(Duration::from_secs(2), s.shutdown())
        .await
        .expect("shutdown should not hang");
    tokio::time::timeout(Duration::from_secs(2), s.shutdown())
        .await
        .expect("second shutdown is a no-op");
    assert_eq!(s.fire_now().await, FireOutcome::NoJob);

    // Can be started again after a stop.
    s.schedule(at("05:00"), Arc::new(Failing));
    assert_eq!(s.state(), SchedulerState::Running);
    s.shutdown().await;
}
