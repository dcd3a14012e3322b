//! Recurring background work.
//!
//! A job runs once immediately and then once per period. Runs never overlap: the next
//! tick is only awaited after the current run returns, and ticks missed while a run was
//! in progress are not replayed. Stopping takes effect between runs.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::pipeline::IngestPipeline;
use crate::TARGET_PIPELINE;

pub struct SchedulerHandle {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Asks the loop to exit. A run already in progress completes first.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Waits for the loop to exit.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }

    pub async fn shutdown(self) -> Result<(), JoinError> {
        info!(target: TARGET_PIPELINE, "Stopping scheduled task '{}'", self.name);
        self.stop();
        self.join().await
    }
}

/// Spawns `job` on a fixed period.
pub fn spawn_recurring<F, Fut>(name: &'static str, period: Duration, mut job: F) -> SchedulerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    debug!(target: TARGET_PIPELINE, "Running scheduled task '{}'", name);
                    job().await;
                }
            }
        }

        info!(target: TARGET_PIPELINE, "Scheduled task '{}' stopped", name);
    });

    SchedulerHandle {
        name,
        stop_tx,
        task,
    }
}

/// Runs the ingestion pipeline on a fixed period.
pub fn schedule_ingestion(pipeline: Arc<IngestPipeline>, period: Duration) -> SchedulerHandle {
    info!(
        target: TARGET_PIPELINE,
        "Scheduling ingestion of {} sources every {:?}",
        pipeline.sources().len(),
        period
    );
    spawn_recurring("ingest", period, move || {
        let pipeline = Arc::clone(&pipeline);
        async move {
            pipeline.run_once().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_job(
        counter: Arc<AtomicUsize>,
        work: Duration,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Send + 'static {
        move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(work).await;
            })
        }
    }

    #[tokio::test]
    async fn test_runs_immediately_on_start() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = spawn_recurring(
            "test",
            Duration::from_secs(3600),
            counting_job(Arc::clone(&runs), Duration::ZERO),
        );

        sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        handle.shutdown().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeats_every_period_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = spawn_recurring(
            "test",
            Duration::from_millis(20),
            counting_job(Arc::clone(&runs), Duration::ZERO),
        );

        sleep(Duration::from_millis(200)).await;
        handle.shutdown().await.unwrap();

        let after_stop = runs.load(Ordering::SeqCst);
        assert!(after_stop >= 3, "only {} runs", after_stop);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_runs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let job = {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            move || {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(30)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            }
        };

        let handle = spawn_recurring("test", Duration::from_millis(5), job);
        sleep(Duration::from_millis(150)).await;
        handle.shutdown().await.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_lets_current_run_finish() {
        let runs = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let job = {
            let runs = Arc::clone(&runs);
            let finished = Arc::clone(&finished);
            move || {
                let runs = Arc::clone(&runs);
                let finished = Arc::clone(&finished);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(80)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                }
            }
        };

        let handle = spawn_recurring("test", Duration::from_secs(3600), job);
        sleep(Duration::from_millis(20)).await;
        handle.shutdown().await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
