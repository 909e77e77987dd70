//! Bounded worker pool that polls the accrual system for newly admitted orders.
//!
//! Admission hands the scheduler an order number and receives a channel of accrual updates in
//! return. A fixed set of workers consumes jobs from a shared intake queue; while every worker is
//! busy, [`PollScheduler::submit`] waits, which bounds the number of orders being polled at any
//! instant to the size of the pool.
//!
//! Each job is driven by a strictly sequential poll loop: one accrual lookup per tick, updates
//! emitted in the order they were produced. The loop ends, closing the update channel, when the
//! accrual system reports a terminal status, when it fails, or when the scheduler shuts down.
//! Rate limiting is not a failure: the loop backs off exponentially and keeps the order alive.
//!
//! Jobs are cancelled through a token tied to the scheduler's lifetime, never to the HTTP request
//! that admitted the order; polling routinely outlives the request.
use std::{sync::Arc, time::Duration};

use log::*;
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::accrual::{AccrualApi, AccrualApiError, AccrualOrder};

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Number of concurrent poll workers.
    pub workers: usize,
    /// Delay between consecutive accrual lookups for one order.
    pub poll_period: Duration,
    /// Ceiling for the exponential backoff applied while the accrual system is rate limiting.
    pub max_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS, poll_period: DEFAULT_POLL_PERIOD, max_backoff: DEFAULT_MAX_BACKOFF }
    }
}

#[derive(Debug, Clone, Error)]
pub enum PollSchedulerError {
    #[error("The poll scheduler has shut down and is not accepting jobs")]
    SchedulerClosed,
}

struct PollJob {
    number: String,
    updates: mpsc::Sender<AccrualOrder>,
    cancel: CancellationToken,
}

/// Handle to the worker pool. Cheap to clone; all clones share the same workers and intake queue.
#[derive(Clone)]
pub struct PollScheduler {
    jobs: mpsc::Sender<PollJob>,
    lifetime: CancellationToken,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PollScheduler {
    /// Spawns the worker pool. The workers run until [`shutdown`](Self::shutdown) is called.
    pub fn start<C: AccrualApi>(client: C, config: PollConfig) -> Self {
        let (jobs, intake) = mpsc::channel::<PollJob>(1);
        let intake = Arc::new(Mutex::new(intake));
        let lifetime = CancellationToken::new();
        let mut handles = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            handles.push(tokio::spawn(worker(
                worker_id,
                client.clone(),
                Arc::clone(&intake),
                config.clone(),
                lifetime.clone(),
            )));
        }
        info!("🛰️ Poll scheduler started with {} workers, period {:?}", config.workers, config.poll_period);
        Self { jobs, lifetime, workers: Arc::new(Mutex::new(handles)) }
    }

    /// Queues a poll job for the given order number and returns the channel its accrual updates
    /// will arrive on. Waits until a worker slot frees up.
    pub async fn submit(&self, number: String) -> Result<mpsc::Receiver<AccrualOrder>, PollSchedulerError> {
        let (updates, results) = mpsc::channel(1);
        let job = PollJob { number, updates, cancel: self.lifetime.child_token() };
        self.jobs.send(job).await.map_err(|_| PollSchedulerError::SchedulerClosed)?;
        Ok(results)
    }

    /// Cancels all running poll loops and waits for the workers to finish.
    pub async fn shutdown(&self) {
        self.lifetime.cancel();
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(e) = handle.await {
                error!("🛰️ Poll worker did not shut down cleanly: {e}");
            }
        }
        debug!("🛰️ Poll scheduler has shut down");
    }
}

async fn worker<C: AccrualApi>(
    worker_id: usize,
    client: C,
    intake: Arc<Mutex<mpsc::Receiver<PollJob>>>,
    config: PollConfig,
    lifetime: CancellationToken,
) {
    trace!("🛰️ Poll worker {worker_id} started");
    loop {
        let job = {
            let mut intake = intake.lock().await;
            tokio::select! {
                _ = lifetime.cancelled() => None,
                job = intake.recv() => job,
            }
        };
        let Some(job) = job else {
            trace!("🛰️ Poll worker {worker_id} stopping");
            return;
        };
        poll_loop(&client, job, &config).await;
    }
}

/// Polls the accrual system for one order until a terminal status arrives, the upstream fails, or
/// the job is cancelled. Dropping `job.updates` on return is what closes the result stream.
async fn poll_loop<C: AccrualApi>(client: &C, job: PollJob, config: &PollConfig) {
    let PollJob { number, updates, cancel } = job;
    let mut delay = config.poll_period;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("🛰️ Poll loop for order {number} cancelled");
                return;
            },
            _ = tokio::time::sleep(delay) => {},
        }
        match client.order_status(&number).await {
            Ok(update) => {
                delay = config.poll_period;
                let terminal = update.status.is_terminal();
                trace!("🛰️ Order {number} is {} at the accrual system", update.status);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("🛰️ Poll loop for order {number} cancelled");
                        return;
                    },
                    sent = updates.send(update) => {
                        if sent.is_err() {
                            debug!("🛰️ Nobody is listening for updates on order {number} any more. Abandoning poll");
                            return;
                        }
                    },
                }
                if terminal {
                    return;
                }
            },
            Err(AccrualApiError::RateLimited) => {
                delay = (delay * 2).min(config.max_backoff);
                warn!("🛰️ Accrual system is rate limiting. Next lookup for order {number} in {delay:?}");
            },
            Err(AccrualApiError::Upstream(e)) => {
                warn!("🛰️ Accrual lookup for order {number} failed: {e}. Abandoning poll");
                return;
            },
        }
    }
}

#[cfg(test)]
mod test {
    use pts_common::Point;

    use super::*;
    use crate::{
        accrual::AccrualStatus,
        test_utils::{accrual_update, ScriptedAccrual},
    };

    fn quick_config() -> PollConfig {
        PollConfig { workers: 2, poll_period: Duration::from_millis(5), max_backoff: Duration::from_millis(40) }
    }

    #[tokio::test]
    async fn emits_updates_until_terminal_status() {
        let _ = env_logger::try_init().ok();
        let client = ScriptedAccrual::new([
            Ok(accrual_update("6122", AccrualStatus::Registered, 0)),
            Ok(accrual_update("6122", AccrualStatus::Processing, 0)),
            Ok(accrual_update("6122", AccrualStatus::Processed, 30012)),
        ]);
        let scheduler = PollScheduler::start(client, quick_config());
        let mut updates = scheduler.submit("6122".to_string()).await.unwrap();
        let mut seen = Vec::new();
        while let Some(update) = updates.recv().await {
            seen.push((update.status, update.accrual));
        }
        assert_eq!(seen, vec![
            (AccrualStatus::Registered, Point::from(0)),
            (AccrualStatus::Processing, Point::from(0)),
            (AccrualStatus::Processed, Point::from(30012)),
        ]);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn upstream_failure_closes_the_stream() {
        let _ = env_logger::try_init().ok();
        let client = ScriptedAccrual::new([Err(AccrualApiError::Upstream("boom".to_string()))]);
        let scheduler = PollScheduler::start(client, quick_config());
        let mut updates = scheduler.submit("6122".to_string()).await.unwrap();
        assert!(updates.recv().await.is_none());
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn rate_limiting_backs_off_and_retries() {
        let _ = env_logger::try_init().ok();
        let client = ScriptedAccrual::new([
            Err(AccrualApiError::RateLimited),
            Err(AccrualApiError::RateLimited),
            Ok(accrual_update("6122", AccrualStatus::Processed, 500)),
        ]);
        let scheduler = PollScheduler::start(client, quick_config());
        let mut updates = scheduler.submit("6122".to_string()).await.unwrap();
        let update = updates.recv().await.expect("the poll should survive rate limiting");
        assert_eq!(update.status, AccrualStatus::Processed);
        assert_eq!(update.accrual, Point::from(500));
        assert!(updates.recv().await.is_none());
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_running_polls() {
        let _ = env_logger::try_init().ok();
        // An endless stream of PROCESSING keeps the poll loop alive until cancellation.
        let client = ScriptedAccrual::repeating(accrual_update("6122", AccrualStatus::Processing, 0));
        let scheduler = PollScheduler::start(client, quick_config());
        let mut updates = scheduler.submit("6122".to_string()).await.unwrap();
        assert!(updates.recv().await.is_some());
        scheduler.shutdown().await;
        // The poll loop observed the cancelled token and dropped its sender.
        while updates.recv().await.is_some() {}
    }
}
