//! Drain loop and periodic scheduling of the queue workers.
//!
//! A drain run processes at most the number of items pending when it started
//! and stops early once its time budget is spent. Items requeued during a run
//! land behind that snapshot, so they are retried on the next run rather than
//! spinning within the current one. Whatever is left stays queued.
//!
//! With a [`QueueLease`] attached, a runner only drains while it holds the
//! queue's lease. Unacknowledged deliveries are recovered when the lease is
//! newly taken, never while another instance may still be working on them.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use dormant_common::error::AppError;

use crate::lease::{LeaseState, QueueLease};
use crate::queue::WorkQueue;
use crate::workers::{ItemOutcome, QueueWorker};

/// Tally of a single drain run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    pub requeued: usize,
    pub fatal: usize,
    /// The run stopped because the time budget ran out
    pub budget_exhausted: bool,
}

impl DrainReport {
    pub fn processed(&self) -> usize {
        self.completed + self.requeued + self.fatal
    }
}

/// Run one drain pass of `queue` through `worker`.
///
/// Item failures are settled per item and never abort the run; only a failing
/// queue backend does.
pub async fn drain<W, Q>(queue: &Q, worker: &W, budget: Duration) -> Result<DrainReport, AppError>
where
    W: QueueWorker,
    Q: WorkQueue<W::Item> + ?Sized,
{
    let started = Instant::now();
    let limit = queue.len().await?;
    let mut report = DrainReport::default();

    while report.processed() < limit {
        if started.elapsed() >= budget {
            report.budget_exhausted = true;
            break;
        }

        let Some(delivery) = queue.dequeue().await? else {
            break;
        };
        let item_id = delivery.envelope.id;
        let attempts = delivery.envelope.attempts;

        match worker.process(&delivery.envelope).await {
            ItemOutcome::Completed => {
                queue.ack(delivery).await?;
                report.completed += 1;
            }
            ItemOutcome::Requeue => {
                tracing::warn!(
                    queue = worker.queue_name(),
                    item_id = %item_id,
                    attempts = attempts + 1,
                    "Work item requeued"
                );
                queue.requeue(delivery).await?;
                report.requeued += 1;
            }
            ItemOutcome::Fatal(reason) => {
                tracing::error!(
                    queue = worker.queue_name(),
                    item_id = %item_id,
                    reason = %reason,
                    "Work item dropped"
                );
                queue.ack(delivery).await?;
                report.fatal += 1;
            }
        }
    }

    Ok(report)
}

/// Drains one queue on a fixed interval.
pub struct QueueRunner<W: QueueWorker> {
    worker: W,
    queue: Arc<dyn WorkQueue<W::Item>>,
    lease: Option<Arc<dyn QueueLease>>,
    interval: Duration,
    budget: Duration,
}

impl<W: QueueWorker> QueueRunner<W> {
    pub fn new(
        worker: W,
        queue: Arc<dyn WorkQueue<W::Item>>,
        interval: Duration,
        budget: Duration,
    ) -> Self {
        Self {
            worker,
            queue,
            lease: None,
            interval,
            budget,
        }
    }

    /// Only drain while holding `lease`.
    pub fn with_lease(mut self, lease: Arc<dyn QueueLease>) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Run a single drain pass.
    pub async fn run_once(&self) -> Result<DrainReport, AppError> {
        drain(self.queue.as_ref(), &self.worker, self.budget).await
    }

    /// Take or renew the lease, then drain.
    ///
    /// Returns `None` when another instance holds the lease.
    pub async fn tick(&self) -> Result<Option<DrainReport>, AppError> {
        if let Some(lease) = &self.lease {
            match lease.acquire().await? {
                LeaseState::Acquired => {
                    let recovered = self.queue.recover().await?;
                    tracing::info!(
                        queue = self.worker.queue_name(),
                        recovered,
                        "Consumer lease acquired"
                    );
                }
                LeaseState::Renewed => {}
                LeaseState::HeldElsewhere => {
                    tracing::debug!(
                        queue = self.worker.queue_name(),
                        "Consumer lease held by another instance, skipping run"
                    );
                    return Ok(None);
                }
            }
        }

        self.run_once().await.map(Some)
    }

    /// Give the lease up so another instance can take over without waiting
    /// for it to expire.
    pub async fn shutdown(&self) {
        if let Some(lease) = &self.lease
            && let Err(e) = lease.release().await
        {
            tracing::warn!(
                queue = self.worker.queue_name(),
                error = %e,
                "Failed to release consumer lease"
            );
        }
    }

    /// Drain forever. Runs until the task is cancelled.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        // A run may outlast the interval; don't fire a burst to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            queue = self.worker.queue_name(),
            interval_secs = self.interval.as_secs(),
            budget_secs = self.budget.as_secs(),
            "Queue runner started"
        );

        loop {
            ticker.tick().await;

            match self.tick().await {
                Ok(Some(report)) if report.processed() > 0 => {
                    tracing::info!(
                        queue = self.worker.queue_name(),
                        completed = report.completed,
                        requeued = report.requeued,
                        fatal = report.fatal,
                        budget_exhausted = report.budget_exhausted,
                        "Drain run finished"
                    );
                }
                Ok(Some(_)) => {
                    tracing::debug!(queue = self.worker.queue_name(), "Queue empty");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        queue = self.worker.queue_name(),
                        error = %e,
                        "Drain run aborted"
                    );
                }
            }
        }
    }
}
