//! Single-flight FIFO serializer.
//!
//! One worker task drains jobs strictly in submission order; a job starts only after the previous job's future has
//! settled. The engine runs one queue per operation class (acquire, cancel, top-up confirmation) so that two
//! near-simultaneous requests of the same class never race the same upstream vendor, while classes do not block
//! each other.
//!
//! Submission never blocks: [`SingleFlightQueue::submit`] pushes the job synchronously and returns a future for
//! its result. A panicking job settles only that caller's result as [`QueueError::JobFailed`]; the worker keeps
//! draining.
use std::{future::Future, pin::Pin};

use futures_util::FutureExt;
use log::*;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("The queue has shut down and no longer accepts jobs")]
    Closed,
    #[error("The job failed before producing a result")]
    JobFailed,
}

#[derive(Clone)]
pub struct SingleFlightQueue {
    name: &'static str,
    sender: mpsc::UnboundedSender<Job>,
}

impl SingleFlightQueue {
    /// Creates the queue and spawns its worker. The worker runs until every clone of the queue has been dropped.
    pub fn new(name: &'static str) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            debug!("⏩️ {name} queue worker started");
            while let Some(job) = receiver.recv().await {
                if std::panic::AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    error!("⏩️ A job on the {name} queue panicked. The worker carries on with the next job");
                }
            }
            debug!("⏩️ {name} queue worker shut down");
        });
        Self { name, sender }
    }

    /// Enqueues the job and returns a future for its result. The enqueue itself is synchronous, so two `submit`
    /// calls made in sequence are guaranteed to execute in that order.
    pub fn submit<F, T>(&self, fut: F) -> impl Future<Output = Result<T, QueueError>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let out = fut.await;
            // The caller may have stopped waiting; that is not the job's problem.
            let _ = tx.send(out);
        });
        let accepted = self.sender.send(job).is_ok();
        let name = self.name;
        async move {
            if !accepted {
                warn!("⏩️ {name} queue rejected a job: the worker is gone");
                return Err(QueueError::Closed);
            }
            rx.await.map_err(|_| QueueError::JobFailed)
        }
    }

    /// Enqueues the job and waits for it to complete.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(fut).await
    }
}
