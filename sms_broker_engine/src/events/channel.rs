//! The delivery plumbing behind the event hooks. One [`EventHandler`] task drains a bounded channel and runs the
//! subscriber's callback for each event on its own task, so a slow callback never holds up the ones behind it.
//! Delivery is fire-and-forget: nothing in the order flow waits on, or retries, a callback.
//!
//! Shutdown is implicit. The handler holds no sender of its own, so once every [`EventProducer`] clone is dropped
//! the channel closes, the drain loop ends, and `start_handler` returns after the in-flight callbacks finish.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    /// Hand out a producer for this handler's channel. Call before [`start_handler`](Self::start_handler);
    /// producers cloned from the result keep the channel open.
    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Drain the channel until every producer is gone, then wait out the callbacks still running.
    pub async fn start_handler(mut self) {
        debug!("📬️ Event handler running");
        // The listener only reports closed once all producers are dropped, so the handler must not keep a live
        // sender of its own.
        drop(self.sender);
        let mut in_flight = JoinSet::new();
        while let Some(ev) = self.listener.recv().await {
            let handler = Arc::clone(&self.handler);
            in_flight.spawn(async move { (handler)(ev).await });
            // Reap whatever already finished so the set doesn't grow with dead tasks.
            while let Some(done) = in_flight.try_join_next() {
                log_callback_result(done);
            }
        }
        debug!("📬️ Event channel closed. {} callback(s) still in flight", in_flight.len());
        while let Some(done) = in_flight.join_next().await {
            log_callback_result(done);
        }
        debug!("📬️ Event handler has shut down");
    }
}

fn log_callback_result(result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => trace!("📬️ Event callback completed"),
        Err(e) => warn!("📬️ An event callback panicked: {e}"),
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_handler(seen: Arc<AtomicUsize>) -> Handler<u64> {
        Arc::new(move |delay_ms: u64| {
            let seen = seen.clone();
            Box::pin(async move {
                // Sleep first so completion order differs from arrival order.
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                seen.fetch_add(1, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
    }

    #[tokio::test]
    async fn all_events_are_handled_before_shutdown() {
        let _ = env_logger::try_init();
        let seen = Arc::new(AtomicUsize::new(0));
        let event_handler = EventHandler::new(4, counting_handler(seen.clone()));
        let producer = event_handler.subscribe();
        let clone = producer.clone();
        tokio::spawn(async move {
            for delay in [40u64, 5, 30, 1] {
                producer.publish_event(delay).await;
            }
        });
        tokio::spawn(async move {
            for delay in [2u64, 25, 10] {
                clone.publish_event(delay).await;
            }
        });

        // Returns only once both producers are dropped and every callback has run.
        event_handler.start_handler().await;
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn a_panicking_callback_does_not_sink_the_handler() {
        let _ = env_logger::try_init();
        let seen = Arc::new(AtomicUsize::new(0));
        let inner = seen.clone();
        let handler: Handler<u64> = Arc::new(move |v: u64| {
            let seen = inner.clone();
            Box::pin(async move {
                if v == 0 {
                    panic!("scripted failure");
                }
                seen.fetch_add(1, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(2, handler);
        let producer = event_handler.subscribe();
        tokio::spawn(async move {
            for v in [1u64, 0, 1] {
                producer.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
