//! Timer-driven trigger.

use super::{PersistListener, PersistTrigger};
use crate::error::{Result, TrackingError};
use crate::listeners::ListenerSet;
use crate::types::ListenerId;
use crossbeam_channel::{select, tick, unbounded, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Fires its subscribers periodically from a background thread.
///
/// Listeners run on that thread. The thread stops when the trigger is
/// dropped or [`IntervalTrigger::stop`] is called.
pub struct IntervalTrigger {
    period: Duration,
    listeners: Arc<ListenerSet<dyn Fn() + Send + Sync>>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl IntervalTrigger {
    pub fn start(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(TrackingError::InvalidArgument(
                "Interval trigger period must be non-zero".into(),
            ));
        }

        let listeners: Arc<ListenerSet<dyn Fn() + Send + Sync>> = Arc::new(ListenerSet::new());
        let (shutdown_tx, shutdown_rx) = unbounded::<()>();
        let ticker = tick(period);

        let worker_listeners = Arc::clone(&listeners);
        let worker = thread::Builder::new()
            .name("persist-interval".into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        for listener in worker_listeners.snapshot() {
                            listener();
                        }
                    }
                    recv(shutdown_rx) -> _ => break,
                }
            })?;

        debug!(?period, "Interval trigger started");
        Ok(Self {
            period,
            listeners,
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop the background thread and wait for it to exit.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the worker.
        self.shutdown.take();
        if let Some(worker) = self.worker.take() {
            // Dropped from a listener on the worker itself: it exits on its own.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
            debug!("Interval trigger stopped");
        }
    }
}

impl PersistTrigger for IntervalTrigger {
    fn subscribe(&self, listener: PersistListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl Drop for IntervalTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}
