//! Single-worker FIFO queue for non-suppressing callbacks
//!
//! Enqueueing never blocks the input thread: when the bounded queue is full
//! the job is dropped with a warning. A panicking job is logged and the
//! worker keeps draining.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::{KeyboardError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Barrier(oneshot::Sender<()>),
}

/// Handle to the callback worker thread
pub(crate) struct Worker {
    tx: mpsc::Sender<Message>,
    thread_id: ThreadId,
}

impl Worker {
    /// Spawn the worker thread with a queue of `capacity` jobs
    pub fn spawn(capacity: usize) -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<Message>(capacity.max(1));

        let handle = thread::Builder::new()
            .name("keytap-worker".to_string())
            .spawn(move || {
                info!("callback worker started");
                while let Some(message) = rx.blocking_recv() {
                    match message {
                        Message::Run(job) => {
                            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                error!("queued keyboard callback panicked");
                            }
                        }
                        Message::Barrier(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                info!("callback worker stopped");
            })
            .map_err(|e| KeyboardError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            tx,
            thread_id: handle.thread().id(),
        })
    }

    /// Queue a job without blocking
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        match self.tx.try_send(Message::Run(Box::new(job))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("callback queue full, dropping keyboard callback");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("callback worker gone, dropping keyboard callback");
            }
        }
    }

    /// Block until every job queued so far has run
    ///
    /// Returns immediately when called from a queued job.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a tokio runtime, since it blocks on a
    /// channel.
    pub fn join(&self) {
        if thread::current().id() == self.thread_id {
            return;
        }
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.blocking_send(Message::Barrier(done_tx)).is_ok() {
            let _ = done_rx.blocking_recv();
        }
    }
}

/// Run `job` once on a dedicated timer thread after `delay`
pub fn call_later(job: impl FnOnce() + Send + 'static, delay: Duration) -> Result<()> {
    thread::Builder::new()
        .name("keytap-timer".to_string())
        .spawn(move || {
            thread::sleep(delay);
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("delayed keyboard callback panicked");
            }
        })
        .map(|_| ())
        .map_err(|e| KeyboardError::ThreadSpawn(e.to_string()))
}
