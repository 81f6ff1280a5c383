//! Background loop threads with cooperative, bounded shutdown
//!
//! Every loop in the crate runs on its own OS thread and sleeps between
//! iterations by waiting on a shared shutdown channel. Dropping the sender
//! wakes all of them at once. Each thread also holds a "done" sender so the
//! owner can wait for it with a deadline instead of a bare `join`.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::Result;

/// Sleep for `interval` unless shutdown is requested first.
///
/// Returns `false` once the loop should exit.
pub(crate) fn wait_tick(shutdown: &Receiver<()>, interval: Duration) -> bool {
    matches!(
        shutdown.recv_timeout(interval),
        Err(RecvTimeoutError::Timeout)
    )
}

struct Worker {
    name: String,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// A set of loop threads sharing one shutdown signal
pub(crate) struct WorkerGroup {
    shutdown_tx: Option<Sender<()>>,
    shutdown_rx: Receiver<()>,
    workers: Vec<Worker>,
}

impl WorkerGroup {
    pub(crate) fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = bounded(0);
        Self {
            shutdown_tx: Some(shutdown_tx),
            shutdown_rx,
            workers: Vec::new(),
        }
    }

    /// Spawn a named thread running `body` with the shutdown receiver
    pub(crate) fn spawn<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let shutdown = self.shutdown_rx.clone();
        let (done_tx, done_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Dropped on return or unwind, which disconnects `done`
                let _done = done_tx;
                body(shutdown);
            })?;

        self.workers.push(Worker {
            name: name.to_string(),
            handle,
            done: done_rx,
        });
        Ok(())
    }

    /// Signal every thread and wait up to `timeout` in total.
    ///
    /// Threads that miss the deadline are detached. Returns `true` when all
    /// of them were joined.
    pub(crate) fn stop(mut self, timeout: Duration) -> bool {
        drop(self.shutdown_tx.take());

        let deadline = Instant::now() + timeout;
        let mut all_joined = true;

        for worker in self.workers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match worker.done.recv_timeout(remaining) {
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "{} did not stop within {:?}, detaching it",
                        worker.name, timeout
                    );
                    all_joined = false;
                }
                _ => {
                    if worker.handle.join().is_err() {
                        error!("{} panicked", worker.name);
                    } else {
                        debug!("{} joined", worker.name);
                    }
                }
            }
        }

        all_joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_stop_wakes_sleeping_loops() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut group = WorkerGroup::new();

        for name in ["loop-a", "loop-b"] {
            let ticks = ticks.clone();
            group
                .spawn(name, move |shutdown| {
                    while wait_tick(&shutdown, Duration::from_secs(60)) {
                        ticks.fetch_add(1, Ordering::Relaxed);
                    }
                })
                .unwrap();
        }

        let started = Instant::now();
        assert!(group.stop(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(ticks.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_stop_detaches_stuck_thread() {
        let mut group = WorkerGroup::new();
        group
            .spawn("stuck", |_shutdown| {
                thread::sleep(Duration::from_millis(500));
            })
            .unwrap();

        assert!(!group.stop(Duration::from_millis(20)));
    }

    #[test]
    fn test_panicking_thread_is_joined() {
        let mut group = WorkerGroup::new();
        group
            .spawn("panics", |_shutdown| panic!("boom"))
            .unwrap();

        assert!(group.stop(Duration::from_secs(5)));
    }
}
