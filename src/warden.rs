//! The Warden - poll scheduler
//!
//! Drives a [`PollHandler`] at a fixed interval on one dedicated worker
//! thread:
//! - `start` arms a ticker and spawns the worker
//! - `stop` signals the worker, waits for it to acknowledge and exit
//! - Ticks missed while a poll is running are coalesced, never queued
//!
//! The ticker channel holds at most one pending tick, so the handler is never
//! invoked concurrently with itself. Cancellation is cooperative: a poll in
//! progress finishes before the worker sees the stop signal.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Sender};

use crate::error::{Error, Result};

use machine::*;

// Kept apart from the crate `Result` alias, which the macro expansion would pick up
mod machine {
    use state_machines::state_machine;

    state_machine! {
        name: PollerMachine,
        dynamic: true,
        initial: Stopped,
        states: [Stopped, Running],
        events {
            start {
                transition: { from: Stopped, to: Running }
            }
            stop {
                transition: { from: Running, to: Stopped }
            }
        }
    }
}

/// Callback invoked on every tick
pub trait PollHandler: Send + Sync {
    /// Called with the time of the tick; runs to completion before the next one
    fn poll(&self, now: DateTime<Utc>);
}

/// Running worker thread and its stop channel
struct Worker {
    /// Rendezvous channel: a send completes only when the worker receives it
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

struct Lifecycle {
    machine: DynamicPollerMachine<()>,
    worker: Option<Worker>,
}

/// Fixed-interval poll scheduler with a strict start/stop lifecycle
pub struct Warden {
    interval: Duration,
    handler: Arc<dyn PollHandler>,
    lifecycle: Mutex<Lifecycle>,
}

impl Warden {
    /// Create a stopped scheduler; `interval_ms` must be non-zero
    pub fn new(interval_ms: u64, handler: Arc<dyn PollHandler>) -> Result<Self> {
        if interval_ms == 0 {
            return Err(Error::ConfigValidation(
                "poll interval must be greater than 0ms".to_string(),
            ));
        }

        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            handler,
            lifecycle: Mutex::new(Lifecycle {
                machine: PollerMachine::new(()).into_dynamic(),
                worker: None,
            }),
        })
    }

    /// Check if the worker is active
    pub fn is_running(&self) -> bool {
        self.lock().machine.current_state() == "Running"
    }

    /// Arm the ticker and spawn the worker
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lock();
        lifecycle
            .machine
            .handle(PollerMachineEvent::Start)
            .map_err(|_| Error::AlreadyRunning)?;

        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(self.interval);
        let handler = Arc::clone(&self.handler);

        let spawned = thread::Builder::new()
            .name("mon-poller".to_string())
            .spawn(move || {
                loop {
                    channel::select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => run_poll(handler.as_ref()),
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                lifecycle.worker = Some(Worker { stop_tx, handle });
                tracing::debug!("Poller started ({:?} interval)", self.interval);
                Ok(())
            }
            Err(e) => {
                let _ = lifecycle.machine.handle(PollerMachineEvent::Stop);
                Err(Error::Io(e))
            }
        }
    }

    /// Signal the worker and block until it has exited
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lock();
        lifecycle
            .machine
            .handle(PollerMachineEvent::Stop)
            .map_err(|_| Error::NotRunning)?;

        let Some(worker) = lifecycle.worker.take() else {
            return Ok(());
        };

        // Fails only if the worker already died; join reports why
        let _ = worker.stop_tx.send(());
        worker.handle.join().map_err(|_| Error::WorkerPanicked)?;

        tracing::debug!("Poller stopped");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Invoke the handler once; a panicking poll is logged and the worker keeps ticking
fn run_poll(handler: &dyn PollHandler) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| handler.poll(Utc::now())));
    if let Err(payload) = result {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!("Poll panicked: {}", reason);
    }
}

impl Drop for Warden {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}
