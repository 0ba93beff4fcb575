//! Background expiry sweep

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use aplus_session::SessionStore;

use crate::Result;

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    /// Sleep for `timeout` or until stopped. Returns whether we were stopped.
    ///
    /// A timeout too large to express as a deadline waits for the stop alone.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut stopped = self.stopped.lock();
        while !*stopped {
            match deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
                None => self.wake.wait(&mut stopped),
            }
        }
        *stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }
}

/// Runs `cleanup_expired` on a dedicated thread every `interval`.
///
/// Stopped by [`stop`](Self::stop) or on drop.
pub struct Sweeper {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn start(store: Arc<SessionStore>, interval: Duration) -> Result<Self> {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let handle = std::thread::Builder::new()
            .name("aplus-session-sweeper".to_string())
            .spawn(move || {
                tracing::debug!(interval_secs = interval.as_secs_f64(), "Sweeper started");
                while !thread_signal.wait(interval) {
                    let removed = store.cleanup_expired();
                    tracing::trace!(removed, "Sweep finished");
                }
                tracing::debug!("Sweeper stopped");
            })?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Sweeper thread panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
