//! "No AIT detected" timeout that races the decoder.
//!
//! Whichever side settles first wins: either the decoder reports a result
//! through [`AitWatchdog::settle`], or the deadline elapses and the timeout
//! callback runs. The loser is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct AitWatchdog {
    settled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl AitWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh race, cancelling any previous one. Must be called from
    /// within a Tokio runtime.
    pub fn arm<F>(&mut self, timeout: Duration, on_timeout: F) -> anyhow::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = Handle::try_current()?;
        self.disarm();

        let settled = Arc::new(AtomicBool::new(false));
        self.settled = Arc::clone(&settled);
        self.task = Some(handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            if !settled.swap(true, Ordering::AcqRel) {
                info!("no AIT within {} ms", timeout.as_millis());
                on_timeout();
            }
        }));
        debug!("AIT watchdog armed for {} ms", timeout.as_millis());
        Ok(())
    }

    /// Marks the race as won by the decoder. Returns `true` only for the
    /// first caller, and only if the timeout has not fired.
    pub fn settle(&mut self) -> bool {
        let won = !self.settled.swap(true, Ordering::AcqRel);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        won
    }

    /// Cancels the pending timeout without settling.
    pub fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("AIT watchdog disarmed");
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for AitWatchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}
