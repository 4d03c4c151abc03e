//! The background task of a sliding hotspot.
//!
//! A [`SlidingHotspotController`] owns one thread that ticks a [`SlideState`] once per period
//! until it is stopped. Stopping sends on a channel the thread waits on, so the thread wakes up
//! immediately instead of finishing its current period.

use crate::generator::SlideState;
use crate::{Error, Result};
use log::{debug, error};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How often the hotspot moves.
pub const SLIDE_PERIOD: Duration = Duration::from_secs(1);

pub struct SlidingHotspotController {
    state: Arc<SlideState>,
    period: Duration,
    task: Option<(Sender<()>, JoinHandle<()>)>,
}

impl SlidingHotspotController {
    pub fn new(state: Arc<SlideState>) -> Self {
        Self::with_period(state, SLIDE_PERIOD)
    }

    pub fn with_period(state: Arc<SlideState>, period: Duration) -> Self {
        Self {
            state,
            period,
            task: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(Error::AlreadyStarted);
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let state = self.state.clone();
        let period = self.period;
        let handle = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {
                    let offset = state.tick();
                    debug!("Sliding hotspot moved to offset {}", offset);
                }
                // stopped, or the controller is gone
                _ => break,
            }
        });
        self.task = Some((stop_tx, handle));
        Ok(())
    }

    /// Stop the task and wait for it to exit. Does nothing if it was never started.
    pub fn stop(&mut self) {
        if let Some((stop_tx, handle)) = self.task.take() {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                error!("Sliding hotspot task panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for SlidingHotspotController {
    fn drop(&mut self) {
        self.stop();
    }
}
