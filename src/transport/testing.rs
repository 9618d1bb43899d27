//! In-memory transport and scheduler for deterministic lifecycle tests.

use super::connection::{Scheduler, TimerId, Transport};
use crate::error::ConnectionError;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Records every transport call instead of touching the network.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub opened: Vec<Url>,
    pub sent: Vec<String>,
    pub closed: Vec<u16>,
    /// Make the next `open` calls fail synchronously.
    pub fail_open: bool,
}

impl Transport for RecordingTransport {
    fn open(&mut self, endpoint: &Url) -> Result<(), ConnectionError> {
        if self.fail_open {
            return Err(ConnectionError::Open("refused".into()));
        }
        self.opened.push(endpoint.clone());
        Ok(())
    }

    fn send(&mut self, payload: String) -> Result<(), ConnectionError> {
        self.sent.push(payload);
        Ok(())
    }

    fn close(&mut self, code: u16) {
        self.closed.push(code);
    }
}

/// Timers that only fire when the test says so.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    scheduled: BTreeMap<TimerId, Duration>,
    pub cancelled: Vec<TimerId>,
}

impl ManualScheduler {
    /// Delays of the timers still pending, oldest first.
    pub fn pending(&self) -> Vec<Duration> {
        self.scheduled.values().copied().collect()
    }

    pub fn pending_ids(&self) -> Vec<TimerId> {
        self.scheduled.keys().copied().collect()
    }

    /// Remove and return the oldest pending timer, as if it had fired.
    pub fn fire_next(&mut self) -> Option<TimerId> {
        let timer = *self.scheduled.keys().next()?;
        self.scheduled.remove(&timer);
        Some(timer)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let timer = TimerId(self.next_id);
        self.scheduled.insert(timer, delay);
        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        if self.scheduled.remove(&timer).is_some() {
            self.cancelled.push(timer);
        }
    }
}
