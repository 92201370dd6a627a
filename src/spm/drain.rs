use std::sync::{Arc, Mutex};

use log::debug;

use crate::timeq::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Drained,
    /// Work still in flight: queued packets plus one if the regulator is busy.
    Draining(usize),
}

/// Host-side object told when an endpoint has gone quiet.
pub trait DrainManager {
    fn signal_drain_done(&mut self, now: Tick);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainRecord {
    pub signals: u32,
    pub last_tick: Option<Tick>,
}

/// Shared drain manager; clones observe the same record.
#[derive(Debug, Clone, Default)]
pub struct DrainLatch {
    record: Arc<Mutex<DrainRecord>>,
}

impl DrainLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> DrainRecord {
        *self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn signals(&self) -> u32 {
        self.record().signals
    }

    pub fn last_tick(&self) -> Option<Tick> {
        self.record().last_tick
    }
}

impl DrainManager for DrainLatch {
    fn signal_drain_done(&mut self, now: Tick) {
        let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        record.signals += 1;
        record.last_tick = Some(now);
    }
}

/// Holds the outstanding drain request, if any, and fires it exactly once.
#[derive(Default)]
pub struct DrainCoordinator {
    handle: Option<Box<dyn DrainManager>>,
}

impl std::fmt::Debug for DrainCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainCoordinator")
            .field("pending", &self.handle.is_some())
            .finish()
    }
}

impl DrainCoordinator {
    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Start a drain.  `pending` is the in-flight work count; zero signals immediately.
    pub fn begin(&mut self, mut handle: Box<dyn DrainManager>, pending: usize, now: Tick) -> DrainState {
        if pending == 0 {
            handle.signal_drain_done(now);
            self.handle = None;
            return DrainState::Drained;
        }
        if self.handle.replace(handle).is_some() {
            debug!("drain re-requested @ {}, replacing previous handle", now);
        }
        DrainState::Draining(pending)
    }

    /// Called after every state change that can make the endpoint quiescent.
    pub fn check(&mut self, quiescent: bool, now: Tick) -> bool {
        if !quiescent {
            return false;
        }
        match self.handle.take() {
            Some(mut handle) => {
                handle.signal_drain_done(now);
                true
            }
            None => false,
        }
    }
}
