use log::trace;

use crate::spm::SpmEvent;
use crate::timeq::{EventId, Scheduler, Tick};

/// Busy/idle gate enforcing the bytes-per-tick budget.  Each admitted request keeps the endpoint
/// busy for `ceil(bytes / bandwidth)` ticks; a release event ends the busy period.
#[derive(Debug, Clone)]
pub struct BandwidthRegulator {
    bytes_per_tick: f64,
    release_event: Option<EventId>,
}

impl BandwidthRegulator {
    pub fn new(bytes_per_tick: f64) -> Self {
        assert!(bytes_per_tick > 0.0, "bandwidth must be > 0");
        Self {
            bytes_per_tick,
            release_event: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.release_event.is_some()
    }

    /// Tick at which the current busy period ends.
    pub fn busy_until(&self) -> Option<Tick> {
        self.release_event.map(|id| id.when())
    }

    pub fn duration(&self, bytes: u32) -> Tick {
        (bytes as f64 / self.bytes_per_tick).ceil() as Tick
    }

    /// Occupy the endpoint for `bytes`.  Returns the busy time; zero means the regulator did
    /// not engage.
    pub fn engage(&mut self, bytes: u32, sched: &mut dyn Scheduler<SpmEvent>) -> Tick {
        assert!(!self.is_busy(), "regulator engaged while busy");
        let duration = self.duration(bytes);
        if duration > 0 {
            let when = sched.now() + duration;
            trace!("regulator busy for {} ticks ({} bytes), release @ {}", duration, bytes, when);
            self.release_event = Some(sched.schedule(when, SpmEvent::Release));
        }
        duration
    }

    /// Called when the release event fires.
    pub fn release(&mut self) {
        assert!(self.release_event.take().is_some(), "release without a busy period");
    }
}
