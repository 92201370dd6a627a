use anyhow::Context;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sim::config::SimConfig;
use crate::sim::perf_log::{log_summary, write_summary, RunSummary};
use crate::spm::config::SpmConfig;
use crate::spm::drain::{DrainLatch, DrainState};
use crate::spm::{ScratchpadMemory, SpmEvent};
use crate::timeq::{EventQueue, Tick};
use crate::traffic::{TrafficConfig, TrafficEvent, TrafficRequester};

/// Every event the host loop can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Spm(SpmEvent),
    Traffic(TrafficEvent),
    Drain,
}

impl From<SpmEvent> for SimEvent {
    fn from(event: SpmEvent) -> Self {
        SimEvent::Spm(event)
    }
}

impl From<TrafficEvent> for SimEvent {
    fn from(event: TrafficEvent) -> Self {
        SimEvent::Traffic(event)
    }
}

pub struct Sim {
    config: SimConfig,
    events: EventQueue<SimEvent>,
    spm: ScratchpadMemory,
    requester: TrafficRequester,
    drain_latch: DrainLatch,
    drain_scheduled: bool,
}

impl Sim {
    pub fn new(config: SimConfig, spm_config: SpmConfig, mut traffic: TrafficConfig) -> anyhow::Result<Sim> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let spm = ScratchpadMemory::new(&spm_config, rng.gen())
            .with_context(|| format!("invalid spm config '{}'", spm_config.name))?;
        if !traffic.enabled {
            info!("traffic disabled");
            traffic.patterns.clear();
        }
        let requester = TrafficRequester::new(&traffic, rng.gen()).context("invalid traffic config")?;
        Ok(Sim {
            config,
            events: EventQueue::new(),
            spm,
            requester,
            drain_latch: DrainLatch::new(),
            drain_scheduled: false,
        })
    }

    pub fn spm(&self) -> &ScratchpadMemory {
        &self.spm
    }

    pub fn requester(&self) -> &TrafficRequester {
        &self.requester
    }

    pub fn now(&self) -> Tick {
        self.events.now()
    }

    pub fn simulate(&mut self) -> anyhow::Result<RunSummary> {
        self.requester.start(self.events.now());
        self.flush_wakeups();
        self.maybe_drain();

        let timeout = self.config.timeout;
        while let Some((now, event)) = self.events.pop_until(timeout) {
            self.dispatch(now, event);
            self.flush_wakeups();
            self.maybe_drain();
        }

        let timed_out = !self.events.is_empty();
        if timed_out {
            warn!(
                "simulation timed out @ {} with {} events pending",
                self.events.now(),
                self.events.len()
            );
        } else if !self.requester.is_done() {
            warn!("event queue ran dry with traffic still outstanding");
        }

        let summary = self.summary(timed_out);
        log_summary(&summary);
        if let Some(path) = &self.config.stats_json {
            write_summary(path, &summary)?;
        }
        Ok(summary)
    }

    pub fn summary(&self, timed_out: bool) -> RunSummary {
        let end_tick = self.events.now();
        let record = self.drain_latch.record();
        RunSummary {
            end_tick,
            timed_out,
            drained_at: record.last_tick,
            drain_signals: record.signals,
            spm: self.spm.stats().clone(),
            spm_derived: self.spm.stats().derived(end_tick),
            traffic: self.requester.summary(),
        }
    }

    fn dispatch(&mut self, now: Tick, event: SimEvent) {
        match event {
            SimEvent::Spm(event) => {
                self.spm.process(event, &mut self.events, &mut self.requester);
                if cfg!(debug_assertions) {
                    self.spm.check_invariants(&self.events);
                }
            }
            SimEvent::Traffic(event) => {
                let mut port = self.spm.port(&mut self.events);
                self.requester.process(event, now, &mut port);
            }
            SimEvent::Drain => {
                let handle = Box::new(self.drain_latch.clone());
                if let DrainState::Draining(pending) = self.spm.drain(handle, now) {
                    info!("waiting on {} in-flight items before drain completes", pending);
                }
            }
        }
    }

    fn flush_wakeups(&mut self) {
        for (when, event) in self.requester.take_wakeups() {
            self.events.schedule(when, event);
        }
    }

    fn maybe_drain(&mut self) {
        if self.config.drain_at_end && !self.drain_scheduled && self.requester.all_issued() {
            self.drain_scheduled = true;
            self.events.schedule(self.events.now(), SimEvent::Drain);
        }
    }
}
