//! Cycle-accurate scratchpad memory endpoint.
//!
//! Requests enter through a [`MemoryPort`], pay a bandwidth-limited bus occupancy, wait out
//! their access latency in a FIFO [`DeferredQueue`](deferred::DeferredQueue) and leave as
//! responses from the endpoint's own `Dequeue` event.  The endpoint never calls the requester
//! from inside a receive call; requester upcalls only happen in [`ScratchpadMemory::process`].

pub mod backing;
pub mod config;
pub mod deferred;
pub mod drain;
pub mod latency;
pub mod regulator;
pub mod retry;
pub mod stats;


use log::{debug, info, trace};
use smallvec::smallvec;

use crate::base::packet::{AddrRange, AddrRangeList, MemCmd, Packet};
use crate::base::port::{RejectReason, RejectWith, RequestPeer, ResponsePort};
use crate::sim::flat_mem::FlatMemory;
use crate::timeq::{EventId, Scheduler, Tick};
use backing::{Access, BackingStore};
use config::SpmConfig;
use deferred::{DeferredPacket, DeferredQueue};
use drain::{DrainCoordinator, DrainManager, DrainState};
use latency::LatencyModel;
use regulator::BandwidthRegulator;
use retry::RetryLatches;
use stats::SpmStats;

/// Self-scheduled events of a scratchpad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpmEvent {
    /// End of the bus occupancy of the last admitted request.
    Release,
    /// The head of the deferred queue may be sent.
    Dequeue,
}

#[derive(Debug)]
pub struct ScratchpadMemory {
    name: String,
    backing: BackingStore,
    latency: LatencyModel,
    regulator: BandwidthRegulator,
    queue: DeferredQueue,
    dequeue_event: Option<EventId>,
    retry: RetryLatches,
    pending_delete: Vec<Packet>,
    drain: DrainCoordinator,
    stats: SpmStats,
}

impl ScratchpadMemory {
    pub fn new(config: &SpmConfig, seed: u64) -> anyhow::Result<Self> {
        config.validate()?;
        info!(
            "{}: range {}, latency {}+[0,{}], bandwidth {} B/tick",
            config.name, config.range, config.latency_read, config.latency_read_var, config.bandwidth
        );
        Ok(Self {
            name: config.name.clone(),
            backing: BackingStore::flat(config.range),
            latency: LatencyModel::new(config, seed),
            regulator: BandwidthRegulator::new(config.bandwidth),
            queue: DeferredQueue::new(),
            dequeue_event: None,
            retry: RetryLatches::default(),
            pending_delete: Vec::new(),
            drain: DrainCoordinator::default(),
            stats: SpmStats::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> AddrRange {
        self.backing.range()
    }

    pub fn memory(&self) -> &FlatMemory {
        self.backing.memory()
    }

    pub fn stats(&self) -> &SpmStats {
        &self.stats
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_busy(&self) -> bool {
        self.regulator.is_busy()
    }

    pub fn owes_request_retry(&self) -> bool {
        self.retry.owes_request_retry()
    }

    pub fn awaiting_response_retry(&self) -> bool {
        self.retry.awaiting_response_retry()
    }

    pub fn pending_delete_len(&self) -> usize {
        self.pending_delete.len()
    }

    pub fn is_quiescent(&self) -> bool {
        self.queue.is_empty() && !self.regulator.is_busy() && !self.retry.any()
    }

    /// Borrow the slave-side port for the duration of one upstream call.
    pub fn port<'a>(&'a mut self, sched: &'a mut dyn Scheduler<SpmEvent>) -> MemoryPort<'a> {
        MemoryPort { memory: self, sched }
    }

    /// Handle one of this endpoint's events at `sched.now()`.
    pub fn process(
        &mut self,
        event: SpmEvent,
        sched: &mut dyn Scheduler<SpmEvent>,
        peer: &mut dyn RequestPeer,
    ) {
        match event {
            SpmEvent::Release => self.release(sched.now(), peer),
            SpmEvent::Dequeue => self.dequeue(sched, peer),
        }
        let now = sched.now();
        if self.drain.check(self.is_quiescent(), now) {
            info!("{}: drained @ {}", self.name, now);
        }
    }

    pub fn drain(&mut self, handle: Box<dyn DrainManager>, now: Tick) -> DrainState {
        self.pending_delete.clear();
        let pending = if self.is_quiescent() {
            0
        } else {
            (self.queue.len() + self.regulator.is_busy() as usize).max(1)
        };
        let state = self.drain.begin(handle, pending, now);
        info!("{}: drain requested @ {} -> {:?}", self.name, now, state);
        state
    }

    /// Panics if any structural invariant of the timing core is broken.
    pub fn check_invariants(&self, sched: &dyn Scheduler<SpmEvent>) {
        let now = sched.now();
        assert!(self.queue.check_order(), "{}: queue out of ready-tick order @ {}", self.name, now);
        let horizon = now.saturating_add(self.latency.worst_case());
        if let Some(tail) = self.queue.back() {
            assert!(
                tail.ready_tick <= horizon,
                "{}: tail ready @ {} beyond worst-case latency from {}",
                self.name,
                tail.ready_tick,
                now
            );
        }
        match (self.queue.front(), self.dequeue_event) {
            (Some(head), Some(id)) => {
                assert!(sched.is_scheduled(id), "{}: stale dequeue handle @ {}", self.name, now);
                assert!(
                    id.when() >= head.ready_tick,
                    "{}: dequeue @ {} before head ready @ {}",
                    self.name,
                    id.when(),
                    head.ready_tick
                );
                assert!(!self.retry.awaiting_response_retry());
            }
            (Some(_), None) => assert!(
                self.retry.awaiting_response_retry(),
                "{}: non-empty queue without a dequeue event @ {}",
                self.name,
                now
            ),
            (None, Some(_)) => panic!("{}: dequeue scheduled for an empty queue @ {}", self.name, now),
            (None, None) => assert!(!self.retry.awaiting_response_retry()),
        }
        if let Some(until) = self.regulator.busy_until() {
            assert!(until >= now, "{}: busy past its release @ {}", self.name, now);
        } else {
            assert!(!self.retry.owes_request_retry(), "{}: owes a retry while idle", self.name);
        }
    }

    fn recv_timing_req(
        &mut self,
        mut pkt: Packet,
        sched: &mut dyn Scheduler<SpmEvent>,
    ) -> Result<(), RejectWith<Packet>> {
        let now = sched.now();
        self.pending_delete.clear();
        assert!(
            !self.retry.awaiting_response_retry(),
            "{}: timing request {} @ {} while waiting for a response retry",
            self.name,
            pkt,
            now
        );
        assert!(
            pkt.cmd().is_request(),
            "{}: timing request path handed a {} packet ({}) @ {}",
            self.name,
            pkt.cmd(),
            pkt,
            now
        );

        if let Some(busy_until) = self.regulator.busy_until() {
            debug!("{}: busy until {}, refusing {} @ {}", self.name, busy_until, pkt, now);
            self.retry.owe_request_retry();
            self.stats.record_req_refused(pkt.cmd());
            return Err(RejectWith::new(pkt, busy_until, RejectReason::Busy));
        }

        let cmd = pkt.cmd();
        let bytes = pkt.size();
        self.stats.record_admit(cmd, bytes, self.queue.len(), now);
        let access = self.backing.access(&mut pkt);
        self.record_access(cmd, access);
        let bus = self.regulator.engage(bytes, sched);
        self.stats.record_bus_time(bus);

        if pkt.needs_response() {
            let latency = self.latency.sample(cmd);
            let was_empty = self.queue.is_empty();
            trace!("{}: admit {} @ {}, latency {}", self.name, pkt, now, latency);
            let ready = self.queue.push(pkt, now, latency);
            self.stats.record_queue_depth(self.queue.len());
            if was_empty {
                self.schedule_dequeue(ready, sched);
            }
        } else {
            trace!("{}: admit {} @ {}, no response", self.name, pkt, now);
            self.stats.record_no_response();
            self.pending_delete.push(pkt);
            if self.queue.is_empty() {
                self.stats.close_activation();
            }
        }
        Ok(())
    }

    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick {
        self.pending_delete.clear();
        let cmd = pkt.cmd();
        let access = self.backing.access(pkt);
        self.record_access(cmd, access);
        if let Access::Written(_) = access {
            self.queue.snoop_write(pkt);
        }
        self.latency.sample(cmd)
    }

    fn recv_functional(&mut self, pkt: &mut Packet) {
        self.pending_delete.clear();
        // admitted writes already sit in the backing bytes, so reads need no snooping
        if let Access::Written(_) = self.backing.functional(pkt) {
            let hits = self.queue.snoop_write(pkt);
            trace!("{}: functional {} patched {} queued packets", self.name, pkt, hits);
        }
    }

    fn recv_resp_retry(&mut self, sched: &mut dyn Scheduler<SpmEvent>) {
        let now = sched.now();
        self.pending_delete.clear();
        assert!(
            self.retry.take_response_retry(),
            "{}: response retry @ {} but none was owed",
            self.name,
            now
        );
        debug!("{}: response retry @ {}", self.name, now);
        self.schedule_dequeue(now, sched);
    }

    fn release(&mut self, now: Tick, peer: &mut dyn RequestPeer) {
        self.regulator.release();
        trace!("{}: release @ {}", self.name, now);
        if self.retry.take_request_retry() {
            debug!("{}: sending request retry @ {}", self.name, now);
            self.stats.record_req_retry_sent();
            peer.recv_req_retry(now);
        }
    }

    fn dequeue(&mut self, sched: &mut dyn Scheduler<SpmEvent>, peer: &mut dyn RequestPeer) {
        let now = sched.now();
        self.dequeue_event = None;
        let DeferredPacket {
            pkt,
            ready_tick,
            admitted_at,
        } = self
            .queue
            .pop_front()
            .unwrap_or_else(|| panic!("{}: dequeue @ {} with an empty queue", self.name, now));
        assert!(ready_tick <= now, "{}: dequeue @ {} before ready tick {}", self.name, now, ready_tick);
        debug_assert!(pkt.is_response());

        let id = pkt.id();
        match peer.recv_timing_resp(now, pkt) {
            Ok(()) => {
                trace!("{}: response #{} sent @ {}", self.name, id, now);
                self.stats.record_response(admitted_at, ready_tick, now);
            }
            Err(pkt) => {
                debug!("{}: response {} refused @ {}", self.name, pkt, now);
                self.stats.record_resp_refused();
                self.retry.await_response_retry();
                self.queue.push_front(DeferredPacket {
                    pkt,
                    ready_tick,
                    admitted_at,
                });
                return;
            }
        }

        match self.queue.front() {
            Some(head) => {
                let when = head.ready_tick;
                self.schedule_dequeue(when, sched);
            }
            None => self.stats.close_activation(),
        }
    }

    fn schedule_dequeue(&mut self, ready: Tick, sched: &mut dyn Scheduler<SpmEvent>) {
        assert!(
            self.dequeue_event.is_none(),
            "{}: dequeue already scheduled @ {}",
            self.name,
            sched.now()
        );
        // an overdue head leaves on the current tick
        let when = ready.max(sched.now());
        self.dequeue_event = Some(sched.schedule(when, SpmEvent::Dequeue));
    }

    fn record_access(&mut self, cmd: MemCmd, access: Access) {
        match access {
            Access::Read(n) | Access::Written(n) => self.stats.record_device_access(cmd, n),
            Access::Fault => self.stats.record_fault(),
            Access::Untouched => {}
        }
    }
}

/// Slave-side view of a [`ScratchpadMemory`] bound to the scheduler it posts events to.
pub struct MemoryPort<'a> {
    memory: &'a mut ScratchpadMemory,
    sched: &'a mut dyn Scheduler<SpmEvent>,
}

impl ResponsePort for MemoryPort<'_> {
    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick {
        self.memory.recv_atomic(pkt)
    }

    fn recv_functional(&mut self, pkt: &mut Packet) {
        self.memory.recv_functional(pkt)
    }

    fn recv_timing_req(&mut self, pkt: Packet) -> Result<(), RejectWith<Packet>> {
        self.memory.recv_timing_req(pkt, &mut *self.sched)
    }

    fn recv_resp_retry(&mut self) {
        self.memory.recv_resp_retry(&mut *self.sched)
    }

    fn addr_ranges(&self) -> AddrRangeList {
        smallvec![self.memory.range()]
    }
}
