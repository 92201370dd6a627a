use std::collections::HashMap;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use smallvec::SmallVec;

use crate::base::packet::{Addr, AddrRange, Packet};
use crate::base::port::{RequestPeer, ResponsePort};
use crate::timeq::Tick;
use crate::traffic::config::{TrafficConfig, TrafficIssueConfig};
use crate::traffic::patterns::{PatternEngine, PatternOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficEvent {
    /// Try to put the next request on the port.
    Issue,
    /// Tell the memory a refused response can be resent.
    RespRetry,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternCheckpoint {
    pub pattern_name: String,
    pub finished_at: Tick,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrafficSummary {
    pub issued: u64,
    pub posted: u64,
    pub completed: u64,
    pub rejected: u64,
    pub retries_received: u64,
    pub refused_responses: u64,
    pub mismatches: u64,
    pub faults: u64,
    pub max_latency: Tick,
    pub total_latency: Tick,
    pub avg_latency: f64,
    pub patterns: Vec<PatternCheckpoint>,
}

#[derive(Debug)]
struct InFlight {
    pattern: usize,
    issued_at: Tick,
    expected: Option<Vec<u8>>,
}

/// Pattern-driven requester on the far side of a memory port.  It never calls the port from an
/// upcall; wake-ups are collected and handed to the host through [`take_wakeups`](Self::take_wakeups).
#[derive(Debug)]
pub struct TrafficRequester {
    engine: PatternEngine,
    issue: TrafficIssueConfig,
    window: AddrRange,
    shadow: Vec<u8>,
    rng: StdRng,
    pattern_idx: usize,
    req_idx: u32,
    next_id: u64,
    held: Option<(usize, Packet)>,
    waiting_req_retry: bool,
    owes_resp_retry: bool,
    last_refused: Option<u64>,
    offered: u64,
    outstanding: HashMap<u64, InFlight>,
    pattern_done: Vec<u64>,
    issue_pending: bool,
    next_issue_at: Tick,
    wakeups: SmallVec<[(Tick, TrafficEvent); 2]>,
    summary: TrafficSummary,
}

impl TrafficRequester {
    pub fn new(config: &TrafficConfig, seed: u64) -> anyhow::Result<Self> {
        let engine = PatternEngine::new(config)?;
        let window = AddrRange::new(config.address.base, config.address.size);
        info!(
            "traffic: {} patterns x {} requests over {}",
            engine.len(),
            engine.reqs_per_pattern(),
            window
        );
        Ok(Self {
            pattern_done: vec![0; engine.len()],
            engine,
            issue: config.issue.clone(),
            window,
            shadow: vec![0; config.address.size as usize],
            rng: StdRng::seed_from_u64(seed),
            pattern_idx: 0,
            req_idx: 0,
            next_id: 0,
            held: None,
            waiting_req_retry: false,
            owes_resp_retry: false,
            last_refused: None,
            offered: 0,
            outstanding: HashMap::new(),
            issue_pending: false,
            next_issue_at: 0,
            wakeups: SmallVec::new(),
            summary: TrafficSummary::default(),
        })
    }

    /// Schedule the first issue attempt.
    pub fn start(&mut self, now: Tick) {
        self.kick(now);
    }

    pub fn take_wakeups(&mut self) -> SmallVec<[(Tick, TrafficEvent); 2]> {
        std::mem::take(&mut self.wakeups)
    }

    /// Nothing left to send.
    pub fn all_issued(&self) -> bool {
        self.held.is_none() && self.pattern_idx >= self.engine.len()
    }

    pub fn is_done(&self) -> bool {
        self.all_issued() && self.outstanding.is_empty() && !self.owes_resp_retry
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn summary(&self) -> TrafficSummary {
        let mut summary = self.summary.clone();
        if summary.completed > 0 {
            summary.avg_latency = summary.total_latency as f64 / summary.completed as f64;
        }
        summary
    }

    pub fn process(&mut self, event: TrafficEvent, now: Tick, port: &mut dyn ResponsePort) {
        match event {
            TrafficEvent::Issue => self.issue_one(now, port),
            TrafficEvent::RespRetry => {
                debug!("traffic: response retry @ {}", now);
                self.owes_resp_retry = false;
                port.recv_resp_retry();
                self.kick(now);
            }
        }
    }

    fn can_issue(&self) -> bool {
        !self.all_issued()
            && !self.waiting_req_retry
            && !self.owes_resp_retry
            && self.outstanding.len() < self.issue.max_outstanding.max(1)
    }

    fn kick(&mut self, now: Tick) {
        if self.issue_pending || !self.can_issue() {
            return;
        }
        self.issue_pending = true;
        self.wakeups.push((now.max(self.next_issue_at), TrafficEvent::Issue));
    }

    fn issue_one(&mut self, now: Tick, port: &mut dyn ResponsePort) {
        self.issue_pending = false;
        if !self.can_issue() {
            return;
        }
        let (pattern, pkt) = match self.held.take() {
            Some(held) => held,
            None => match self.next_packet() {
                Some(next) => next,
                None => return,
            },
        };
        self.next_issue_at = now + self.issue.issue_gap.max(1);

        let id = pkt.id();
        let cmd = pkt.cmd();
        let span = self.shadow_span(pkt.addr(), pkt.size());
        let payload = if pkt.is_write() {
            Some(pkt.data().to_vec())
        } else {
            None
        };
        let needs_response = pkt.needs_response();
        match port.recv_timing_req(pkt) {
            Ok(()) => {
                self.summary.issued += 1;
                let mut expected = None;
                if let Some(span) = span {
                    if let Some(data) = payload {
                        self.shadow[span].copy_from_slice(&data);
                    } else if cmd.is_read() {
                        expected = Some(self.shadow[span].to_vec());
                    }
                }
                if needs_response {
                    self.outstanding.insert(
                        id,
                        InFlight {
                            pattern,
                            issued_at: now,
                            expected,
                        },
                    );
                } else {
                    self.summary.posted += 1;
                    self.finish_one(pattern, now);
                }
            }
            Err(rejected) => {
                debug!(
                    "traffic: #{} refused @ {} ({:?}, free @ {})",
                    id, now, rejected.reason, rejected.retry_at
                );
                self.summary.rejected += 1;
                self.waiting_req_retry = true;
                self.held = Some((pattern, rejected.into_payload()));
            }
        }
        self.kick(now);
    }

    fn next_packet(&mut self) -> Option<(usize, Packet)> {
        let pattern_idx = self.pattern_idx;
        let pattern = self.engine.pattern(pattern_idx)?;
        let (op, bytes, posted) = (pattern.op, pattern.req_bytes, pattern.posted);
        let addr = self.engine.addr(pattern_idx, self.req_idx)?;
        let id = self.next_id;
        self.next_id += 1;

        self.req_idx += 1;
        if self.req_idx as usize >= self.engine.reqs_per_pattern() {
            self.req_idx = 0;
            self.pattern_idx += 1;
        }

        let pkt = match op {
            PatternOp::Read => Packet::new_read(id, addr, bytes),
            PatternOp::Flush => Packet::new_flush(id, addr, bytes),
            PatternOp::Write => {
                let data: Vec<u8> = (0..bytes).map(|_| self.rng.gen()).collect();
                if posted {
                    Packet::new_posted_write(id, addr, data)
                } else {
                    Packet::new_write(id, addr, data)
                }
            }
        };
        Some((pattern_idx, pkt))
    }

    fn shadow_span(&self, addr: Addr, size: u32) -> Option<std::ops::Range<usize>> {
        if !self.window.contains_span(addr, size as u64) {
            return None;
        }
        let start = (addr - self.window.start) as usize;
        Some(start..start + size as usize)
    }

    fn finish_one(&mut self, pattern: usize, now: Tick) {
        self.pattern_done[pattern] += 1;
        if self.pattern_done[pattern] == self.engine.reqs_per_pattern() as u64 {
            let name = self.engine.pattern_name(pattern).unwrap_or_default().to_string();
            info!("traffic: {} finished at time {:>10}", name, now);
            self.summary.patterns.push(PatternCheckpoint {
                pattern_name: name,
                finished_at: now,
            });
        }
    }
}

impl RequestPeer for TrafficRequester {
    fn recv_timing_resp(&mut self, now: Tick, pkt: Packet) -> Result<(), Packet> {
        self.offered += 1;
        let refuse_every = self.issue.refuse_every;
        if refuse_every > 0 && self.offered % refuse_every == 0 && self.last_refused != Some(pkt.id()) {
            debug!("traffic: refusing response {} @ {}", pkt, now);
            self.summary.refused_responses += 1;
            self.last_refused = Some(pkt.id());
            self.owes_resp_retry = true;
            self.wakeups
                .push((now + self.issue.resp_retry_delay, TrafficEvent::RespRetry));
            return Err(pkt);
        }

        let Some(flight) = self.outstanding.remove(&pkt.id()) else {
            panic!("traffic: response {} @ {} matches no outstanding request", pkt, now);
        };
        let latency = now - flight.issued_at;
        self.summary.completed += 1;
        self.summary.total_latency += latency;
        self.summary.max_latency = self.summary.max_latency.max(latency);

        if let Some(fault) = pkt.fault() {
            warn!("traffic: {}", fault);
            self.summary.faults += 1;
        } else if let Some(expected) = flight.expected {
            if expected.as_slice() != pkt.data() {
                warn!(
                    "traffic: read {} returned {:02x?}, expected {:02x?}",
                    pkt,
                    pkt.data(),
                    expected
                );
                self.summary.mismatches += 1;
            }
        }
        self.finish_one(flight.pattern, now);
        self.kick(now);
        Ok(())
    }

    fn recv_req_retry(&mut self, now: Tick) {
        debug!("traffic: request retry @ {}", now);
        self.summary.retries_received += 1;
        self.waiting_req_retry = false;
        self.kick(now);
    }
}
