use std::collections::VecDeque;

use crate::base::packet::Packet;
use crate::timeq::Tick;

/// An accepted packet waiting out its access latency.
#[derive(Debug, Clone)]
pub struct DeferredPacket {
    pub pkt: Packet,
    pub ready_tick: Tick,
    pub admitted_at: Tick,
}

/// In-order queue of deferred packets.  Ready ticks never decrease from head to tail, so
/// responses leave in admission order.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    entries: VecDeque<DeferredPacket>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn front(&self) -> Option<&DeferredPacket> {
        self.entries.front()
    }

    pub fn back(&self) -> Option<&DeferredPacket> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredPacket> {
        self.entries.iter()
    }

    /// Append a packet admitted at `now` whose access takes `latency` ticks.  A packet may not
    /// become ready before the one ahead of it.  Returns the ready tick.
    pub fn push(&mut self, pkt: Packet, now: Tick, latency: Tick) -> Tick {
        let tail_ready = self.entries.back().map_or(0, |tail| tail.ready_tick);
        let ready_tick = now.saturating_add(latency).max(tail_ready);
        self.entries.push_back(DeferredPacket {
            pkt,
            ready_tick,
            admitted_at: now,
        });
        ready_tick
    }

    pub fn pop_front(&mut self) -> Option<DeferredPacket> {
        self.entries.pop_front()
    }

    /// Put back a head entry whose response was refused.
    pub fn push_front(&mut self, entry: DeferredPacket) {
        debug_assert!(
            self.entries
                .front()
                .map_or(true, |head| head.ready_tick >= entry.ready_tick),
            "re-inserted head would break ready-tick order"
        );
        self.entries.push_front(entry);
    }

    /// Overwrite the overlapping bytes of every queued payload with a functional write.
    pub fn snoop_write(&mut self, probe: &Packet) -> usize {
        let mut hits = 0;
        for entry in self.entries.iter_mut() {
            if entry.pkt.copy_overlap_from(probe) {
                hits += 1;
            }
        }
        hits
    }

    pub fn check_order(&self) -> bool {
        self.entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .all(|(a, b)| a.ready_tick <= b.ready_tick)
    }
}
