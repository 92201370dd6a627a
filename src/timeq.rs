/*
Time-queue for the memory model.

Everything that happens "later" in the simulation is an event sitting in an `EventQueue`.  Components
never see the queue directly; they schedule through the `Scheduler` trait, which lets a component
that only knows its own event type (e.g. the scratchpad's release/dequeue events) share one queue
with the rest of the host.

Events at the same tick fire in the order they were scheduled.  An `EventId` is the handle a
component keeps for a self-scheduled event; it is only used to ask "still scheduled?" and to cancel.
*/

use std::collections::BTreeMap;

pub type Tick = u64;

/// Handle to a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId {
    when: Tick,
    seq: u64,
}

impl EventId {
    /// Tick at which the event fires.
    pub fn when(&self) -> Tick {
        self.when
    }
}

pub trait Scheduler<T> {
    fn now(&self) -> Tick;
    fn schedule(&mut self, when: Tick, event: T) -> EventId;
    fn deschedule(&mut self, id: EventId) -> bool;
    fn is_scheduled(&self, id: EventId) -> bool;
}

#[derive(Debug)]
pub struct EventQueue<E> {
    now: Tick,
    next_seq: u64,
    events: BTreeMap<EventId, E>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            events: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Tick of the earliest pending event.
    pub fn next_tick(&self) -> Option<Tick> {
        self.events.keys().next().map(EventId::when)
    }

    /// Remove the earliest event and advance the clock to its tick.
    pub fn pop(&mut self) -> Option<(Tick, E)> {
        let (id, event) = self.events.pop_first()?;
        debug_assert!(id.when >= self.now, "event queue went backwards");
        self.now = id.when;
        Some((id.when, event))
    }

    /// Like `pop`, but only if the earliest event fires no later than `limit`.
    pub fn pop_until(&mut self, limit: Tick) -> Option<(Tick, E)> {
        match self.next_tick() {
            Some(when) if when <= limit => self.pop(),
            _ => None,
        }
    }

    pub fn schedule<T: Into<E>>(&mut self, when: Tick, event: T) -> EventId {
        assert!(
            when >= self.now,
            "cannot schedule an event in the past (now {}, requested {})",
            self.now,
            when
        );
        let id = EventId {
            when,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.events.insert(id, event.into());
        id
    }

    pub fn deschedule(&mut self, id: EventId) -> bool {
        self.events.remove(&id).is_some()
    }

    pub fn is_scheduled(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }

    /// Move the clock forward without firing anything.
    pub fn advance_to(&mut self, tick: Tick) {
        assert!(tick >= self.now, "cannot move time backwards ({} -> {})", self.now, tick);
        if let Some(next) = self.next_tick() {
            assert!(
                next >= tick,
                "advancing to {} would skip an event scheduled at {}",
                tick,
                next
            );
        }
        self.now = tick;
    }
}

impl<E, T: Into<E>> Scheduler<T> for EventQueue<E> {
    fn now(&self) -> Tick {
        self.now
    }

    fn schedule(&mut self, when: Tick, event: T) -> EventId {
        EventQueue::schedule(self, when, event)
    }

    fn deschedule(&mut self, id: EventId) -> bool {
        EventQueue::deschedule(self, id)
    }

    fn is_scheduled(&self, id: EventId) -> bool {
        EventQueue::is_scheduled(self, id)
    }
}
