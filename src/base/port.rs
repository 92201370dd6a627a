/// Port protocol between a requester and a memory endpoint.
///
/// The endpoint side (`ResponsePort`) is driven by the requester; the requester side
/// (`RequestPeer`) is driven by the endpoint's own events.  Packet ownership travels with the
/// call: a refused packet is always handed back inside the `Err` value.
use crate::base::packet::{AddrRangeList, Packet};
use crate::timeq::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The endpoint is still serving a previous request's bytes.
    Busy,
}

/// A refused request, returned to its sender.
#[derive(Debug, Clone)]
pub struct RejectWith<T> {
    pub payload: T,
    /// Earliest tick at which the endpoint expects to have capacity again.  Informational only:
    /// the sender must still wait for the retry upcall.
    pub retry_at: Tick,
    pub reason: RejectReason,
}

impl<T> RejectWith<T> {
    pub fn new(payload: T, retry_at: Tick, reason: RejectReason) -> Self {
        Self {
            payload,
            retry_at,
            reason,
        }
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

/// Slave-side interface offered to upstream requesters.
pub trait ResponsePort {
    /// Apply the access immediately and return the modelled latency.
    fn recv_atomic(&mut self, pkt: &mut Packet) -> Tick;

    /// Apply the access immediately with no timing effect.
    fn recv_functional(&mut self, pkt: &mut Packet);

    fn recv_timing_req(&mut self, pkt: Packet) -> Result<(), RejectWith<Packet>>;

    /// The peer can now take the response it previously refused.
    fn recv_resp_retry(&mut self);

    fn addr_ranges(&self) -> AddrRangeList;
}

/// Upcalls from a memory endpoint to the requester it serves.
pub trait RequestPeer {
    /// Offer a response.  Refusing hands the packet back and obliges the peer to call
    /// `recv_resp_retry` later.
    fn recv_timing_resp(&mut self, now: Tick, pkt: Packet) -> Result<(), Packet>;

    /// A previously refused request may now be resent.
    fn recv_req_retry(&mut self, now: Tick);
}
