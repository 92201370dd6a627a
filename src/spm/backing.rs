use log::debug;

use crate::base::mem::HasMemory;
use crate::base::packet::{AddrRange, MemCmd, Packet};
use crate::sim::flat_mem::FlatMemory;

/// Result of applying a packet to the backing bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(u32),
    Written(u32),
    /// No bytes touched (flush).
    Untouched,
    Fault,
}

/// Applies packets to the bytes behind the endpoint.  Range faults are written into the packet
/// instead of being returned.
#[derive(Debug, Clone)]
pub struct BackingStore<M: HasMemory = FlatMemory> {
    mem: M,
}

impl BackingStore<FlatMemory> {
    pub fn flat(range: AddrRange) -> Self {
        Self::new(FlatMemory::new(range))
    }
}

impl<M: HasMemory> BackingStore<M> {
    pub fn new(mem: M) -> Self {
        Self { mem }
    }

    pub fn range(&self) -> AddrRange {
        self.mem.range()
    }

    pub fn memory(&self) -> &M {
        &self.mem
    }

    /// Timing-path access: apply the effect, then turn the packet into its response.
    pub fn access(&mut self, pkt: &mut Packet) -> Access {
        let res = self.apply(pkt);
        if pkt.needs_response() && !pkt.is_response() {
            pkt.make_response();
        }
        res
    }

    /// Debug probe; same effect, no timing.
    pub fn functional(&mut self, pkt: &mut Packet) -> Access {
        let res = self.apply(pkt);
        if !pkt.is_response() {
            pkt.make_response();
        }
        res
    }

    fn apply(&mut self, pkt: &mut Packet) -> Access {
        let res = match pkt.cmd() {
            MemCmd::ReadReq => self
                .mem
                .read(pkt.addr(), pkt.size() as usize)
                .map(|bytes| bytes.to_vec())
                .map(|bytes| {
                    pkt.set_data(&bytes);
                    Access::Read(pkt.size())
                }),
            MemCmd::WriteReq => self
                .mem
                .write(pkt.addr(), pkt.data())
                .map(|_| Access::Written(pkt.size())),
            MemCmd::FlushReq => Ok(Access::Untouched),
            _ => {
                debug!("{}: already a response, ignored", pkt);
                Ok(Access::Untouched)
            }
        };
        res.unwrap_or_else(|err| {
            debug!("{}: {:#}", pkt, err);
            pkt.set_fault(format!("{:#}", err));
            Access::Fault
        })
    }
}
