use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

pub type Addr = u64;

/// Contiguous `[start, start + size)` slice of the physical address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AddrRange {
    pub start: Addr,
    pub size: u64,
}

pub type AddrRangeList = SmallVec<[AddrRange; 1]>;

impl AddrRange {
    pub fn new(start: Addr, size: u64) -> Self {
        Self { start, size }
    }

    /// One past the last byte of the range.
    pub fn end(&self) -> Addr {
        self.start.saturating_add(self.size)
    }

    pub fn contains(&self, addr: Addr) -> bool {
        addr >= self.start && addr < self.end()
    }

    /// True if every byte of `[addr, addr + size)` lies inside the range.
    pub fn contains_span(&self, addr: Addr, size: u64) -> bool {
        match addr.checked_add(size) {
            Some(end) => addr >= self.start && end <= self.end(),
            None => false,
        }
    }

    pub fn intersects(&self, other: &AddrRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}:{:#x})", self.start, self.end())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemCmd {
    ReadReq,
    ReadResp,
    WriteReq,
    WriteResp,
    /// Carries no data; an SPM has nothing to flush but must still answer.
    FlushReq,
    FlushResp,
}

impl MemCmd {
    pub fn is_read(self) -> bool {
        matches!(self, Self::ReadReq | Self::ReadResp)
    }

    pub fn is_write(self) -> bool {
        matches!(self, Self::WriteReq | Self::WriteResp)
    }

    pub fn is_request(self) -> bool {
        matches!(self, Self::ReadReq | Self::WriteReq | Self::FlushReq)
    }

    pub fn is_response(self) -> bool {
        !self.is_request()
    }

    pub fn response_command(self) -> Option<MemCmd> {
        match self {
            Self::ReadReq => Some(Self::ReadResp),
            Self::WriteReq => Some(Self::WriteResp),
            Self::FlushReq => Some(Self::FlushResp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadReq => "ReadReq",
            Self::ReadResp => "ReadResp",
            Self::WriteReq => "WriteReq",
            Self::WriteResp => "WriteResp",
            Self::FlushReq => "FlushReq",
            Self::FlushResp => "FlushResp",
        }
    }
}

impl fmt::Display for MemCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error carried back to the requester inside the response packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFault {
    pub addr: Addr,
    pub size: u32,
    pub reason: String,
}

impl fmt::Display for AccessFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "access fault @ {:#x} ({} bytes): {}", self.addr, self.size, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: u64,
    cmd: MemCmd,
    addr: Addr,
    size: u32,
    data: Vec<u8>,
    needs_response: bool,
    fault: Option<AccessFault>,
}

impl Packet {
    pub fn new_read(id: u64, addr: Addr, size: u32) -> Self {
        Self {
            id,
            cmd: MemCmd::ReadReq,
            addr,
            size,
            data: Vec::new(),
            needs_response: true,
            fault: None,
        }
    }

    pub fn new_write(id: u64, addr: Addr, data: Vec<u8>) -> Self {
        let size = data.len() as u32;
        Self {
            id,
            cmd: MemCmd::WriteReq,
            addr,
            size,
            data,
            needs_response: true,
            fault: None,
        }
    }

    /// Posted write: the requester does not expect an answer.
    pub fn new_posted_write(id: u64, addr: Addr, data: Vec<u8>) -> Self {
        Self {
            needs_response: false,
            ..Self::new_write(id, addr, data)
        }
    }

    pub fn new_flush(id: u64, addr: Addr, size: u32) -> Self {
        Self {
            id,
            cmd: MemCmd::FlushReq,
            addr,
            size,
            data: Vec::new(),
            needs_response: true,
            fault: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cmd(&self) -> MemCmd {
        self.cmd
    }

    pub fn addr(&self) -> Addr {
        self.addr
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn range(&self) -> AddrRange {
        AddrRange::new(self.addr, self.size as u64)
    }

    pub fn is_read(&self) -> bool {
        self.cmd.is_read()
    }

    pub fn is_write(&self) -> bool {
        self.cmd.is_write()
    }

    pub fn is_response(&self) -> bool {
        self.cmd.is_response()
    }

    pub fn needs_response(&self) -> bool {
        self.needs_response
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn set_data(&mut self, data: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(data);
    }

    pub fn fault(&self) -> Option<&AccessFault> {
        self.fault.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.fault.is_some()
    }

    pub fn set_fault(&mut self, reason: impl Into<String>) {
        self.fault = Some(AccessFault {
            addr: self.addr,
            size: self.size,
            reason: reason.into(),
        });
    }

    /// Turn a request into its response form, keeping id, address and payload.
    pub fn make_response(&mut self) {
        self.cmd = self
            .cmd
            .response_command()
            .unwrap_or_else(|| panic!("packet {} is already a response ({})", self.id, self.cmd));
    }

    /// Copy the bytes of `src` that overlap this packet into this packet's payload.
    /// Returns true if anything overlapped.
    pub fn copy_overlap_from(&mut self, src: &Packet) -> bool {
        if !self.has_data() || !src.has_data() {
            return false;
        }
        let dst_range = AddrRange::new(self.addr, self.data.len() as u64);
        let src_range = AddrRange::new(src.addr, src.data.len() as u64);
        if !dst_range.intersects(&src_range) {
            return false;
        }
        let start = dst_range.start.max(src_range.start);
        let end = dst_range.end().min(src_range.end());
        let dst_off = (start - dst_range.start) as usize;
        let src_off = (start - src_range.start) as usize;
        let len = (end - start) as usize;
        self.data[dst_off..dst_off + len].copy_from_slice(&src.data[src_off..src_off + len]);
        true
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {:#x} [{}B]", self.id, self.cmd, self.addr, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_response_keeps_payload() {
        let mut pkt = Packet::new_write(3, 0x100, vec![1, 2, 3, 4]);
        pkt.make_response();
        assert_eq!(MemCmd::WriteResp, pkt.cmd());
        assert_eq!(&[1u8, 2, 3, 4], pkt.data());
        assert_eq!(3, pkt.id());
    }

    #[test]
    #[should_panic(expected = "already a response")]
    fn double_response_panics() {
        let mut pkt = Packet::new_read(0, 0, 4);
        pkt.make_response();
        pkt.make_response();
    }

    #[test]
    fn posted_write_needs_no_response() {
        let pkt = Packet::new_posted_write(0, 0x40, vec![0; 8]);
        assert!(!pkt.needs_response());
        assert_eq!(8, pkt.size());
        assert!(pkt.is_write());
    }

    #[test]
    fn overlap_copy_handles_partial_overlap() {
        let mut dst = Packet::new_write(0, 0x10, vec![0; 8]);
        let src = Packet::new_write(1, 0x14, vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert!(dst.copy_overlap_from(&src));
        assert_eq!(&[0u8, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD], dst.data());

        let far = Packet::new_write(2, 0x40, vec![1; 4]);
        assert!(!dst.copy_overlap_from(&far));
    }

    #[test]
    fn range_helpers() {
        let r = AddrRange::new(0x1000, 0x100);
        assert_eq!(0x1100, r.end());
        assert!(r.contains(0x10FF));
        assert!(!r.contains(0x1100));
        assert!(r.contains_span(0x10FC, 4));
        assert!(!r.contains_span(0x10FE, 4));
        assert!(!r.contains_span(u64::MAX, 2));
        assert!(r.intersects(&AddrRange::new(0x10F0, 0x20)));
        assert!(!r.intersects(&AddrRange::new(0x1100, 0x20)));
        assert_eq!("[0x1000:0x1100)", r.to_string());
    }
}
