use anyhow::bail;

use crate::base::packet::{Addr, AddrRange};

/// Trait for simulated memories backing a memory endpoint.
///
/// Addresses are absolute; implementors only see offsets that passed the range check.
pub trait HasMemory {
    fn range(&self) -> AddrRange;

    fn read_impl(&self, offset: usize, n: usize) -> Result<&[u8], anyhow::Error>;
    fn read(&self, addr: Addr, n: usize) -> Result<&[u8], anyhow::Error> {
        let offset = self.check_span(addr, n)?;
        self.read_impl(offset, n)
    }
    fn read_n<const N: usize>(&self, addr: Addr) -> Result<[u8; N], anyhow::Error> {
        let bytes = self.read(addr, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn write_impl(&mut self, offset: usize, data: &[u8]) -> Result<(), anyhow::Error>;
    fn write(&mut self, addr: Addr, data: &[u8]) -> Result<(), anyhow::Error> {
        let offset = self.check_span(addr, data.len())?;
        self.write_impl(offset, data)
    }
    fn write_n<const N: usize>(&mut self, addr: Addr, data: [u8; N]) -> Result<(), anyhow::Error> {
        self.write(addr, data.as_slice())
    }

    /// Validate `[addr, addr + n)` against the range and return the offset into the store.
    fn check_span(&self, addr: Addr, n: usize) -> Result<usize, anyhow::Error> {
        let range = self.range();
        if n == 0 {
            bail!("zero-sized access @ {:#x}", addr);
        }
        if !range.contains_span(addr, n as u64) {
            bail!(
                "access of size {} @ {:#x} falls outside {}",
                n,
                addr,
                range
            );
        }
        Ok((addr - range.start) as usize)
    }
}
