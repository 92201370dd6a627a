use crate::base::mem::HasMemory;
use crate::base::packet::AddrRange;

/// Flat byte buffer covering exactly one address range.  Scratchpads are small, so the whole
/// range is allocated up front and zero-filled.
#[derive(Debug, Clone)]
pub struct FlatMemory {
    range: AddrRange,
    bytes: Vec<u8>,
}

impl HasMemory for FlatMemory {
    fn range(&self) -> AddrRange {
        self.range
    }

    fn read_impl(&self, offset: usize, n: usize) -> Result<&[u8], anyhow::Error> {
        Ok(&self.bytes[offset..offset + n])
    }

    fn write_impl(&mut self, offset: usize, data: &[u8]) -> Result<(), anyhow::Error> {
        let bytes = &mut self.bytes[offset..offset + data.len()];
        bytes.copy_from_slice(data);
        Ok(())
    }
}

impl FlatMemory {
    pub fn new(range: AddrRange) -> Self {
        let bytes = vec![0u8; range.size as usize];
        Self { range, bytes }
    }

    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_written_bytes() {
        let mut mem = FlatMemory::new(AddrRange::new(0x1000, 64));
        mem.write(0x1004, &[9, 8, 7]).unwrap();
        assert_eq!(&[0u8, 9, 8, 7, 0], mem.read(0x1003, 5).unwrap());
        assert_eq!([9u8, 8], mem.read_n::<2>(0x1004).unwrap());
    }

    #[test]
    fn out_of_range_accesses_are_errors() {
        let mut mem = FlatMemory::new(AddrRange::new(0x1000, 64));
        assert!(mem.read(0xFFF, 4).is_err());
        assert!(mem.read(0x103E, 4).is_err());
        assert!(mem.write_n(0x1040, [1u8]).is_err());
        let err = mem.read(0x2000, 4).unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn zero_sized_access_is_rejected() {
        let mem = FlatMemory::new(AddrRange::new(0, 16));
        assert!(mem.read(0, 0).is_err());
    }

    #[test]
    fn reset_clears_contents() {
        let mut mem = FlatMemory::new(AddrRange::new(0, 16));
        mem.write(0, &[1, 2, 3, 4]).unwrap();
        mem.reset();
        assert_eq!(&[0u8, 0, 0, 0], mem.read(0, 4).unwrap());
    }
}
