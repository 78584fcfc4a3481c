use crate::bus::MemoryBus;

/// Errors returned by [`MemoryBus`] backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuestMemoryError {
    /// The requested address range is outside the backing memory.
    #[error("guest memory access out of range: paddr=0x{paddr:x} len={len} size=0x{size:x}")]
    OutOfRange { paddr: u64, len: usize, size: u64 },
    /// The requested size cannot be represented by the current platform's `usize`.
    #[error("guest memory size {size} does not fit in usize")]
    SizeTooLarge { size: u64 },
}

pub type GuestMemoryResult<T> = Result<T, GuestMemoryError>;

/// Dense (contiguous) memory starting at physical address 0.
#[derive(Debug, Clone)]
pub struct DenseMemory {
    data: Box<[u8]>,
}

impl DenseMemory {
    pub fn new(size: u64) -> GuestMemoryResult<Self> {
        let size_usize =
            usize::try_from(size).map_err(|_| GuestMemoryError::SizeTooLarge { size })?;
        Ok(Self {
            data: vec![0u8; size_usize].into_boxed_slice(),
        })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, paddr: u64, len: usize) -> GuestMemoryResult<(usize, usize)> {
        let out_of_range = GuestMemoryError::OutOfRange {
            paddr,
            len,
            size: self.size(),
        };
        let end = match paddr.checked_add(len as u64) {
            Some(end) if end <= self.size() => end,
            _ => return Err(out_of_range),
        };
        // `end <= size` and `size` came from a `usize`, so both casts are lossless.
        Ok((paddr as usize, end as usize))
    }
}

impl MemoryBus for DenseMemory {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) -> GuestMemoryResult<()> {
        let (start, end) = self.range(paddr, buf.len())?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write_physical(&mut self, paddr: u64, buf: &[u8]) -> GuestMemoryResult<()> {
        let (start, end) = self.range(paddr, buf.len())?;
        self.data[start..end].copy_from_slice(buf);
        Ok(())
    }
}
