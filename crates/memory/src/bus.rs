use crate::phys::GuestMemoryResult;

/// Abstraction for physical memory access performed on behalf of a device.
///
/// Addresses are already in the simulator's global address space; translating device-local bus
/// addresses is the caller's job.
pub trait MemoryBus {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) -> GuestMemoryResult<()>;
    fn write_physical(&mut self, paddr: u64, buf: &[u8]) -> GuestMemoryResult<()>;

    fn read_u8(&mut self, paddr: u64) -> GuestMemoryResult<u8> {
        let mut buf = [0u8; 1];
        self.read_physical(paddr, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, paddr: u64) -> GuestMemoryResult<u16> {
        let mut buf = [0u8; 2];
        self.read_physical(paddr, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self, paddr: u64) -> GuestMemoryResult<u32> {
        let mut buf = [0u8; 4];
        self.read_physical(paddr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_u8(&mut self, paddr: u64, val: u8) -> GuestMemoryResult<()> {
        self.write_physical(paddr, &[val])
    }

    fn write_u16(&mut self, paddr: u64, val: u16) -> GuestMemoryResult<()> {
        self.write_physical(paddr, &val.to_le_bytes())
    }

    fn write_u32(&mut self, paddr: u64, val: u32) -> GuestMemoryResult<()> {
        self.write_physical(paddr, &val.to_le_bytes())
    }
}

// Lets a `Box<dyn MemoryBus>` be passed wherever a bus is expected.
impl<T: MemoryBus + ?Sized> MemoryBus for Box<T> {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) -> GuestMemoryResult<()> {
        (**self).read_physical(paddr, buf)
    }

    fn write_physical(&mut self, paddr: u64, buf: &[u8]) -> GuestMemoryResult<()> {
        (**self).write_physical(paddr, buf)
    }
}
