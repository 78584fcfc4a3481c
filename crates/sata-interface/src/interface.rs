//! The two surfaces of the device and the external controller seam.
//!
//! [`PciFunction`] is what the host simulator calls: configuration-space and register accesses,
//! each returning the simulated time it took. [`HostInterface`] is what the storage controller
//! calls back into: scheduled DMA and interrupt requests. The controller itself implements
//! [`StorageController`] and only ever sees register accesses already routed to a window.

use crate::windows::RegisterWindowKind;
use crate::Tick;

pub trait PciFunction {
    /// Reads `size` bytes of configuration space at `offset`.
    fn config_read(&mut self, offset: u16, size: usize) -> (u32, Tick);
    fn config_write(&mut self, offset: u16, size: usize, value: u32) -> Tick;

    /// Reads `data.len()` bytes from the register window containing `addr`.
    fn mmio_read(&mut self, addr: u64, data: &mut [u8]) -> Tick;
    fn mmio_write(&mut self, addr: u64, data: &[u8]) -> Tick;
}

pub trait HostInterface {
    /// Schedules a memory -> device transfer of `size` bytes at device-local `addr`.
    ///
    /// `buffer` receives the data; `None` schedules timing only. `tick` is the earliest issue
    /// time (zero: as soon as the channel is free) and is updated to the completion time. The
    /// return value is the time the transfer is issued on the link.
    fn dma_read(
        &mut self,
        addr: u64,
        size: u64,
        buffer: Option<&mut [u8]>,
        tick: &mut Tick,
    ) -> Tick;

    /// Schedules a device -> memory transfer. Same conventions as [`HostInterface::dma_read`].
    fn dma_write(
        &mut self,
        addr: u64,
        size: u64,
        buffer: Option<&[u8]>,
        tick: &mut Tick,
    ) -> Tick;

    /// Posts (`post == true`) or clears interrupt source `index`.
    fn update_interrupt(&mut self, index: u16, post: bool);
}

/// The command-processing engine behind the register windows.
pub trait StorageController {
    fn read_register(
        &mut self,
        window: RegisterWindowKind,
        offset: u64,
        data: &mut [u8],
        host: &mut dyn HostInterface,
    ) -> Tick;

    fn write_register(
        &mut self,
        window: RegisterWindowKind,
        offset: u64,
        data: &[u8],
        host: &mut dyn HostInterface,
    ) -> Tick;
}

/// A controller with no registers: reads return zeros, writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullController;

impl StorageController for NullController {
    fn read_register(
        &mut self,
        _window: RegisterWindowKind,
        _offset: u64,
        data: &mut [u8],
        _host: &mut dyn HostInterface,
    ) -> Tick {
        data.fill(0);
        0
    }

    fn write_register(
        &mut self,
        _window: RegisterWindowKind,
        _offset: u64,
        _data: &[u8],
        _host: &mut dyn HostInterface,
    ) -> Tick {
        0
    }
}
