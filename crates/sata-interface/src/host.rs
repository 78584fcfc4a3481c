use memory::MemoryBus;

use crate::dma::{DmaDirection, DmaSlot, DmaTimeline};
use crate::interface::HostInterface;
use crate::interrupt::{InterruptSignal, InterruptState, IrqLine};
use crate::pcie::PcieLink;
use crate::Tick;

/// Controller-facing half of the device: DMA timelines, interrupt state and the platform
/// resources they drive.
pub struct SataHost {
    link: PcieLink,
    dma_offset: u64,
    read_timeline: DmaTimeline,
    write_timeline: DmaTimeline,
    interrupts: InterruptState,
    memory: Box<dyn MemoryBus>,
    irq: Box<dyn IrqLine>,
}

impl SataHost {
    pub fn new(
        link: PcieLink,
        dma_offset: u64,
        memory: Box<dyn MemoryBus>,
        irq: Box<dyn IrqLine>,
    ) -> Self {
        Self {
            link,
            dma_offset,
            read_timeline: DmaTimeline::new(),
            write_timeline: DmaTimeline::new(),
            interrupts: InterruptState::new(),
            memory,
            irq,
        }
    }

    pub fn link(&self) -> PcieLink {
        self.link
    }

    pub fn timeline(&self, direction: DmaDirection) -> &DmaTimeline {
        match direction {
            DmaDirection::Read => &self.read_timeline,
            DmaDirection::Write => &self.write_timeline,
        }
    }

    pub fn interrupts(&self) -> &InterruptState {
        &self.interrupts
    }

    pub(crate) fn interrupts_mut(&mut self) -> &mut InterruptState {
        &mut self.interrupts
    }

    pub fn memory_mut(&mut self) -> &mut dyn MemoryBus {
        self.memory.as_mut()
    }

    /// Device-local bus address -> simulator global address.
    ///
    /// # Panics
    ///
    /// Panics if the translated address falls past the end of the global address space.
    pub fn translate(&self, addr: u64) -> u64 {
        let offset = self.dma_offset;
        match offset.checked_add(addr) {
            Some(paddr) => paddr,
            None => {
                tracing::error!(
                    "sata_interface: DMA address {addr:#x} overflows offset {offset:#x}"
                );
                panic!("sata_interface: DMA address {addr:#x} overflows offset {offset:#x}");
            }
        }
    }

    /// Drops all queued channel occupancy and pending pin-mode sources. MSI programming lives in
    /// configuration space and is kept.
    pub fn reset(&mut self) {
        self.read_timeline.reset();
        self.write_timeline.reset();
        self.interrupts.clear_sources();
        self.irq.set_level(false);
    }

    fn schedule(&mut self, direction: DmaDirection, size: u64, tick: &mut Tick) -> DmaSlot {
        let latency = self.link.transfer_latency(size);
        let timeline = match direction {
            DmaDirection::Read => &mut self.read_timeline,
            DmaDirection::Write => &mut self.write_timeline,
        };
        let slot = timeline.schedule(latency, tick);
        tracing::trace!(
            ?direction,
            size,
            begin = slot.begin,
            end = slot.end,
            wait = slot.wait,
            "sata_interface: DMA scheduled"
        );
        slot
    }

    fn check_buffer_len(direction: DmaDirection, size: u64, len: usize) {
        if len as u64 != size {
            tracing::error!(
                "sata_interface: DMA {direction:?} buffer of {len} bytes for a {size} byte transfer"
            );
            panic!(
                "sata_interface: DMA {direction:?} buffer of {len} bytes for a {size} byte transfer"
            );
        }
    }

    fn signal(&mut self, signal: InterruptSignal) {
        match signal {
            InterruptSignal::IntxAssert => self.irq.set_level(true),
            InterruptSignal::IntxDeassert => self.irq.set_level(false),
            InterruptSignal::Msi(message) => {
                let paddr = self.translate(u64::from(message.address));
                if let Err(err) = self.memory.write_u32(paddr, message.data) {
                    tracing::error!("sata_interface: MSI write failed: {err}");
                    panic!("sata_interface: MSI write failed: {err}");
                }
            }
        }
    }
}

impl HostInterface for SataHost {
    fn dma_read(
        &mut self,
        addr: u64,
        size: u64,
        buffer: Option<&mut [u8]>,
        tick: &mut Tick,
    ) -> Tick {
        if let Some(buffer) = buffer {
            Self::check_buffer_len(DmaDirection::Read, size, buffer.len());
            let paddr = self.translate(addr);
            if let Err(err) = self.memory.read_physical(paddr, buffer) {
                tracing::error!("sata_interface: DMA read failed: {err}");
                panic!("sata_interface: DMA read failed: {err}");
            }
        }
        self.schedule(DmaDirection::Read, size, tick).begin
    }

    fn dma_write(
        &mut self,
        addr: u64,
        size: u64,
        buffer: Option<&[u8]>,
        tick: &mut Tick,
    ) -> Tick {
        if let Some(buffer) = buffer {
            Self::check_buffer_len(DmaDirection::Write, size, buffer.len());
            let paddr = self.translate(addr);
            if let Err(err) = self.memory.write_physical(paddr, buffer) {
                tracing::error!("sata_interface: DMA write failed: {err}");
                panic!("sata_interface: DMA write failed: {err}");
            }
        }
        self.schedule(DmaDirection::Write, size, tick).begin
    }

    fn update_interrupt(&mut self, index: u16, post: bool) {
        if let Some(signal) = self.interrupts.update(index, post) {
            self.signal(signal);
        }
    }
}
