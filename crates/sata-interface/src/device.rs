//! PCI function wrapper tying configuration space, register windows and the host seam together.

use memory::MemoryBus;

use crate::config::{ConfigError, SataInterfaceConfig};
use crate::dma::{DmaDirection, DmaTimeline};
use crate::host::SataHost;
use crate::interface::{HostInterface, PciFunction, StorageController};
use crate::interrupt::{InterruptState, IrqLine};
use crate::pci::{
    CapabilitySpace, CapabilityWrite, PciBarChange, PciConfigHeader, PCI_DEVICE_SPECIFIC,
};
use crate::windows::RegisterWindows;
use crate::Tick;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("device state snapshots are not supported")]
    Unsupported,
}

/// A PCI-attached SATA interface in front of a [`StorageController`].
///
/// Configuration accesses are answered here and cost `config_latency` each. Register accesses
/// are routed to a window and handed to the controller, which calls back through the
/// [`HostInterface`] half for DMA and interrupts.
pub struct SataInterface<C> {
    config_latency: Tick,
    header: PciConfigHeader,
    capabilities: CapabilitySpace,
    windows: RegisterWindows,
    host: SataHost,
    controller: C,
}

impl<C: StorageController> SataInterface<C> {
    pub fn new(
        config: SataInterfaceConfig,
        memory: Box<dyn MemoryBus>,
        irq: Box<dyn IrqLine>,
        controller: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let capabilities = CapabilitySpace::new(
            config.capability_layout(),
            config.pm_capabilities,
            config.pm_control_status,
            config.msi_message_control,
        )?;

        let mut header = PciConfigHeader::default();
        header.write_with_effects(
            PciConfigHeader::INTERRUPT_LINE_OFFSET,
            1,
            u32::from(config.interrupt_line),
        );
        header.set_capability_pointer(capabilities.first());

        let mut host = SataHost::new(config.link(), config.dma_offset, memory, irq);
        let msi = capabilities.msi();
        host.interrupts_mut().set_message_address(msi.message_address());
        host.interrupts_mut().set_message_data(msi.message_data());
        host.interrupts_mut().set_message_control(msi.message_control());

        Ok(Self {
            config_latency: config.config_latency,
            header,
            capabilities,
            windows: RegisterWindows::new(),
            host,
            controller,
        })
    }

    pub fn header(&self) -> &PciConfigHeader {
        &self.header
    }

    pub fn capabilities(&self) -> &CapabilitySpace {
        &self.capabilities
    }

    pub fn windows(&self) -> &RegisterWindows {
        &self.windows
    }

    pub fn host(&self) -> &SataHost {
        &self.host
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn interrupts(&self) -> &InterruptState {
        self.host.interrupts()
    }

    pub fn timeline(&self, direction: DmaDirection) -> &DmaTimeline {
        self.host.timeline(direction)
    }

    pub fn memory_mut(&mut self) -> &mut dyn MemoryBus {
        self.host.memory_mut()
    }

    /// Device reset: drains DMA occupancy and drops pending interrupt sources. Configuration
    /// space and window assignments are untouched.
    pub fn reset(&mut self) {
        self.host.reset();
    }

    pub fn save_state(&self) -> Result<Vec<u8>, SnapshotError> {
        Err(SnapshotError::Unsupported)
    }

    pub fn load_state(&mut self, _bytes: &[u8]) -> Result<(), SnapshotError> {
        Err(SnapshotError::Unsupported)
    }

    fn read_config_byte(&self, offset: u16) -> u8 {
        if offset < PCI_DEVICE_SPECIFIC {
            self.header.read(offset, 1) as u8
        } else {
            self.capabilities.read(offset, 1) as u8
        }
    }

    fn apply_capability_write(&mut self, write: CapabilityWrite) {
        let interrupts = self.host.interrupts_mut();
        match write {
            CapabilityWrite::PowerManagement { control_status } => {
                tracing::debug!("sata_interface: PMCSR <- {control_status:#06x}");
            }
            CapabilityWrite::MsiControl { control } => interrupts.set_message_control(control),
            CapabilityWrite::MsiAddress { address } => interrupts.set_message_address(address),
            CapabilityWrite::MsiData { data } => interrupts.set_message_data(data),
        }
    }
}

impl<C: StorageController> PciFunction for SataInterface<C> {
    fn config_read(&mut self, offset: u16, size: usize) -> (u32, Tick) {
        let offset = offset & 0xff;
        if !matches!(size, 1 | 2 | 4) {
            tracing::warn!("sata_interface: invalid PCI config read size: {size}");
            return (0, self.config_latency);
        }

        let end = usize::from(offset) + size;
        let value = if end <= usize::from(PCI_DEVICE_SPECIFIC) {
            self.header.read(offset, size)
        } else if offset >= PCI_DEVICE_SPECIFIC {
            self.capabilities.read(offset, size)
        } else {
            // Straddles the end of the header.
            (0..size).fold(0u32, |value, i| {
                let byte = self.read_config_byte(offset + i as u16);
                value | (u32::from(byte) << (8 * i))
            })
        };
        (value, self.config_latency)
    }

    fn config_write(&mut self, offset: u16, size: usize, value: u32) -> Tick {
        let offset = offset & 0xff;
        let end = usize::from(offset) + size;

        if offset >= PCI_DEVICE_SPECIFIC {
            let write = self.capabilities.write(offset, size, value);
            self.apply_capability_write(write);
        } else if matches!(size, 1 | 2 | 4) && end <= usize::from(PCI_DEVICE_SPECIFIC) {
            let effects = self.header.write_with_effects(offset, size, value);
            if let Some((bar, PciBarChange::Changed { new, .. })) = effects.bar {
                self.windows.assign_bar(bar, u64::from(new));
            }
        } else {
            tracing::error!(
                "sata_interface: invalid PCI config write offset: {offset:#x} size: {size}"
            );
            panic!("sata_interface: invalid PCI config write offset: {offset:#x} size: {size}");
        }
        self.config_latency
    }

    fn mmio_read(&mut self, addr: u64, data: &mut [u8]) -> Tick {
        let hit = self.windows.route(addr, data.len() as u64);
        self.controller.read_register(hit.kind, hit.offset, data, &mut self.host)
    }

    fn mmio_write(&mut self, addr: u64, data: &[u8]) -> Tick {
        let hit = self.windows.route(addr, data.len() as u64);
        self.controller.write_register(hit.kind, hit.offset, data, &mut self.host)
    }
}

impl<C> HostInterface for SataInterface<C> {
    fn dma_read(
        &mut self,
        addr: u64,
        size: u64,
        buffer: Option<&mut [u8]>,
        tick: &mut Tick,
    ) -> Tick {
        self.host.dma_read(addr, size, buffer, tick)
    }

    fn dma_write(
        &mut self,
        addr: u64,
        size: u64,
        buffer: Option<&[u8]>,
        tick: &mut Tick,
    ) -> Tick {
        self.host.dma_write(addr, size, buffer, tick)
    }

    fn update_interrupt(&mut self, index: u16, post: bool) {
        self.host.update_interrupt(index, post);
    }
}
