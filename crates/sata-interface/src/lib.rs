//! Host-side model of a PCI-attached SATA/AHCI controller interface.
//!
//! The crate models what sits between a host simulator's PCI bus and a storage controller
//! engine: the function's configuration space (type-0 header plus the PM, MSI and SATA
//! capability chain), the register windows placed by the BARs, per-direction DMA timelines
//! costed by a PCIe link model, and INTx/MSI interrupt delivery.
//!
//! [`SataInterface`] is the entry point. The controller engine is supplied by the caller as a
//! [`StorageController`] and reaches DMA and interrupts through [`HostInterface`].

pub mod config;
pub mod device;
pub mod dma;
pub mod host;
pub mod interface;
pub mod interrupt;
pub mod pci;
pub mod pcie;
pub mod windows;

/// Simulated time. One tick is one picosecond.
pub type Tick = u64;

pub use config::{ConfigError, SataInterfaceConfig};
pub use device::{SataInterface, SnapshotError};
pub use dma::{DmaDirection, DmaSlot, DmaTimeline};
pub use host::SataHost;
pub use interface::{HostInterface, NullController, PciFunction, StorageController};
pub use interrupt::{
    InterruptMode, InterruptSignal, InterruptState, IrqLine, LevelIrqLine, MsiMessage,
    INTERRUPT_SOURCES,
};
pub use pcie::{PcieGeneration, PcieLink};
pub use windows::{RegisterWindow, RegisterWindowKind, RegisterWindows, WindowHit};
