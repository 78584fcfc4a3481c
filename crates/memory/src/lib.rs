//! Global (simulator-side) physical memory used as the target of device DMA.
//!
//! Devices see memory through [`MemoryBus`]. The bus is fallible so a device model can decide
//! how to treat accesses to memory that does not exist; [`DenseMemory`] is the simple contiguous
//! backend used by tests and small hosts.

mod bus;
mod phys;

pub use bus::MemoryBus;
pub use phys::{DenseMemory, GuestMemoryError, GuestMemoryResult};
