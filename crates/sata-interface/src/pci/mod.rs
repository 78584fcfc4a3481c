//! PCI configuration space of the SATA function: the type-0 header and the capability chain.

pub mod capabilities;
pub mod decoder;
pub mod header;

pub use capabilities::{
    CapabilityBlock, CapabilityLayout, CapabilitySpace, MsiCapability, MsiControl,
    PmControlStatus, PowerManagementCapability, SataCapability, PCI_CAP_ID_MSI, PCI_CAP_ID_PM,
    PCI_CAP_ID_SATA, PCI_CONFIG_SPACE_SIZE, PCI_DEVICE_SPECIFIC,
};
pub use decoder::CapabilityWrite;
pub use header::{
    PciBarChange, PciBarDefinition, PciConfigHeader, PciConfigWriteEffects, PciIdentity,
    PCI_BAR_COUNT, SATA_AHCI_9_SERIES, SATA_BAR_LAYOUT,
};
