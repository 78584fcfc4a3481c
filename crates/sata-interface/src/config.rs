//! Construction-time configuration of the SATA interface.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::pci::{CapabilityLayout, PCI_CONFIG_SPACE_SIZE, PCI_DEVICE_SPECIFIC};
use crate::pcie::{PcieGeneration, PcieLink};
use crate::Tick;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("invalid config: {0}")]
    Parse(String),
    #[error("invalid PCIe link width x{0}")]
    InvalidLanes(u8),
    #[error("capability {id:#04x} at {base:#x} does not fit the device-specific region")]
    CapabilityOutOfRange { id: u8, base: u16 },
    #[error("capability {id:#04x} at {base:#x} is not dword aligned")]
    CapabilityMisaligned { id: u8, base: u16 },
    #[error("capabilities {first:#04x} and {second:#04x} overlap")]
    CapabilityOverlap { first: u8, second: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SataInterfaceConfig {
    pub pcie_generation: PcieGeneration,
    pub pcie_lanes: u8,
    /// Cost charged for every configuration-space access, in ticks.
    pub config_latency: Tick,
    /// Added to device-local DMA addresses to reach the simulator's global address space.
    pub dma_offset: u64,
    pub pm_base: u16,
    pub msi_base: u16,
    pub sata_base: u16,
    pub pm_capabilities: u16,
    pub pm_control_status: u16,
    pub msi_message_control: u16,
    pub interrupt_line: u8,
}

impl Default for SataInterfaceConfig {
    fn default() -> Self {
        let layout = CapabilityLayout::default();
        Self {
            pcie_generation: PcieGeneration::Gen2,
            pcie_lanes: 4,
            config_latency: 20_000,
            dma_offset: 0,
            pm_base: layout.pm_base,
            msi_base: layout.msi_base,
            sata_base: layout.sata_base,
            // Version 1.2, no device-specific initialization.
            pm_capabilities: 0x0003,
            // D0, no soft reset.
            pm_control_status: 0x0008,
            msi_message_control: 0x0000,
            interrupt_line: 0x0b,
        }
    }
}

impl SataInterfaceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    /// Checks what can be checked without building the capability space.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PcieLink::VALID_LANES.contains(&self.pcie_lanes) {
            return Err(ConfigError::InvalidLanes(self.pcie_lanes));
        }
        for (id, base) in [
            (crate::pci::PCI_CAP_ID_PM, self.pm_base),
            (crate::pci::PCI_CAP_ID_MSI, self.msi_base),
            (crate::pci::PCI_CAP_ID_SATA, self.sata_base),
        ] {
            if base < PCI_DEVICE_SPECIFIC || usize::from(base) >= PCI_CONFIG_SPACE_SIZE {
                return Err(ConfigError::CapabilityOutOfRange { id, base });
            }
        }
        Ok(())
    }

    pub fn link(&self) -> PcieLink {
        PcieLink::new(self.pcie_generation, self.pcie_lanes)
    }

    pub fn capability_layout(&self) -> CapabilityLayout {
        CapabilityLayout {
            pm_base: self.pm_base,
            msi_base: self.msi_base,
            sata_base: self.sata_base,
        }
    }
}
