//! Decoding of host writes into the device-specific configuration region.

use super::capabilities::{
    CapabilityBlock, CapabilitySpace, MsiCapability, MsiControl, PowerManagementCapability,
};

/// What a decoded capability write changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityWrite {
    PowerManagement { control_status: u16 },
    MsiControl { control: MsiControl },
    MsiAddress { address: u32 },
    MsiData { data: u16 },
}

impl CapabilitySpace {
    /// Applies a host write at the absolute config-space `offset`.
    ///
    /// # Panics
    ///
    /// Panics for any offset/size pair that is not one of the modelled writable registers. The
    /// host is then driving the device outside the protocol it implements.
    pub fn write(&mut self, offset: u16, size: usize, value: u32) -> CapabilityWrite {
        let pmcsr = self.pm.base() + PowerManagementCapability::PMCSR;
        let msi_control = self.msi.base() + MsiCapability::MESSAGE_CONTROL;
        let msi_address = self.msi.base() + MsiCapability::MESSAGE_ADDRESS;
        let msi_data = self.msi.base() + MsiCapability::MESSAGE_DATA;

        if offset == pmcsr && size == 2 {
            self.pm.write_control_status(value as u16);
            CapabilityWrite::PowerManagement {
                control_status: self.pm.control_status().bits(),
            }
        } else if offset == msi_control && size == 2 {
            let control = self.msi.write_message_control(value as u16);
            if control.multi_message_enable() > super::capabilities::MSI_MAX_MME {
                tracing::warn!(
                    "sata_interface: reserved MSI multiple message enable {}, using {} vectors",
                    control.multi_message_enable(),
                    control.vector_count()
                );
            }
            CapabilityWrite::MsiControl { control }
        } else if offset == msi_address && size == 4 {
            CapabilityWrite::MsiAddress {
                address: self.msi.write_message_address(value),
            }
        } else if offset == msi_data && size >= 2 {
            let data = value as u16;
            self.msi.write_message_data(data);
            CapabilityWrite::MsiData { data }
        } else {
            tracing::error!(
                "sata_interface: invalid PCI config write offset: {offset:#x} size: {size}"
            );
            panic!("sata_interface: invalid PCI config write offset: {offset:#x} size: {size}");
        }
    }
}
