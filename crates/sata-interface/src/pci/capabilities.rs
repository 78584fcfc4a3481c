use bitflags::bitflags;

use crate::config::ConfigError;

pub const PCI_CONFIG_SPACE_SIZE: usize = 256;
/// First byte of the device-specific region; everything below is the type-0 header.
pub const PCI_DEVICE_SPECIFIC: u16 = 0x40;
pub const PCI_CAP_PTR_OFFSET: u16 = 0x34;
pub const PCI_STATUS_CAPABILITIES_LIST: u16 = 1 << 4;

pub const PCI_CAP_ID_PM: u8 = 0x01;
pub const PCI_CAP_ID_MSI: u8 = 0x05;
pub const PCI_CAP_ID_SATA: u8 = 0x12;

pub const PM_CAP_LEN: u16 = 0x06;
pub const MSI_CAP_LEN: u16 = 0x0a;
pub const SATA_CAP_LEN: u16 = 0x08;

/// Largest Multiple Message Enable encoding honoured (2^5 = 32 vectors).
pub const MSI_MAX_MME: u16 = 5;

bitflags! {
    /// PMCSR (power management control/status).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PmControlStatus: u16 {
        const POWER_STATE = 0x0003;
        const NO_SOFT_RESET = 0x0008;
        const PME_ENABLE = 0x0100;
        const DATA_SELECT = 0x1e00;
        const DATA_SCALE = 0x6000;
        const PME_STATUS = 0x8000;

        const WRITABLE = Self::POWER_STATE.bits()
            | Self::PME_ENABLE.bits()
            | Self::DATA_SELECT.bits();
    }
}

bitflags! {
    /// MSI message control.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MsiControl: u16 {
        const ENABLE = 0x0001;
        const MULTI_MESSAGE_CAPABLE = 0x000e;
        const MULTI_MESSAGE_ENABLE = 0x0070;
        const ADDRESS_64 = 0x0080;

        const WRITABLE = Self::ENABLE.bits() | Self::MULTI_MESSAGE_ENABLE.bits();
    }
}

impl MsiControl {
    /// Raw Multiple Message Enable field.
    pub fn multi_message_enable(self) -> u16 {
        (self.bits() & Self::MULTI_MESSAGE_ENABLE.bits()) >> 4
    }

    /// Number of vectors the host enabled, clamped to what MSI can address.
    pub fn vector_count(self) -> u16 {
        1 << self.multi_message_enable().min(MSI_MAX_MME)
    }
}

/// A fixed-layout capability structure living at `base` in configuration space.
pub trait CapabilityBlock {
    fn base(&self) -> u16;
    fn bytes(&self) -> &[u8];

    fn id(&self) -> u8 {
        self.bytes()[0]
    }

    fn next(&self) -> u8 {
        self.bytes()[1]
    }

    fn len(&self) -> u16 {
        self.bytes().len() as u16
    }

    fn contains(&self, offset: u16) -> bool {
        (self.base()..self.base() + self.len()).contains(&offset)
    }

    fn byte_at(&self, offset: u16) -> Option<u8> {
        self.contains(offset)
            .then(|| self.bytes()[usize::from(offset - self.base())])
    }
}

fn read_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

fn read_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

/// PCI power management capability (PMCAP).
#[derive(Debug, Clone)]
pub struct PowerManagementCapability {
    base: u16,
    data: [u8; PM_CAP_LEN as usize],
}

impl PowerManagementCapability {
    pub const PMC: u16 = 0x02;
    pub const PMCSR: u16 = 0x04;

    pub fn new(base: u16, capabilities: u16, control_status: u16) -> Self {
        let mut data = [0u8; PM_CAP_LEN as usize];
        data[0] = PCI_CAP_ID_PM;
        data[2..4].copy_from_slice(&capabilities.to_le_bytes());
        data[4..6].copy_from_slice(&control_status.to_le_bytes());
        Self { base, data }
    }

    pub fn capabilities(&self) -> u16 {
        read_u16(&self.data, Self::PMC as usize)
    }

    pub fn control_status(&self) -> PmControlStatus {
        PmControlStatus::from_bits_retain(read_u16(&self.data, Self::PMCSR as usize))
    }

    /// Applies a host write to PMCSR: PME status is write-one-to-clear, then only the writable
    /// control bits are taken from `value`.
    pub fn write_control_status(&mut self, value: u16) {
        let value = PmControlStatus::from_bits_retain(value);
        let mut pmcs = self.control_status();
        if value.contains(PmControlStatus::PME_STATUS) {
            pmcs.remove(PmControlStatus::PME_STATUS);
        }
        pmcs = pmcs.difference(PmControlStatus::WRITABLE)
            | value.intersection(PmControlStatus::WRITABLE);
        self.data[4..6].copy_from_slice(&pmcs.bits().to_le_bytes());
    }

    /// Latches PME status. Only the device side can set this bit.
    pub fn set_pme_status(&mut self) {
        let pmcs = self.control_status() | PmControlStatus::PME_STATUS;
        self.data[4..6].copy_from_slice(&pmcs.bits().to_le_bytes());
    }

    fn set_next(&mut self, next: u8) {
        self.data[1] = next;
    }
}

impl CapabilityBlock for PowerManagementCapability {
    fn base(&self) -> u16 {
        self.base
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// 32-bit MSI capability without per-vector masking.
#[derive(Debug, Clone)]
pub struct MsiCapability {
    base: u16,
    data: [u8; MSI_CAP_LEN as usize],
}

impl MsiCapability {
    pub const MESSAGE_CONTROL: u16 = 0x02;
    pub const MESSAGE_ADDRESS: u16 = 0x04;
    pub const MESSAGE_DATA: u16 = 0x08;

    pub fn new(base: u16, message_control: u16) -> Self {
        let mut data = [0u8; MSI_CAP_LEN as usize];
        data[0] = PCI_CAP_ID_MSI;
        // The 64-bit address layout is not implemented; never advertise it.
        let control = message_control & !MsiControl::ADDRESS_64.bits();
        data[2..4].copy_from_slice(&control.to_le_bytes());
        Self { base, data }
    }

    pub fn message_control(&self) -> MsiControl {
        MsiControl::from_bits_retain(read_u16(&self.data, Self::MESSAGE_CONTROL as usize))
    }

    pub fn message_address(&self) -> u32 {
        read_u32(&self.data, Self::MESSAGE_ADDRESS as usize)
    }

    pub fn message_data(&self) -> u16 {
        read_u16(&self.data, Self::MESSAGE_DATA as usize)
    }

    pub fn enabled(&self) -> bool {
        self.message_control().contains(MsiControl::ENABLE)
    }

    /// Merges the writable message-control bits from `value` and returns the new control word.
    pub fn write_message_control(&mut self, value: u16) -> MsiControl {
        let value = MsiControl::from_bits_retain(value);
        let control = self.message_control().difference(MsiControl::WRITABLE)
            | value.intersection(MsiControl::WRITABLE);
        self.data[2..4].copy_from_slice(&control.bits().to_le_bytes());
        control
    }

    /// Stores the message address; MSI targets are dword aligned.
    pub fn write_message_address(&mut self, value: u32) -> u32 {
        let address = value & !0x3;
        self.data[4..8].copy_from_slice(&address.to_le_bytes());
        address
    }

    pub fn write_message_data(&mut self, value: u16) {
        self.data[8..10].copy_from_slice(&value.to_le_bytes());
    }

    fn set_next(&mut self, next: u8) {
        self.data[1] = next;
    }
}

impl CapabilityBlock for MsiCapability {
    fn base(&self) -> u16 {
        self.base
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Serial ATA capability: points the host at the index/data pair inside a BAR.
#[derive(Debug, Clone)]
pub struct SataCapability {
    base: u16,
    data: [u8; SATA_CAP_LEN as usize],
}

impl SataCapability {
    pub const REVISION_1_0: u8 = 0x10;
    /// BARLOC = BAR4 (config offset 0x20), BAROFST = 4 dwords.
    pub const DEFAULT_BAR_LOCATION: u32 = 0x0000_0048;

    pub fn new(base: u16, revision: u8, bar_location: u32) -> Self {
        let mut data = [0u8; SATA_CAP_LEN as usize];
        data[0] = PCI_CAP_ID_SATA;
        data[2] = revision;
        data[4..8].copy_from_slice(&bar_location.to_le_bytes());
        Self { base, data }
    }

    pub fn revision(&self) -> u8 {
        self.data[2]
    }

    /// Index of the BAR holding the index/data pair, if BARLOC names a BAR.
    pub fn bar_index(&self) -> Option<u8> {
        let loc = (read_u32(&self.data, 4) & 0xf) as u8;
        (0x4..=0x9).contains(&loc).then(|| loc - 0x4)
    }

    /// Byte offset of the index/data pair inside that BAR.
    pub fn bar_offset(&self) -> u32 {
        ((read_u32(&self.data, 4) >> 4) & 0xf_ffff) * 4
    }
}

impl CapabilityBlock for SataCapability {
    fn base(&self) -> u16 {
        self.base
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Where each capability lives in configuration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityLayout {
    pub pm_base: u16,
    pub msi_base: u16,
    pub sata_base: u16,
}

impl Default for CapabilityLayout {
    fn default() -> Self {
        Self {
            pm_base: 0x70,
            msi_base: 0x80,
            sata_base: 0xa8,
        }
    }
}

/// The device's capability blocks, chained MSI -> PM -> SATA.
#[derive(Debug, Clone)]
pub struct CapabilitySpace {
    pub(crate) pm: PowerManagementCapability,
    pub(crate) msi: MsiCapability,
    pub(crate) sata: SataCapability,
}

impl CapabilitySpace {
    pub fn new(
        layout: CapabilityLayout,
        pm_capabilities: u16,
        pm_control_status: u16,
        msi_message_control: u16,
    ) -> Result<Self, ConfigError> {
        let mut caps = Self {
            pm: PowerManagementCapability::new(layout.pm_base, pm_capabilities, pm_control_status),
            msi: MsiCapability::new(layout.msi_base, msi_message_control),
            sata: SataCapability::new(
                layout.sata_base,
                SataCapability::REVISION_1_0,
                SataCapability::DEFAULT_BAR_LOCATION,
            ),
        };
        caps.validate()?;

        // Bases were validated to fit in a byte.
        caps.msi.set_next(layout.pm_base as u8);
        caps.pm.set_next(layout.sata_base as u8);
        Ok(caps)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let blocks = self.blocks();
        for block in blocks {
            let base = block.base();
            let end = usize::from(base) + usize::from(block.len());
            if base < PCI_DEVICE_SPECIFIC || end > PCI_CONFIG_SPACE_SIZE {
                return Err(ConfigError::CapabilityOutOfRange { id: block.id(), base });
            }
            if base % 4 != 0 {
                return Err(ConfigError::CapabilityMisaligned { id: block.id(), base });
            }
        }
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                let a_end = a.base() + a.len();
                let b_end = b.base() + b.len();
                if a.base() < b_end && b.base() < a_end {
                    return Err(ConfigError::CapabilityOverlap {
                        first: a.id(),
                        second: b.id(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Offset the header's capability pointer must report.
    pub fn first(&self) -> u8 {
        self.msi.base() as u8
    }

    pub fn blocks(&self) -> [&dyn CapabilityBlock; 3] {
        [&self.pm, &self.msi, &self.sata]
    }

    pub fn power_management(&self) -> &PowerManagementCapability {
        &self.pm
    }

    pub fn msi(&self) -> &MsiCapability {
        &self.msi
    }

    pub fn sata(&self) -> &SataCapability {
        &self.sata
    }

    fn byte_at(&self, offset: u16) -> Option<u8> {
        self.blocks().iter().find_map(|block| block.byte_at(offset))
    }

    /// Reads `size` bytes starting at the absolute config-space `offset`.
    ///
    /// Bytes outside every block read as zero and are reported; the access itself never fails.
    pub fn read(&self, offset: u16, size: usize) -> u32 {
        if !matches!(size, 1 | 2 | 4) {
            tracing::warn!("sata_interface: invalid PCI config read size: {size}");
            return 0;
        }

        let mut value = 0u32;
        for i in 0..size {
            let addr = offset.wrapping_add(i as u16);
            match self.byte_at(addr) {
                Some(byte) => value |= u32::from(byte) << (i * 8),
                None => tracing::warn!("sata_interface: invalid PCI config read offset: {addr:#x}"),
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_caps() -> CapabilitySpace {
        CapabilitySpace::new(CapabilityLayout::default(), 0x0003, 0x0008, 0x0000).unwrap()
    }

    #[test]
    fn chain_links_msi_pm_sata() {
        let caps = default_caps();
        assert_eq!(caps.first(), 0x80);

        let mut seen = Vec::new();
        let mut next = caps.first();
        while next != 0 {
            let id = caps.read(u16::from(next), 1) as u8;
            seen.push(id);
            next = caps.read(u16::from(next) + 1, 1) as u8;
        }
        assert_eq!(seen, [PCI_CAP_ID_MSI, PCI_CAP_ID_PM, PCI_CAP_ID_SATA]);
    }

    #[test]
    fn sata_capability_fields() {
        let caps = default_caps();
        assert_eq!(caps.read(0xa8, 1), 0x12);
        assert_eq!(caps.read(0xaa, 1), 0x10);
        assert_eq!(caps.read(0xac, 4), 0x48);
        assert_eq!(caps.sata().bar_index(), Some(4));
        assert_eq!(caps.sata().bar_offset(), 0x10);
    }

    #[test]
    fn read_straddling_a_block_zero_fills_the_gap() {
        let caps = default_caps();
        // 0x76..0x77 is past the end of PMCAP; 0x74..0x75 is PMCSR.
        assert_eq!(caps.read(0x74, 4), 0x0000_0008);
        assert_eq!(caps.read(0x76, 2), 0);
    }

    #[test]
    fn unsupported_read_size_reads_zero() {
        let caps = default_caps();
        assert_eq!(caps.read(0xa8, 3), 0);
        assert_eq!(caps.read(0xa8, 8), 0);
    }

    #[test]
    fn pmcsr_write_masks_and_clears_pme_status() {
        let mut caps = default_caps();
        caps.pm.set_pme_status();
        assert!(caps.pm.control_status().contains(PmControlStatus::PME_STATUS));

        // PME status W1C, D3hot requested, read-only data scale and no-soft-reset ignored.
        caps.pm.write_control_status(0x8000 | 0x6000 | 0x0003);
        let pmcs = caps.pm.control_status();
        assert!(!pmcs.contains(PmControlStatus::PME_STATUS));
        assert_eq!(pmcs.bits(), 0x0008 | 0x0003);

        // Writing zero to PME status leaves it latched.
        caps.pm.set_pme_status();
        caps.pm.write_control_status(0x0100);
        assert_eq!(caps.pm.control_status().bits(), 0x8000 | 0x0100 | 0x0008);
    }

    #[test]
    fn msi_control_keeps_read_only_bits() {
        let mut caps = CapabilitySpace::new(CapabilityLayout::default(), 3, 8, 0x000a).unwrap();
        let control = caps.msi.write_message_control(0xffff);
        assert_eq!(control.bits(), 0x000a | 0x0071);
        assert_eq!(control.vector_count(), 32);
    }

    #[test]
    fn msi_vector_count_is_clamped() {
        assert_eq!(MsiControl::from_bits_retain(0x0000).vector_count(), 1);
        assert_eq!(MsiControl::from_bits_retain(0x0020).vector_count(), 4);
        assert_eq!(MsiControl::from_bits_retain(0x0050).vector_count(), 32);
        assert_eq!(MsiControl::from_bits_retain(0x0070).vector_count(), 32);
    }

    #[test]
    fn overlapping_blocks_are_rejected() {
        let layout = CapabilityLayout {
            pm_base: 0x80,
            msi_base: 0x84,
            sata_base: 0xa8,
        };
        let err = CapabilitySpace::new(layout, 3, 8, 0).unwrap_err();
        assert_eq!(
            err,
            ConfigError::CapabilityOverlap {
                first: PCI_CAP_ID_PM,
                second: PCI_CAP_ID_MSI
            }
        );
    }

    #[test]
    fn blocks_must_sit_in_the_device_specific_region() {
        let layout = CapabilityLayout {
            pm_base: 0x30,
            ..CapabilityLayout::default()
        };
        assert!(matches!(
            CapabilitySpace::new(layout, 3, 8, 0),
            Err(ConfigError::CapabilityOutOfRange { id: PCI_CAP_ID_PM, base: 0x30 })
        ));

        let layout = CapabilityLayout {
            sata_base: 0xfc,
            ..CapabilityLayout::default()
        };
        assert!(matches!(
            CapabilitySpace::new(layout, 3, 8, 0),
            Err(ConfigError::CapabilityOutOfRange { id: PCI_CAP_ID_SATA, .. })
        ));
    }
}
