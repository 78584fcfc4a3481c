use super::capabilities::{PCI_CAP_PTR_OFFSET, PCI_DEVICE_SPECIFIC, PCI_STATUS_CAPABILITIES_LIST};

pub const PCI_HEADER_SIZE: usize = PCI_DEVICE_SPECIFIC as usize;
pub const PCI_BAR_COUNT: usize = 6;

const PCI_STATUS_OFFSET: usize = 0x06;
const PCI_BAR0_OFFSET: usize = 0x10;
const PCI_BAR5_END: usize = 0x27;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PciBarDefinition {
    Io { size: u32 },
    Mmio32 { size: u32, prefetchable: bool },
}

impl PciBarDefinition {
    pub fn size(&self) -> u32 {
        match self {
            Self::Io { size } | Self::Mmio32 { size, .. } => *size,
        }
    }

    fn flag_bits(&self) -> u32 {
        match self {
            Self::Io { .. } => 0x1,
            Self::Mmio32 { prefetchable, .. } => u32::from(*prefetchable) << 3,
        }
    }

    fn address_mask(&self) -> u32 {
        let low = match self {
            Self::Io { .. } => 0x3,
            Self::Mmio32 { .. } => 0xf,
        };
        !(self.size() - 1) & !low
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PciBarChange {
    Unchanged,
    Changed { old: u32, new: u32 },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct PciConfigWriteEffects {
    pub bar: Option<(u8, PciBarChange)>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PciBarState {
    def: Option<PciBarDefinition>,
    base: u32,
    probe: bool,
}

/// Guest-visible identity of the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciIdentity {
    pub vendor_id: u16,
    pub device_id: u16,
    pub status: u16,
    pub revision_id: u8,
    pub prog_if: u8,
    pub subclass: u8,
    pub class: u8,
    pub subsystem_vendor_id: u16,
    pub subsystem_id: u16,
    pub interrupt_line: u8,
    pub interrupt_pin: u8,
}

/// Intel 9 Series PCH SATA controller in AHCI mode.
pub const SATA_AHCI_9_SERIES: PciIdentity = PciIdentity {
    vendor_id: 0x8086,
    device_id: 0x8c80,
    status: 0x02b0,
    revision_id: 0x00,
    prog_if: 0x01,
    subclass: 0x06,
    class: 0x01,
    subsystem_vendor_id: 0x0000,
    subsystem_id: 0x0000,
    interrupt_line: 0x0b,
    interrupt_pin: 0x02,
};

/// BAR layout of the controller: primary/secondary command and control blocks, the legacy bus
/// master block (with the index/data pair in its upper half) and the AHCI register file.
pub const SATA_BAR_LAYOUT: [PciBarDefinition; PCI_BAR_COUNT] = [
    PciBarDefinition::Io { size: 8 },
    PciBarDefinition::Io { size: 4 },
    PciBarDefinition::Io { size: 8 },
    PciBarDefinition::Io { size: 4 },
    PciBarDefinition::Io { size: 32 },
    PciBarDefinition::Mmio32 {
        size: 1024,
        prefetchable: false,
    },
];

/// The 64-byte type-0 header in front of the capability region.
///
/// Supports BAR size probing (write `0xFFFF_FFFF`, read back the size mask) and reports which
/// BAR a write re-based so the device can move its register windows.
#[derive(Debug, Clone)]
pub struct PciConfigHeader {
    bytes: [u8; PCI_HEADER_SIZE],
    bars: [PciBarState; PCI_BAR_COUNT],
}

impl PciConfigHeader {
    pub const INTERRUPT_LINE_OFFSET: u16 = 0x3c;
    pub const INTERRUPT_PIN_OFFSET: u16 = 0x3d;
    pub const HEADER_TYPE_OFFSET: u16 = 0x0e;

    pub fn new(identity: PciIdentity) -> Self {
        let mut bytes = [0u8; PCI_HEADER_SIZE];
        bytes[0x00..0x02].copy_from_slice(&identity.vendor_id.to_le_bytes());
        bytes[0x02..0x04].copy_from_slice(&identity.device_id.to_le_bytes());
        bytes[0x06..0x08].copy_from_slice(&identity.status.to_le_bytes());
        bytes[0x08] = identity.revision_id;
        bytes[0x09] = identity.prog_if;
        bytes[0x0a] = identity.subclass;
        bytes[0x0b] = identity.class;
        bytes[0x2c..0x2e].copy_from_slice(&identity.subsystem_vendor_id.to_le_bytes());
        bytes[0x2e..0x30].copy_from_slice(&identity.subsystem_id.to_le_bytes());
        bytes[usize::from(Self::INTERRUPT_LINE_OFFSET)] = identity.interrupt_line;
        bytes[usize::from(Self::INTERRUPT_PIN_OFFSET)] = identity.interrupt_pin;

        Self {
            bytes,
            bars: [PciBarState::default(); PCI_BAR_COUNT],
        }
    }

    pub fn vendor_id(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0x00], self.bytes[0x01]])
    }

    pub fn device_id(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0x02], self.bytes[0x03]])
    }

    pub fn command(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0x04], self.bytes[0x05]])
    }

    pub fn status(&self) -> u16 {
        u16::from_le_bytes([
            self.bytes[PCI_STATUS_OFFSET],
            self.bytes[PCI_STATUS_OFFSET + 1],
        ])
    }

    pub fn set_bar_definition(&mut self, index: u8, def: PciBarDefinition) {
        let index = usize::from(index);
        assert!(index < PCI_BAR_COUNT);
        match def {
            PciBarDefinition::Io { size } => {
                assert!(size.is_power_of_two(), "PCI I/O BAR size must be a power of two");
                assert!(size >= 4, "PCI I/O BAR size must be at least 4 bytes");
            }
            PciBarDefinition::Mmio32 { size, .. } => {
                assert!(size.is_power_of_two(), "PCI MMIO32 BAR size must be a power of two");
                assert!(size >= 0x10, "PCI MMIO BAR size must be at least 16 bytes");
            }
        }
        self.bars[index] = PciBarState {
            def: Some(def),
            base: 0,
            probe: false,
        };
    }

    pub fn bar_definition(&self, index: u8) -> Option<PciBarDefinition> {
        self.bars.get(usize::from(index)).and_then(|bar| bar.def)
    }

    /// Currently decoded base of BAR `index`; zero while unassigned.
    pub fn bar_base(&self, index: u8) -> u32 {
        self.bars.get(usize::from(index)).map_or(0, |bar| bar.base)
    }

    pub fn set_capability_pointer(&mut self, offset: u8) {
        self.bytes[usize::from(PCI_CAP_PTR_OFFSET)] = offset;
        let status = if offset == 0 {
            self.status() & !PCI_STATUS_CAPABILITIES_LIST
        } else {
            self.status() | PCI_STATUS_CAPABILITIES_LIST
        };
        self.bytes[PCI_STATUS_OFFSET..PCI_STATUS_OFFSET + 2].copy_from_slice(&status.to_le_bytes());
    }

    pub fn read(&self, offset: u16, size: usize) -> u32 {
        assert!(matches!(size, 1 | 2 | 4));
        let offset = usize::from(offset);
        assert!(offset + size <= PCI_HEADER_SIZE);

        if (PCI_BAR0_OFFSET..=PCI_BAR5_END).contains(&offset) {
            let aligned = offset & !0x3;
            let value = self.read_bar_register((aligned - PCI_BAR0_OFFSET) / 4);
            let shifted = value >> ((offset - aligned) * 8);
            let mask = match size {
                1 => 0xff,
                2 => 0xffff,
                _ => 0xffff_ffff,
            };
            return shifted & mask;
        }

        let mut value = 0u32;
        for i in 0..size {
            value |= u32::from(self.bytes[offset + i]) << (8 * i);
        }
        value
    }

    pub fn write_with_effects(
        &mut self,
        offset: u16,
        size: usize,
        value: u32,
    ) -> PciConfigWriteEffects {
        assert!(matches!(size, 1 | 2 | 4));
        let offset = usize::from(offset);
        assert!(offset + size <= PCI_HEADER_SIZE);

        if (PCI_BAR0_OFFSET..=PCI_BAR5_END).contains(&offset) {
            let aligned = offset & !0x3;
            assert_eq!(aligned, offset, "BAR writes must be 32-bit aligned");
            assert_eq!(size, 4, "BAR writes must be 32-bit");
            let index = (aligned - PCI_BAR0_OFFSET) / 4;
            let change = self.write_bar_register(index, value);
            return PciConfigWriteEffects {
                bar: Some((index as u8, change)),
            };
        }

        for i in 0..size {
            let addr = offset + i;
            if Self::is_read_only_byte(addr) {
                continue;
            }
            self.bytes[addr] = ((value >> (8 * i)) & 0xff) as u8;
        }
        PciConfigWriteEffects::default()
    }

    fn read_bar_register(&self, index: usize) -> u32 {
        let bar = &self.bars[index];
        let Some(def) = bar.def else {
            return 0;
        };
        if bar.probe {
            def.address_mask() | def.flag_bits()
        } else {
            bar.base | def.flag_bits()
        }
    }

    fn write_bar_register(&mut self, index: usize, value: u32) -> PciBarChange {
        let bar = &mut self.bars[index];
        let Some(def) = bar.def else {
            return PciBarChange::Unchanged;
        };

        if value == 0xffff_ffff {
            bar.probe = true;
            return PciBarChange::Unchanged;
        }

        bar.probe = false;
        let old = bar.base;
        bar.base = value & def.address_mask();
        if old == bar.base {
            PciBarChange::Unchanged
        } else {
            PciBarChange::Changed { old, new: bar.base }
        }
    }

    fn is_read_only_byte(addr: usize) -> bool {
        // Vendor/device ID, status, revision/class code, header type.
        if addr < 0x04
            || (PCI_STATUS_OFFSET..=0x0b).contains(&addr)
            || addr == usize::from(Self::HEADER_TYPE_OFFSET)
        {
            return true;
        }
        // Subsystem IDs and expansion ROM (not implemented).
        if (0x2c..0x34).contains(&addr) {
            return true;
        }
        // Interrupt pin, Max_Lat and Min_Gnt.
        addr == usize::from(PCI_CAP_PTR_OFFSET) || addr >= usize::from(Self::INTERRUPT_PIN_OFFSET)
    }
}

impl Default for PciConfigHeader {
    fn default() -> Self {
        let mut header = Self::new(SATA_AHCI_9_SERIES);
        for (index, def) in SATA_BAR_LAYOUT.into_iter().enumerate() {
            header.set_bar_definition(index as u8, def);
        }
        header
    }
}
