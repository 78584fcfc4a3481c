//! Register windows decoded from the function's BARs.

use core::fmt;

use crate::pci::PCI_BAR_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterWindowKind {
    PrimaryCommandBlock,
    PrimaryControlBlock,
    SecondaryCommandBlock,
    SecondaryControlBlock,
    BusMaster,
    IndexDataPair,
    AhciRegisters,
}

impl RegisterWindowKind {
    /// Match order when windows are compared against an access.
    pub const ALL: [Self; 7] = [
        Self::PrimaryCommandBlock,
        Self::PrimaryControlBlock,
        Self::SecondaryCommandBlock,
        Self::SecondaryControlBlock,
        Self::BusMaster,
        Self::IndexDataPair,
        Self::AhciRegisters,
    ];

    pub const fn len(self) -> u64 {
        match self {
            Self::PrimaryCommandBlock | Self::SecondaryCommandBlock => 8,
            Self::PrimaryControlBlock | Self::SecondaryControlBlock => 4,
            Self::BusMaster | Self::IndexDataPair => 16,
            Self::AhciRegisters => 1024,
        }
    }

    /// BAR that places this window, and the window's offset inside it.
    pub const fn bar(self) -> (u8, u64) {
        match self {
            Self::PrimaryCommandBlock => (0, 0),
            Self::PrimaryControlBlock => (1, 0),
            Self::SecondaryCommandBlock => (2, 0),
            Self::SecondaryControlBlock => (3, 0),
            Self::BusMaster => (4, 0),
            Self::IndexDataPair => (4, 16),
            Self::AhciRegisters => (5, 0),
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RegisterWindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrimaryCommandBlock => "primary command block",
            Self::PrimaryControlBlock => "primary control block",
            Self::SecondaryCommandBlock => "secondary command block",
            Self::SecondaryControlBlock => "secondary control block",
            Self::BusMaster => "legacy bus master",
            Self::IndexDataPair => "index/data pair",
            Self::AhciRegisters => "AHCI registers",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWindow {
    pub kind: RegisterWindowKind,
    /// Zero while the host has not assigned the backing BAR.
    pub base: u64,
}

impl RegisterWindow {
    pub fn is_assigned(&self) -> bool {
        self.base != 0
    }

    pub fn end_exclusive(&self) -> u64 {
        self.base.saturating_add(self.kind.len())
    }

    /// Whether `[addr, addr + size)` lies entirely inside this window.
    pub fn contains(&self, addr: u64, size: u64) -> bool {
        let Some(end) = addr.checked_add(size) else {
            return false;
        };
        self.is_assigned() && addr >= self.base && end <= self.end_exclusive()
    }
}

/// A routed access: which window it hit and the offset inside that window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub kind: RegisterWindowKind,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct RegisterWindows {
    windows: [RegisterWindow; 7],
}

impl RegisterWindows {
    pub fn new() -> Self {
        Self {
            windows: RegisterWindowKind::ALL.map(|kind| RegisterWindow { kind, base: 0 }),
        }
    }

    pub fn window(&self, kind: RegisterWindowKind) -> RegisterWindow {
        self.windows[kind.index()]
    }

    /// Places every window backed by BAR `bar` relative to the BAR's new `base`.
    ///
    /// A zero base never assigns. Windows keep the first base they were given: moving a live
    /// window is reported and ignored.
    pub fn assign_bar(&mut self, bar: u8, base: u64) {
        debug_assert!(usize::from(bar) < PCI_BAR_COUNT);
        if base == 0 {
            return;
        }

        for window in self.windows.iter_mut() {
            let (window_bar, offset) = window.kind.bar();
            if window_bar != bar {
                continue;
            }
            let new_base = base + offset;
            if !window.is_assigned() {
                tracing::debug!("sata_interface: {} at {new_base:#x}", window.kind);
                window.base = new_base;
            } else if window.base != new_base {
                tracing::warn!(
                    "sata_interface: ignoring BAR{bar} re-assignment of {} from {:#x} to \
                     {new_base:#x}",
                    window.kind,
                    window.base
                );
            }
        }
    }

    /// Finds the window that fully contains `[addr, addr + size)`.
    pub fn lookup(&self, addr: u64, size: u64) -> Option<WindowHit> {
        self.windows
            .iter()
            .find(|window| window.contains(addr, size))
            .map(|window| WindowHit {
                kind: window.kind,
                offset: addr - window.base,
            })
    }

    /// Like [`RegisterWindows::lookup`], but an unroutable access is fatal.
    ///
    /// # Panics
    ///
    /// Panics if no window contains the access, including accesses that straddle a window
    /// boundary.
    pub fn route(&self, addr: u64, size: u64) -> WindowHit {
        match self.lookup(addr, size) {
            Some(hit) => hit,
            None => {
                tracing::error!("sata_interface: invalid address access: {addr:#x} size: {size}");
                panic!("sata_interface: invalid address access: {addr:#x} size: {size}");
            }
        }
    }
}

impl Default for RegisterWindows {
    fn default() -> Self {
        Self::new()
    }
}
