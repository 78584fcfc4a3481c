//! Interrupt signalling: level-triggered INTx or message-signalled interrupts.

use std::cell::Cell;
use std::rc::Rc;

use crate::pci::MsiControl;

/// Width of the pin-mode interrupt-source bitmap.
pub const INTERRUPT_SOURCES: u16 = 32;

/// A level-triggered interrupt line owned by the platform.
pub trait IrqLine {
    fn set_level(&self, high: bool);
}

/// Shared INTx level cell. Clones observe the same line.
#[derive(Debug, Clone, Default)]
pub struct LevelIrqLine(Rc<Cell<bool>>);

impl LevelIrqLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> bool {
        self.0.get()
    }
}

impl IrqLine for LevelIrqLine {
    fn set_level(&self, high: bool) {
        self.0.set(high);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptMode {
    #[default]
    Pin,
    Msi,
    /// Declared by the hardware model but never entered: no MSI-X capability is exposed, so
    /// updates in this mode are dropped.
    MsiX,
}

/// A fully formatted MSI write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsiMessage {
    pub address: u32,
    pub data: u32,
}

/// What the host must observe as the result of an [`InterruptState::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSignal {
    IntxAssert,
    IntxDeassert,
    Msi(MsiMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptState {
    mode: InterruptMode,
    sources: u32,
    previous_sources: u32,
    vectors: u16,
    message_address: u32,
    message_data: u16,
}

impl InterruptState {
    pub fn new() -> Self {
        Self {
            mode: InterruptMode::Pin,
            sources: 0,
            previous_sources: 0,
            vectors: 1,
            message_address: 0,
            message_data: 0,
        }
    }

    pub fn mode(&self) -> InterruptMode {
        self.mode
    }

    pub fn vector_count(&self) -> u16 {
        self.vectors
    }

    /// Asserted pin-mode sources.
    pub fn sources(&self) -> u32 {
        self.sources
    }

    pub fn message_address(&self) -> u32 {
        self.message_address
    }

    pub fn message_data(&self) -> u16 {
        self.message_data
    }

    /// Tracks a write to the MSI message-control register.
    pub fn set_message_control(&mut self, control: MsiControl) {
        self.mode = if control.contains(MsiControl::ENABLE) {
            InterruptMode::Msi
        } else {
            InterruptMode::Pin
        };
        self.vectors = control.vector_count();

        tracing::debug!(
            "sata_interface: INTR | MSI {} | {} vectors",
            if self.mode == InterruptMode::Pin {
                "disabled"
            } else {
                "enabled"
            },
            self.vectors
        );
    }

    pub fn set_message_address(&mut self, address: u32) {
        self.message_address = address;
    }

    pub fn set_message_data(&mut self, data: u16) {
        self.message_data = data;
    }

    pub fn clear_sources(&mut self) {
        self.sources = 0;
        self.previous_sources = 0;
    }

    /// Records that interrupt source `index` was posted (`post == true`) or cleared.
    ///
    /// Returns the signal the host has to see, if any. Pin mode only signals when the aggregate
    /// source state changes; MSI mode sends one message per post and ignores clears.
    pub fn update(&mut self, index: u16, post: bool) -> Option<InterruptSignal> {
        match self.mode {
            InterruptMode::Pin => self.update_pin(index, post),
            InterruptMode::Msi => post.then(|| InterruptSignal::Msi(self.message_for(index))),
            InterruptMode::MsiX => None,
        }
    }

    fn update_pin(&mut self, index: u16, post: bool) -> Option<InterruptSignal> {
        if index >= INTERRUPT_SOURCES {
            tracing::warn!("sata_interface: interrupt source {index} out of range, ignored");
            return None;
        }

        let bit = 1u32 << index;
        if post {
            self.sources |= bit;
        } else {
            self.sources &= !bit;
        }

        if self.sources == self.previous_sources {
            return None;
        }
        self.previous_sources = self.sources;

        if self.sources == 0 {
            tracing::debug!("sata_interface: INTR | Pin Interrupt Clear");
            Some(InterruptSignal::IntxDeassert)
        } else {
            tracing::debug!("sata_interface: INTR | Pin Interrupt Post");
            Some(InterruptSignal::IntxAssert)
        }
    }

    fn message_for(&self, index: u16) -> MsiMessage {
        let mut data = u32::from(self.message_data);
        if self.vectors > 1 {
            let mask = u32::from(self.vectors) - 1;
            data = (data & !mask) | (u32::from(index) & mask);
        }
        tracing::debug!("sata_interface: INTR | MSI sent | vector {index}");
        MsiMessage {
            address: self.message_address,
            data,
        }
    }
}

impl Default for InterruptState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msi_state(control: u16) -> InterruptState {
        let mut state = InterruptState::new();
        state.set_message_address(0xfee0_0000);
        state.set_message_data(0x4040);
        state.set_message_control(MsiControl::from_bits_retain(control));
        state
    }

    #[test]
    fn pin_mode_is_level_with_hysteresis() {
        let mut state = InterruptState::new();

        assert_eq!(state.update(0, true), Some(InterruptSignal::IntxAssert));
        assert_eq!(state.update(0, true), None);
        assert_eq!(state.update(3, true), Some(InterruptSignal::IntxAssert));
        assert_eq!(state.update(0, false), Some(InterruptSignal::IntxAssert));
        assert_eq!(state.update(3, false), Some(InterruptSignal::IntxDeassert));
        assert_eq!(state.update(3, false), None);
        assert_eq!(state.sources(), 0);
    }

    #[test]
    fn pin_mode_ignores_out_of_range_sources() {
        let mut state = InterruptState::new();
        assert_eq!(state.update(32, true), None);
        assert_eq!(state.sources(), 0);
    }

    #[test]
    fn msi_single_vector_sends_template_unchanged() {
        let mut state = msi_state(0x0001);
        assert_eq!(state.mode(), InterruptMode::Msi);
        assert_eq!(
            state.update(7, true),
            Some(InterruptSignal::Msi(MsiMessage {
                address: 0xfee0_0000,
                data: 0x4040
            }))
        );
    }

    #[test]
    fn msi_multi_vector_encodes_source_in_low_bits() {
        let mut state = msi_state(0x0021);
        assert_eq!(state.vector_count(), 4);

        let Some(InterruptSignal::Msi(msg)) = state.update(6, true) else {
            panic!("expected an MSI");
        };
        assert_eq!(msg.data, 0x4042);
        assert_eq!(msg.data & 0x3, 6 % 4);
    }

    #[test]
    fn msi_clears_are_silent() {
        let mut state = msi_state(0x0001);
        assert_eq!(state.update(0, false), None);
        // Every post is its own edge.
        assert!(state.update(0, true).is_some());
        assert!(state.update(0, true).is_some());
    }

    #[test]
    fn disabling_msi_returns_to_pin_mode() {
        let mut state = msi_state(0x0001);
        state.set_message_control(MsiControl::empty());
        assert_eq!(state.mode(), InterruptMode::Pin);
        assert_eq!(state.update(1, true), Some(InterruptSignal::IntxAssert));
    }

    #[test]
    fn level_irq_line_clones_share_state() {
        let line = LevelIrqLine::new();
        let observer = line.clone();
        line.set_level(true);
        assert!(observer.level());
    }
}
