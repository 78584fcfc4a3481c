mod common;

use sata_interface::{HostInterface, InterruptMode, PciFunction, SataInterfaceConfig};

const MSI_ADDRESS: u32 = 0x2000;

fn program_msi<F: PciFunction>(dev: &mut F, control: u16, data: u16) {
    dev.config_write(0x84, 4, MSI_ADDRESS);
    dev.config_write(0x88, 2, u32::from(data));
    dev.config_write(0x82, 2, u32::from(control));
}

#[test]
fn pin_mode_signals_only_aggregate_changes() {
    let (mut dev, irq) = common::device();

    dev.update_interrupt(1, true);
    dev.update_interrupt(4, true);
    dev.update_interrupt(1, false);
    assert!(irq.level());
    dev.update_interrupt(4, false);
    assert!(!irq.level());

    // Every change of the source set re-drives the line; only the empty set lowers it.
    assert_eq!(irq.history(), [true, true, true, false]);
}

#[test]
fn repeated_clears_are_silent() {
    let (mut dev, irq) = common::device();
    dev.update_interrupt(0, false);
    dev.update_interrupt(0, false);
    assert!(irq.history().is_empty());
}

#[test]
fn pin_sources_beyond_the_bitmap_are_dropped() {
    let (mut dev, irq) = common::device();
    dev.update_interrupt(40, true);
    assert!(irq.history().is_empty());
    assert_eq!(dev.interrupts().sources(), 0);
}

#[test]
fn msi_payload_encodes_source_in_low_bits() {
    let (mut dev, irq) = common::device();
    program_msi(&mut dev, 0x0021, 0x4040);
    assert_eq!(dev.interrupts().mode(), InterruptMode::Msi);
    assert_eq!(dev.interrupts().vector_count(), 4);

    dev.update_interrupt(6, true);
    let payload = dev.memory_mut().read_u32(u64::from(MSI_ADDRESS)).unwrap();
    assert_eq!(payload, 0x4042);
    assert_eq!(payload & 0x3, 2);
    assert!(irq.history().is_empty());
}

#[test]
fn msi_with_one_vector_uses_the_template() {
    let (mut dev, _irq) = common::device();
    program_msi(&mut dev, 0x0001, 0x4045);

    dev.update_interrupt(3, true);
    assert_eq!(dev.memory_mut().read_u32(u64::from(MSI_ADDRESS)).unwrap(), 0x4045);
}

#[test]
fn msi_clear_writes_nothing() {
    let (mut dev, _irq) = common::device();
    program_msi(&mut dev, 0x0001, 0x4045);

    dev.update_interrupt(3, false);
    assert_eq!(dev.memory_mut().read_u32(u64::from(MSI_ADDRESS)).unwrap(), 0);
}

#[test]
fn msi_lands_at_the_translated_address() {
    let (mut dev, _irq) = common::device_with(
        SataInterfaceConfig {
            dma_offset: 0x1000,
            ..SataInterfaceConfig::default()
        },
        common::RecordingController::default(),
    );
    program_msi(&mut dev, 0x0001, 0x0077);

    dev.update_interrupt(0, true);
    assert_eq!(
        dev.memory_mut()
            .read_u32(u64::from(MSI_ADDRESS) + 0x1000)
            .unwrap(),
        0x77
    );
}

#[test]
fn reserved_multiple_message_enable_is_clamped() {
    let (mut dev, _irq) = common::device();
    program_msi(&mut dev, 0x0071, 0x0000);
    assert_eq!(dev.interrupts().vector_count(), 32);

    dev.update_interrupt(37, true);
    assert_eq!(dev.memory_mut().read_u32(u64::from(MSI_ADDRESS)).unwrap(), 5);
}

#[test]
fn disabling_msi_falls_back_to_the_pin() {
    let (mut dev, irq) = common::device();
    program_msi(&mut dev, 0x0001, 0x0000);
    dev.config_write(0x82, 2, 0x0000);
    assert_eq!(dev.interrupts().mode(), InterruptMode::Pin);

    dev.update_interrupt(2, true);
    assert!(irq.level());
}

#[test]
fn reset_drops_pending_sources_but_keeps_msi_programming() {
    let (mut dev, irq) = common::device();
    dev.update_interrupt(2, true);
    dev.reset();
    assert!(!irq.level());
    assert_eq!(dev.interrupts().sources(), 0);

    program_msi(&mut dev, 0x0001, 0x0011);
    dev.reset();
    assert_eq!(dev.interrupts().mode(), InterruptMode::Msi);
}

#[test]
#[should_panic(expected = "overflows offset")]
fn msi_address_wrapping_past_the_offset_is_fatal() {
    let (mut dev, _irq) = common::device_with(
        SataInterfaceConfig {
            dma_offset: u64::MAX - 0xf,
            ..SataInterfaceConfig::default()
        },
        common::RecordingController::default(),
    );
    program_msi(&mut dev, 0x0001, 0x0001);

    dev.update_interrupt(0, true);
}
