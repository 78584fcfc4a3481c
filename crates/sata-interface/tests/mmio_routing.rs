mod common;

use common::{RecordingController, RegisterAccess};
use sata_interface::{PciFunction, RegisterWindowKind, SataInterface};

const AHCI_BASE: u64 = 0xfebf_0000;
const BUS_MASTER_BASE: u64 = 0xc000;

fn assigned() -> (SataInterface<RecordingController>, common::RecordingIrqLine) {
    let (mut dev, irq) = common::device();
    dev.config_write(0x10, 4, 0x1f0);
    dev.config_write(0x14, 4, 0x3f4);
    dev.config_write(0x20, 4, BUS_MASTER_BASE as u32);
    dev.config_write(0x24, 4, AHCI_BASE as u32);
    (dev, irq)
}

#[test]
fn accesses_reach_the_controller_with_window_offsets() {
    let (mut dev, _irq) = assigned();

    let mut data = [0u8; 4];
    assert_eq!(
        dev.mmio_read(AHCI_BASE + 0x10, &mut data),
        RecordingController::ACCESS_TICKS
    );
    assert_eq!(data, [0x10, 0x11, 0x12, 0x13]);

    dev.mmio_write(0x1f7, &[0xec]);
    dev.mmio_write(BUS_MASTER_BASE + 0x12, &[0, 0]);

    assert_eq!(
        dev.controller().accesses,
        [
            RegisterAccess {
                window: RegisterWindowKind::AhciRegisters,
                offset: 0x10,
                len: 4,
                write: false,
            },
            RegisterAccess {
                window: RegisterWindowKind::PrimaryCommandBlock,
                offset: 7,
                len: 1,
                write: true,
            },
            RegisterAccess {
                window: RegisterWindowKind::IndexDataPair,
                offset: 2,
                len: 2,
                write: true,
            },
        ]
    );
}

#[test]
fn last_byte_of_a_window_is_routable() {
    let (mut dev, _irq) = assigned();
    let mut data = [0u8; 1];
    dev.mmio_read(0x3f4 + 3, &mut data);
    assert_eq!(
        dev.controller().accesses[0].window,
        RegisterWindowKind::PrimaryControlBlock
    );
}

#[test]
fn controller_dma_and_interrupts_flow_through_the_device() {
    let (mut dev, irq) = assigned();

    dev.mmio_write(AHCI_BASE, &[1, 2, 3, 4]);

    assert_eq!(dev.controller().last_dma_issue, Some(0));
    assert_eq!(
        dev.memory_mut()
            .read_u32(RecordingController::DOORBELL_TARGET)
            .unwrap(),
        0x0403_0201
    );
    assert!(irq.level());
}

#[test]
#[should_panic(expected = "invalid address access: 0xfebf03fe size: 4")]
fn access_straddling_a_window_end_is_fatal() {
    let (mut dev, _irq) = assigned();
    let mut data = [0u8; 4];
    dev.mmio_read(AHCI_BASE + 0x3fe, &mut data);
}

#[test]
#[should_panic(expected = "invalid address access: 0x170 size: 1")]
fn access_to_an_unassigned_window_is_fatal() {
    let (mut dev, _irq) = assigned();
    dev.mmio_write(0x170, &[0]);
}

#[test]
#[should_panic(expected = "invalid address access")]
fn access_before_any_bar_is_programmed_is_fatal() {
    let (mut dev, _irq) = common::device();
    let mut data = [0u8; 4];
    dev.mmio_read(0, &mut data);
}
