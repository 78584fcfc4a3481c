#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use memory::DenseMemory;
use sata_interface::{
    HostInterface, IrqLine, RegisterWindowKind, SataInterface, SataInterfaceConfig,
    StorageController, Tick,
};

pub const MEMORY_SIZE: u64 = 0x1_0000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// INTx line that remembers every level it was driven to.
#[derive(Debug, Clone, Default)]
pub struct RecordingIrqLine {
    level: Rc<Cell<bool>>,
    history: Rc<RefCell<Vec<bool>>>,
}

impl RecordingIrqLine {
    pub fn level(&self) -> bool {
        self.level.get()
    }

    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }
}

impl IrqLine for RecordingIrqLine {
    fn set_level(&self, high: bool) {
        self.level.set(high);
        self.history.borrow_mut().push(high);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterAccess {
    pub window: RegisterWindowKind,
    pub offset: u64,
    pub len: usize,
    pub write: bool,
}

/// Controller that logs every routed access. A write to AHCI register 0 is treated as a
/// doorbell: the written bytes are DMA'd to [`RecordingController::DOORBELL_TARGET`] and
/// interrupt source 0 is posted.
#[derive(Debug, Default)]
pub struct RecordingController {
    pub accesses: Vec<RegisterAccess>,
    pub last_dma_issue: Option<Tick>,
}

impl RecordingController {
    pub const DOORBELL_TARGET: u64 = 0x400;
    pub const ACCESS_TICKS: Tick = 1_000;
}

impl StorageController for RecordingController {
    fn read_register(
        &mut self,
        window: RegisterWindowKind,
        offset: u64,
        data: &mut [u8],
        _host: &mut dyn HostInterface,
    ) -> Tick {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (offset as u8).wrapping_add(i as u8);
        }
        self.accesses.push(RegisterAccess {
            window,
            offset,
            len: data.len(),
            write: false,
        });
        Self::ACCESS_TICKS
    }

    fn write_register(
        &mut self,
        window: RegisterWindowKind,
        offset: u64,
        data: &[u8],
        host: &mut dyn HostInterface,
    ) -> Tick {
        self.accesses.push(RegisterAccess {
            window,
            offset,
            len: data.len(),
            write: true,
        });
        if window == RegisterWindowKind::AhciRegisters && offset == 0 {
            let mut tick = 0;
            self.last_dma_issue = Some(host.dma_write(
                Self::DOORBELL_TARGET,
                data.len() as u64,
                Some(data),
                &mut tick,
            ));
            host.update_interrupt(0, true);
        }
        Self::ACCESS_TICKS
    }
}

pub fn device_with<C: StorageController>(
    config: SataInterfaceConfig,
    controller: C,
) -> (SataInterface<C>, RecordingIrqLine) {
    init_tracing();
    let irq = RecordingIrqLine::default();
    let dev = SataInterface::new(
        config,
        Box::new(DenseMemory::new(MEMORY_SIZE).unwrap()),
        Box::new(irq.clone()),
        controller,
    )
    .unwrap();
    (dev, irq)
}

pub fn device() -> (SataInterface<RecordingController>, RecordingIrqLine) {
    device_with(SataInterfaceConfig::default(), RecordingController::default())
}
