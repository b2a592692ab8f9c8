//! Recording fake platform for host tests.
//!
//! Models one PCI function's 256-byte configuration space and records every
//! side effect the bus driver produces (config writes, MMIO stores, page-table
//! requests and interrupt masking) in order, so tests can assert on the exact
//! programming sequence.

use core::cell::{Cell, RefCell};
use std::vec::Vec;

use qemu_pci_abi::addr::{PhysAddr, VirtAddr};
use qemu_pci_lib::{InterruptControl, IrqState};
use qemu_pci_mm::{MmError, MmResult, PageFlags, RegionMapper};

use crate::pci_defs::{
    PCI_BAR0_OFFSET, PCI_CAP_ID_MSI, PCI_CAP_ID_MSIX, PCI_CAP_PTR_OFFSET, PCI_CONFIG_SPACE_SIZE,
    PCI_STATUS_CAP_LIST, PCI_STATUS_OFFSET, PciBdf, PciDevice,
};
use crate::platform::{ConfigWidth, PciPlatform};

pub const TEST_APIC_ID: u32 = 3;

pub fn test_device() -> PciDevice {
    PciDevice::new(PciBdf::new(0, 3, 0))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    CfgWrite {
        offset: u16,
        value: u32,
        width: ConfigWidth,
    },
    Mmio {
        addr: u64,
        value: u32,
    },
    Map {
        phys: u64,
        length: usize,
        flags: PageFlags,
    },
    MapTo {
        virt: u64,
        phys: u64,
        length: usize,
        flags: PageFlags,
    },
    IrqSave,
    IrqRestore,
}

pub struct FakePlatform {
    config: RefCell<[u8; PCI_CONFIG_SPACE_SIZE as usize]>,
    events: RefCell<Vec<Event>>,
    last_cap: Cell<Option<u8>>,
    apic_id: Cell<u32>,
    fail_mapping: Cell<bool>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            config: RefCell::new([0; PCI_CONFIG_SPACE_SIZE as usize]),
            events: RefCell::new(Vec::new()),
            last_cap: Cell::new(None),
            apic_id: Cell::new(TEST_APIC_ID),
            fail_mapping: Cell::new(false),
        }
    }

    // -------------------------------------------------------------------------
    // Config space setup (not recorded)
    // -------------------------------------------------------------------------

    pub fn set_cfg8(&self, offset: u16, value: u8) {
        self.config.borrow_mut()[offset as usize] = value;
    }

    pub fn set_cfg16(&self, offset: u16, value: u16) {
        let mut cfg = self.config.borrow_mut();
        cfg[offset as usize..offset as usize + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_cfg32(&self, offset: u16, value: u32) {
        let mut cfg = self.config.borrow_mut();
        cfg[offset as usize..offset as usize + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn cfg16(&self, offset: u16) -> u16 {
        self.read_bytes(offset, ConfigWidth::Word) as u16
    }

    pub fn cfg32(&self, offset: u16) -> u32 {
        self.read_bytes(offset, ConfigWidth::Dword)
    }

    pub fn set_bar(&self, index: u8, value: u32) {
        self.set_cfg32(PCI_BAR0_OFFSET + index as u16 * 4, value);
    }

    /// Append a capability header at `offset` to the device's chain.
    pub fn add_capability(&self, offset: u8, id: u8) {
        self.set_cfg8(offset as u16, id);
        self.set_cfg8(offset as u16 + 1, 0);
        match self.last_cap.get() {
            None => {
                let status = self.cfg16(PCI_STATUS_OFFSET);
                self.set_cfg16(PCI_STATUS_OFFSET, status | PCI_STATUS_CAP_LIST);
                self.set_cfg8(PCI_CAP_PTR_OFFSET, offset);
            }
            Some(prev) => self.set_cfg8(prev as u16 + 1, offset),
        }
        self.last_cap.set(Some(offset));
    }

    /// MSI-X capability with `entries` table entries located in BAR `bir` at
    /// `table_offset`.
    pub fn add_msix(&self, cap: u8, entries: u16, bir: u8, table_offset: u32) {
        self.add_capability(cap, PCI_CAP_ID_MSIX);
        self.set_cfg16(cap as u16 + 2, (entries - 1) & 0x7FF);
        self.set_cfg32(cap as u16 + 4, table_offset | bir as u32);
    }

    pub fn add_msi(&self, cap: u8, is_64bit: bool) {
        self.add_capability(cap, PCI_CAP_ID_MSI);
        self.set_cfg16(cap as u16 + 2, if is_64bit { 0x0080 } else { 0 });
    }

    pub fn set_apic_id(&self, id: u32) {
        self.apic_id.set(id);
    }

    pub fn fail_mapping(&self, fail: bool) {
        self.fail_mapping.set(fail);
    }

    // -------------------------------------------------------------------------
    // Recorded events
    // -------------------------------------------------------------------------

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Every recorded event except interrupt save/restore.
    pub fn writes(&self) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .copied()
            .filter(|e| !matches!(e, Event::IrqSave | Event::IrqRestore))
            .collect()
    }

    pub fn irq_sections(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::IrqSave))
            .count()
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn read_bytes(&self, offset: u16, width: ConfigWidth) -> u32 {
        let cfg = self.config.borrow();
        let start = offset as usize;
        let mut value = 0u32;
        for i in 0..width.bytes() {
            let byte = cfg.get(start + i).copied().unwrap_or(0xFF);
            value |= (byte as u32) << (8 * i);
        }
        value
    }
}

impl InterruptControl for FakePlatform {
    fn irq_save(&self) -> IrqState {
        self.record(Event::IrqSave);
        IrqState::enabled()
    }

    fn irq_restore(&self, _state: IrqState) {
        self.record(Event::IrqRestore);
    }
}

impl RegionMapper for FakePlatform {
    fn map_region(&self, phys: PhysAddr, length: usize, flags: PageFlags) -> MmResult {
        self.record(Event::Map {
            phys: phys.as_u64(),
            length,
            flags,
        });
        if self.fail_mapping.get() {
            return Err(MmError::MappingFailed);
        }
        Ok(())
    }

    fn map_region_to(
        &self,
        virt: VirtAddr,
        phys: PhysAddr,
        length: usize,
        flags: PageFlags,
    ) -> MmResult {
        self.record(Event::MapTo {
            virt: virt.as_u64(),
            phys: phys.as_u64(),
            length,
            flags,
        });
        if self.fail_mapping.get() {
            return Err(MmError::MappingFailed);
        }
        Ok(())
    }
}

impl PciPlatform for FakePlatform {
    fn config_read(&self, _bdf: PciBdf, offset: u16, width: ConfigWidth) -> u32 {
        self.read_bytes(offset, width)
    }

    fn config_write(&self, _bdf: PciBdf, offset: u16, value: u32, width: ConfigWidth) {
        {
            let mut cfg = self.config.borrow_mut();
            let bytes = value.to_le_bytes();
            for (i, byte) in bytes.iter().take(width.bytes()).enumerate() {
                if let Some(slot) = cfg.get_mut(offset as usize + i) {
                    *slot = *byte;
                }
            }
        }
        self.record(Event::CfgWrite {
            offset,
            value: value & width.value_mask(),
            width,
        });
    }

    fn mmio_write32(&self, addr: PhysAddr, value: u32) {
        self.record(Event::Mmio {
            addr: addr.as_u64(),
            value,
        });
    }

    fn current_apic_id(&self) -> u32 {
        self.apic_id.get()
    }
}
