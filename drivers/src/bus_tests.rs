//! Bus registration and capability table tests.

use std::panic::AssertUnwindSafe;
use std::vec::Vec;

use qemu_pci_abi::addr::VirtAddr;
use qemu_pci_mm::{BarPagePool, SharedBarPool};

use crate::bus::{PciBusOps, PciEnumerator, QemuPciBus};
use crate::error::{PciError, pci_status};
use crate::pci_defs::PciDevice;
use crate::platform::ConfigWidth;
use crate::test_fixtures::{Event, FakePlatform, test_device};

const POOL_BASE: VirtAddr = VirtAddr(0x80_0000);

/// Enumerator that exercises the test device through the table it is handed.
#[derive(Default)]
struct RecordingEnumerator {
    calls: usize,
    vendor: Vec<u32>,
    mapped: Vec<VirtAddr>,
}

impl PciEnumerator for RecordingEnumerator {
    fn enumerate(&mut self, bus: &dyn PciBusOps) {
        self.calls += 1;
        let dev = test_device();
        self.vendor.push(bus.cfg_read(&dev, 0x00, 2));
        if let Ok(ptr) = bus.map(&dev, 0, 0x1000) {
            self.mapped.push(ptr);
        }
    }
}

fn device_platform() -> FakePlatform {
    let platform = FakePlatform::new();
    platform.set_cfg16(0x00, 0x1AF4);
    platform.set_cfg16(0x02, 0x1041);
    platform
}

#[test]
fn init_resets_pool_then_enumerates() {
    let pool = SharedBarPool::new(BarPagePool::<1>::new(POOL_BASE, 4));
    let bus = QemuPciBus::with_bar_pool(device_platform(), &pool);

    // Left over from before bring-up.
    pool.allocate(bus.platform(), 0x4000).unwrap();

    let mut enumerator = RecordingEnumerator::default();
    bus.init(&mut enumerator);

    assert_eq!(enumerator.calls, 1);
    assert_eq!(enumerator.vendor, [0x1AF4]);
    assert_eq!(enumerator.mapped, [POOL_BASE]);
    assert_eq!(pool.snapshot(bus.platform()).free_pages(), 3);
}

#[test]
fn init_without_pool_still_enumerates() {
    let bus = QemuPciBus::new(device_platform());
    let mut enumerator = RecordingEnumerator::default();
    bus.init(&mut enumerator);

    assert_eq!(enumerator.calls, 1);
    assert!(enumerator.mapped.is_empty());
    assert!(bus.bar_pool().is_none());
}

#[test]
fn config_accessor_passes_widths_through() {
    let bus = QemuPciBus::new(device_platform());
    let dev = test_device();

    assert_eq!(bus.cfg_read(&dev, 0x00, 4), 0x1041_1AF4);
    assert_eq!(bus.cfg_read(&dev, 0x02, 2), 0x1041);
    assert_eq!(bus.cfg_read(&dev, 0x01, 1), 0x1A);

    bus.cfg_write(&dev, 0x04, 0x0006, 2);
    bus.cfg_write(&dev, 0x3C, 0x0B, 1);
    assert_eq!(
        bus.platform().writes(),
        [
            Event::CfgWrite {
                offset: 0x04,
                value: 0x0006,
                width: ConfigWidth::Word
            },
            Event::CfgWrite {
                offset: 0x3C,
                value: 0x0B,
                width: ConfigWidth::Byte
            },
        ]
    );
}

#[test]
#[should_panic]
fn unsupported_read_width_panics() {
    let bus = QemuPciBus::new(device_platform());
    let _ = bus.cfg_read(&test_device(), 0x00, 3);
}

#[test]
#[should_panic]
fn unsupported_write_width_panics() {
    let bus = QemuPciBus::new(device_platform());
    bus.cfg_write(&test_device(), 0x00, 0, 8);
}

#[test]
fn last_bytes_of_config_space_are_reachable() {
    let platform = device_platform();
    platform.set_cfg32(0xFC, 0xA5A5_5A5A);
    let bus = QemuPciBus::new(platform);
    let dev = test_device();

    assert_eq!(bus.cfg_read(&dev, 0xFC, 4), 0xA5A5_5A5A);
    assert_eq!(bus.cfg_read(&dev, 0xFE, 2), 0xA5A5);
    assert_eq!(bus.cfg_read(&dev, 0xFF, 1), 0xA5);
    bus.cfg_write(&dev, 0xFF, 0x11, 1);
    assert_eq!(bus.platform().cfg32(0xFC), 0x11A5_5A5A);
}

#[test]
#[should_panic]
fn read_beyond_config_space_panics() {
    let bus = QemuPciBus::new(device_platform());
    let _ = bus.cfg_read(&test_device(), 0x100, 4);
}

#[test]
#[should_panic]
fn read_straddling_end_of_config_space_panics() {
    let bus = QemuPciBus::new(device_platform());
    let _ = bus.cfg_read(&test_device(), 0xFE, 4);
}

#[test]
fn write_beyond_config_space_panics_before_touching_device() {
    let bus = QemuPciBus::new(device_platform());
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        bus.cfg_write(&test_device(), 0x104, 0xFFFF_FFFF, 4);
    }));
    assert!(result.is_err());
    assert!(bus.platform().writes().is_empty());
    assert_eq!(bus.platform().cfg32(0x04), 0);
}

#[test]
fn interrupt_registration_through_table() {
    let platform = device_platform();
    platform.add_msi(0x50, false);
    platform.add_msix(0x70, 2, 0, 0x1000);
    platform.set_bar(0, 0xFEB0_0000);
    let bus = QemuPciBus::new(platform);
    let ops: &dyn PciBusOps = &bus;
    let dev: PciDevice = test_device();

    assert_eq!(pci_status(&ops.msi_register(&dev, 0x30)), 0);
    assert_eq!(pci_status(&ops.msix_register(&dev, 0x31, 1)), 0);
    assert_eq!(
        ops.msix_register(&dev, 0x32, 2),
        Err(PciError::IndexOutOfRange {
            index: 2,
            table_size: 2
        })
    );
    assert_eq!(pci_status(&ops.msix_register(&dev, 0x32, 2)), -22);
}

#[test]
fn map_without_pool_reports_enomem() {
    let bus = QemuPciBus::new(device_platform());
    let result = bus.map(&test_device(), 0x1_0000_0000, 0x1000);
    assert_eq!(result, Err(PciError::NoFallbackPool));
    assert_eq!(pci_status(&result), -12);
}
