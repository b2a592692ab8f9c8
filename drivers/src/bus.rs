//! QEMU x86_64 PCI bus registration.
//!
//! [`QemuPciBus`] bundles the config accessor, the BAR mapper and the two
//! interrupt programmers behind [`PciBusOps`], the table of operations the
//! generic PCI layer calls per device.  [`QemuPciBus::init`] prepares the BAR
//! pool and hands the table to the generic enumeration entry point.

use qemu_pci_abi::addr::VirtAddr;
use qemu_pci_lib::klog_info;
use qemu_pci_mm::SharedBarPool;

use crate::config::BAR_POOL_WORDS;
use crate::config_space::{pci_cfg_read, pci_cfg_write};
use crate::error::PciResult;
use crate::mapper::pci_map_mem;
use crate::msi::pci_msi_register;
use crate::msix::pci_msix_register;
use crate::pci_defs::PciDevice;
use crate::platform::PciPlatform;

/// Bus operations exposed to the generic PCI layer.
pub trait PciBusOps {
    /// Read `width` (1, 2 or 4) bytes of configuration space.
    fn cfg_read(&self, dev: &PciDevice, offset: u16, width: usize) -> u32;

    /// Write the low `width` (1, 2 or 4) bytes of `value` to configuration space.
    fn cfg_write(&self, dev: &PciDevice, offset: u16, value: u32, width: usize);

    /// Map `length` bytes of BAR memory at `addr`; returns the usable address.
    fn map(&self, dev: &PciDevice, addr: u64, length: usize) -> PciResult<VirtAddr>;

    /// Route MSI-X table entry `index` to platform `vector`.
    fn msix_register(&self, dev: &PciDevice, vector: u32, index: u32) -> PciResult;

    /// Route the device's MSI to platform `vector`.
    fn msi_register(&self, dev: &PciDevice, vector: u16) -> PciResult;
}

/// Generic PCI enumeration entry point, run once the bus is ready.
pub trait PciEnumerator {
    fn enumerate(&mut self, bus: &dyn PciBusOps);
}

/// PCI bus driver for the QEMU x86_64 board.
pub struct QemuPciBus<'a, P: PciPlatform, const WORDS: usize = BAR_POOL_WORDS> {
    platform: P,
    pool: Option<&'a SharedBarPool<WORDS>>,
}

impl<P: PciPlatform> QemuPciBus<'static, P> {
    /// Bus without a BAR fallback pool; unassigned and high BARs fail to map.
    pub const fn new(platform: P) -> Self {
        Self {
            platform,
            pool: None,
        }
    }

    /// Bus backed by the link-time `.pcibar` region, if one is built in.
    pub fn with_static_bar_pool(platform: P) -> Self {
        Self {
            platform,
            pool: static_pool(),
        }
    }
}

#[cfg(feature = "bar-page-pool")]
fn static_pool() -> Option<&'static SharedBarPool<BAR_POOL_WORDS>> {
    crate::bar_region::static_bar_pool()
}

#[cfg(not(feature = "bar-page-pool"))]
fn static_pool() -> Option<&'static SharedBarPool<BAR_POOL_WORDS>> {
    None
}

impl<'a, P: PciPlatform, const WORDS: usize> QemuPciBus<'a, P, WORDS> {
    pub const fn with_bar_pool(platform: P, pool: &'a SharedBarPool<WORDS>) -> Self {
        Self {
            platform,
            pool: Some(pool),
        }
    }

    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    pub fn bar_pool(&self) -> Option<&'a SharedBarPool<WORDS>> {
        self.pool
    }

    /// Bring the bus up: mark every pool page free, then run enumeration.
    ///
    /// Called once at boot.
    pub fn init<E: PciEnumerator + ?Sized>(&self, enumerator: &mut E) {
        match self.pool {
            Some(pool) => {
                pool.reset(&self.platform);
                let snapshot = pool.snapshot(&self.platform);
                klog_info!(
                    "PCI: BAR pool ready, {} pages at 0x{:x}",
                    snapshot.page_count(),
                    snapshot.base()
                );
            }
            None => klog_info!("PCI: no BAR pool, unassigned and high BARs are unmappable"),
        }

        klog_info!("PCI: QEMU x86_64 bus registered");
        enumerator.enumerate(self);
    }
}

impl<P: PciPlatform, const WORDS: usize> PciBusOps for QemuPciBus<'_, P, WORDS> {
    fn cfg_read(&self, dev: &PciDevice, offset: u16, width: usize) -> u32 {
        pci_cfg_read(&self.platform, dev, offset, width)
    }

    fn cfg_write(&self, dev: &PciDevice, offset: u16, value: u32, width: usize) {
        pci_cfg_write(&self.platform, dev, offset, value, width);
    }

    fn map(&self, dev: &PciDevice, addr: u64, length: usize) -> PciResult<VirtAddr> {
        pci_map_mem(&self.platform, self.pool, dev, addr, length)
    }

    fn msix_register(&self, dev: &PciDevice, vector: u32, index: u32) -> PciResult {
        pci_msix_register(&self.platform, dev, vector, index)
    }

    fn msi_register(&self, dev: &PciDevice, vector: u16) -> PciResult {
        pci_msi_register(&self.platform, dev, vector)
    }
}
