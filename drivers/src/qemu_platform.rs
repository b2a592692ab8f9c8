//! [`PciPlatform`] for the QEMU x86_64 (intel64) board.
//!
//! Configuration cycles use legacy port I/O mechanism #1 (0xCF8 address,
//! 0xCFC data).  Every access reads or writes the full dword; narrower reads
//! pick their byte lanes out of it and narrower writes merge into it
//! (read-modify-write).  BAR memory below 4 GiB is identity mapped, so MMIO
//! stores go straight to the physical address.

use x86_64::instructions::port::Port;

use qemu_pci_abi::addr::{PhysAddr, VirtAddr};
use qemu_pci_lib::ports::{PCI_CONFIG_ADDRESS, PCI_CONFIG_DATA};
use qemu_pci_lib::{InterruptControl, IrqState, X86InterruptControl};
use qemu_pci_mm::{MmResult, PageFlags, RegionMapper};

use crate::pci_defs::PciBdf;
use crate::platform::{ConfigWidth, PciPlatform};

/// CPUID leaf with the initial APIC ID in EBX bits 31:24.
const CPUID_LEAF_FEATURES: u32 = 0x01;

// =============================================================================
// Legacy configuration mechanism helpers
// =============================================================================

/// Compute the 32-bit address for legacy PCI configuration port I/O.
#[inline(always)]
pub const fn pio_config_address(bdf: PciBdf, offset: u16) -> u32 {
    0x8000_0000
        | ((bdf.bus as u32) << 16)
        | ((bdf.device as u32) << 11)
        | ((bdf.function as u32) << 8)
        | ((offset as u32) & 0xFC)
}

#[inline(always)]
const fn lane_shift(offset: u16, width: ConfigWidth) -> u32 {
    match width {
        ConfigWidth::Byte => ((offset & 0x3) * 8) as u32,
        ConfigWidth::Word => ((offset & 0x2) * 8) as u32,
        ConfigWidth::Dword => 0,
    }
}

/// Extract a `width`-sized field at `offset` from its containing dword.
#[inline]
pub const fn lane_extract(dword: u32, offset: u16, width: ConfigWidth) -> u32 {
    (dword >> lane_shift(offset, width)) & width.value_mask()
}

/// Replace the `width`-sized field at `offset` inside `dword`.
#[inline]
pub const fn lane_merge(dword: u32, offset: u16, value: u32, width: ConfigWidth) -> u32 {
    let shift = lane_shift(offset, width);
    let mask = width.value_mask() << shift;
    (dword & !mask) | ((value & width.value_mask()) << shift)
}

// =============================================================================
// Platform
// =============================================================================

/// QEMU board services; page-table installation is delegated to `M`.
pub struct QemuPlatform<M: RegionMapper> {
    mapper: M,
    irq: X86InterruptControl,
}

impl<M: RegionMapper> QemuPlatform<M> {
    pub const fn new(mapper: M) -> Self {
        Self {
            mapper,
            irq: X86InterruptControl,
        }
    }

    fn pio_read32(&self, bdf: PciBdf, offset: u16) -> u32 {
        let mut address = Port::<u32>::new(PCI_CONFIG_ADDRESS);
        let mut data = Port::<u32>::new(PCI_CONFIG_DATA);
        // SAFETY: CF8/CFC are the host bridge configuration ports on this board.
        unsafe {
            address.write(pio_config_address(bdf, offset));
            data.read()
        }
    }

    fn pio_write32(&self, bdf: PciBdf, offset: u16, value: u32) {
        let mut address = Port::<u32>::new(PCI_CONFIG_ADDRESS);
        let mut data = Port::<u32>::new(PCI_CONFIG_DATA);
        // SAFETY: CF8/CFC are the host bridge configuration ports on this board.
        unsafe {
            address.write(pio_config_address(bdf, offset));
            data.write(value);
        }
    }
}

impl<M: RegionMapper> InterruptControl for QemuPlatform<M> {
    #[inline]
    fn irq_save(&self) -> IrqState {
        self.irq.irq_save()
    }

    #[inline]
    fn irq_restore(&self, state: IrqState) {
        self.irq.irq_restore(state);
    }
}

impl<M: RegionMapper> RegionMapper for QemuPlatform<M> {
    fn map_region(&self, phys: PhysAddr, length: usize, flags: PageFlags) -> MmResult {
        self.mapper.map_region(phys, length, flags)
    }

    fn map_region_to(
        &self,
        virt: VirtAddr,
        phys: PhysAddr,
        length: usize,
        flags: PageFlags,
    ) -> MmResult {
        self.mapper.map_region_to(virt, phys, length, flags)
    }
}

impl<M: RegionMapper> PciPlatform for QemuPlatform<M> {
    fn config_read(&self, bdf: PciBdf, offset: u16, width: ConfigWidth) -> u32 {
        lane_extract(self.pio_read32(bdf, offset), offset, width)
    }

    fn config_write(&self, bdf: PciBdf, offset: u16, value: u32, width: ConfigWidth) {
        let dword = match width {
            ConfigWidth::Dword => value,
            _ => lane_merge(self.pio_read32(bdf, offset), offset, value, width),
        };
        self.pio_write32(bdf, offset, dword);
    }

    fn mmio_write32(&self, addr: PhysAddr, value: u32) {
        let ptr = addr.as_u64() as *mut u32;
        // SAFETY: the caller passes an address inside a mapped device BAR.
        unsafe { core::ptr::write_volatile(ptr, value) };
    }

    #[allow(unused_unsafe)]
    fn current_apic_id(&self) -> u32 {
        let res = unsafe { core::arch::x86_64::__cpuid(CPUID_LEAF_FEATURES) };
        (res.ebx >> 24) & 0xFF
    }
}
