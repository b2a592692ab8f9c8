//! BAR memory mapping.
//!
//! A BAR decoded below 4 GiB is mapped in place: the low window is identity
//! mapped, so the physical address doubles as the returned pointer.  A BAR
//! that is unassigned (address zero) or decoded above 4 GiB gets a virtual
//! home in the BAR page pool instead.  For an unassigned BAR the pool pages
//! themselves become the backing memory; for a high BAR the pool pages are
//! remapped onto the device's physical window.
//!
//! All mappings use [`PageFlags::BAR_MMIO`] (present, writable, uncached,
//! global).

use qemu_pci_abi::addr::{PhysAddr, VirtAddr};
use qemu_pci_lib::{align_up_usize, klog_debug, klog_error, klog_warn, span_count_usize};
use qemu_pci_mm::{IDENTITY_MAP_LIMIT, PAGE_SIZE_4KB_USIZE, PageFlags, SharedBarPool};

use crate::error::{PciError, PciResult};
use crate::pci_defs::PciDevice;
use crate::platform::PciPlatform;

/// Whether `addr` can be mapped where the device decodes it.
#[inline]
pub const fn pci_is_identity_mappable(addr: u64) -> bool {
    addr != 0 && addr < IDENTITY_MAP_LIMIT
}

/// Make `length` bytes of BAR memory at `addr` accessible to the kernel.
///
/// Returns the virtual address to use for the BAR.
///
/// # Errors
///
/// - [`PciError::NoFallbackPool`] when the BAR needs the pool and none is
///   configured.
/// - [`PciError::PoolExhausted`] when the pool has no run long enough.
/// - [`PciError::Mapping`] when the page-table layer refuses the mapping.  A
///   pool allocation made for the request is released first.
pub fn pci_map_mem<P: PciPlatform + ?Sized, const WORDS: usize>(
    platform: &P,
    pool: Option<&SharedBarPool<WORDS>>,
    dev: &PciDevice,
    addr: u64,
    length: usize,
) -> PciResult<VirtAddr> {
    if pci_is_identity_mappable(addr) {
        platform
            .map_region(PhysAddr(addr), length, PageFlags::BAR_MMIO)
            .map_err(PciError::Mapping)?;
        klog_debug!(
            "PCI: {} BAR 0x{:x} (+0x{:x}) mapped in place",
            dev.bdf,
            addr,
            length
        );
        return Ok(VirtAddr(addr));
    }

    let Some(pool) = pool else {
        klog_warn!(
            "PCI: {} BAR 0x{:x} needs pool backing but no pool is configured",
            dev.bdf,
            addr
        );
        return Err(PciError::NoFallbackPool);
    };

    let virt = pool
        .allocate(platform, length)
        .ok_or(PciError::PoolExhausted {
            pages: span_count_usize(length, PAGE_SIZE_4KB_USIZE),
        })?;

    // An unassigned BAR is backed by the pool pages themselves.
    let phys = if addr == 0 {
        virt.identity_phys()
    } else {
        PhysAddr(addr)
    };

    if let Err(err) = platform.map_region_to(virt, phys, length, PageFlags::BAR_MMIO) {
        if let Err(free_err) = pool.free(platform, virt, align_up_usize(length, PAGE_SIZE_4KB_USIZE)) {
            klog_error!(
                "PCI: {} could not return pool pages at 0x{:x}: {}",
                dev.bdf,
                virt,
                free_err
            );
        }
        return Err(PciError::Mapping(err));
    }

    klog_debug!(
        "PCI: {} BAR 0x{:x} (+0x{:x}) mapped at pool 0x{:x} -> phys 0x{:x}",
        dev.bdf,
        addr,
        length,
        virt,
        phys
    );
    Ok(virt)
}
