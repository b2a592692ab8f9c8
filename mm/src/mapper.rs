use qemu_pci_abi::addr::{PhysAddr, VirtAddr};

use crate::error::MmResult;
use crate::paging_defs::PageFlags;

/// Page-table installation primitives provided by the kernel.
///
/// Both calls cover `length` bytes starting at a page-aligned address and
/// must leave the range usable before returning.
pub trait RegionMapper {
    /// Identity-map `[phys, phys + length)`.
    fn map_region(&self, phys: PhysAddr, length: usize, flags: PageFlags) -> MmResult;

    /// Map `[virt, virt + length)` onto `[phys, phys + length)`.
    fn map_region_to(
        &self,
        virt: VirtAddr,
        phys: PhysAddr,
        length: usize,
        flags: PageFlags,
    ) -> MmResult;
}
