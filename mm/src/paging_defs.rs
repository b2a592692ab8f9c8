//! Page table flags and paging constants.
//!
//! Only the flags a BAR mapping can ask for are defined; the page-table
//! walker that consumes them belongs to the kernel, behind
//! [`RegionMapper`](crate::mapper::RegionMapper).

use bitflags::bitflags;

bitflags! {
    /// x86_64 page table entry flags.
    ///
    /// ```ignore
    /// use qemu_pci_mm::paging_defs::PageFlags;
    ///
    /// let flags = PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::CACHE_DISABLE;
    /// mapper.map_region(phys, len, flags)?;
    /// ```
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PageFlags: u64 {
        /// Page is present in memory (bit 0).
        const PRESENT       = 1 << 0;
        /// Page is writable (otherwise read-only) (bit 1).
        const WRITABLE      = 1 << 1;
        /// Write-through caching (vs write-back) (bit 3).
        const WRITE_THROUGH = 1 << 3;
        /// Disable caching for this page (bit 4).
        const CACHE_DISABLE = 1 << 4;
        /// Page is global (not flushed on CR3 change) (bit 8).
        const GLOBAL        = 1 << 8;
        /// Disable instruction fetch from this page (bit 63).
        const NO_EXECUTE    = 1 << 63;

        // =====================================================================
        // Convenience Combinations
        // =====================================================================

        /// Kernel read-write page (PRESENT | WRITABLE).
        const KERNEL_RW = Self::PRESENT.bits() | Self::WRITABLE.bits();
        /// Device BAR window: uncached, visible in every address space.
        const BAR_MMIO = Self::PRESENT.bits()
            | Self::WRITABLE.bits()
            | Self::CACHE_DISABLE.bits()
            | Self::GLOBAL.bits();
    }
}

// =============================================================================
// Page Sizes
// =============================================================================

/// 4KB page size (standard).
pub const PAGE_SIZE_4KB: u64 = 0x1000;

/// 4KB page size as usize for array indexing and size calculations.
pub const PAGE_SIZE_4KB_USIZE: usize = PAGE_SIZE_4KB as usize;

/// End of the identity-mapped low window (4 GiB).
///
/// Physical addresses below this are reachable 1:1 and can be mapped in
/// place; anything at or above it needs a separate virtual home.
pub const IDENTITY_MAP_LIMIT: u64 = 0x1_0000_0000;
