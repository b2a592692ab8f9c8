//! Link-time reservation backing the BAR page pool.
//!
//! [`BAR_PAGE_COUNT`] pages are reserved in the `.pcibar` section of the
//! bare-metal image.  The region is identity mapped by the kernel, so the
//! pool hands out addresses that are valid both as virtual pointers and as
//! physical backing for unassigned BARs.

use spin::Once;

use qemu_pci_abi::addr::VirtAddr;
use qemu_pci_mm::{BarPagePool, PAGE_SIZE_4KB_USIZE, SharedBarPool};

use crate::config::{BAR_PAGE_COUNT, BAR_POOL_WORDS};

const BAR_REGION_BYTES: usize = BAR_PAGE_COUNT * PAGE_SIZE_4KB_USIZE;

#[repr(C, align(4096))]
struct BarRegion([u8; BAR_REGION_BYTES]);

#[cfg_attr(target_os = "none", unsafe(link_section = ".pcibar"))]
static mut BAR_REGION: BarRegion = BarRegion([0; BAR_REGION_BYTES]);

static BAR_POOL: Once<SharedBarPool<BAR_POOL_WORDS>> = Once::new();

/// Start of the reserved region.
#[allow(unused_unsafe)]
pub fn bar_region_base() -> VirtAddr {
    // SAFETY: only the address is taken; the region is never accessed
    // through a Rust reference.
    let ptr = unsafe { &raw const BAR_REGION };
    VirtAddr(ptr as u64)
}

/// Pool over the `.pcibar` region, created on first use.
///
/// `None` when the build configures zero pages.
pub fn static_bar_pool() -> Option<&'static SharedBarPool<BAR_POOL_WORDS>> {
    if BAR_PAGE_COUNT == 0 {
        return None;
    }
    Some(BAR_POOL.call_once(|| {
        SharedBarPool::new(BarPagePool::new(bar_region_base(), BAR_PAGE_COUNT))
    }))
}
