//! Fallback page pool for PCI BAR windows.
//!
//! A fixed, page-aligned region reserved at link time backs BARs that cannot
//! be mapped where the device asked: unassigned BARs (address zero) and BARs
//! decoded above the 4 GiB identity window.  Each page is tracked by one bit
//! in a `u64` bitmap (set = allocated).
//!
//! # Allocation policy
//!
//! First fit, scanning from the start of the pool on every call.  The scan
//! counts consecutive free pages and restarts the count at the page after any
//! allocated one; the first run reaching the requested length wins.  There is
//! no free list and no skip-ahead, so heavy fragmentation can starve large
//! requests even when enough pages are free in total.  Pools are a few dozen
//! pages, which keeps the linear rescan cheap.
//!
//! # Concurrency
//!
//! [`BarPagePool`] itself is plain data.  [`SharedBarPool`] wraps it in an
//! [`IrqMutex`] so every scan-and-mark and scan-and-clear runs with interrupts
//! disabled and can never interleave with another allocate or free.

use qemu_pci_abi::addr::VirtAddr;
use qemu_pci_lib::{InterruptControl, IrqMutex, klog_debug, klog_warn, span_count_usize};

use crate::error::{MmError, MmResult};
use crate::paging_defs::{PAGE_SIZE_4KB, PAGE_SIZE_4KB_USIZE};

const BITS_PER_WORD: usize = u64::BITS as usize;

/// Number of bitmap words needed to track `pages` pages.
#[inline]
pub const fn bitmap_words(pages: usize) -> usize {
    pages.div_ceil(BITS_PER_WORD)
}

#[inline(always)]
const fn bit_of(page: usize) -> (usize, u64) {
    (page / BITS_PER_WORD, 1u64 << (page % BITS_PER_WORD))
}

/// Bitmap-tracked arena of contiguous pages.
///
/// `WORDS` sizes the bitmap; the pool may manage fewer pages than the bitmap
/// can describe, and bits past `page_count` are never set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarPagePool<const WORDS: usize> {
    base: VirtAddr,
    page_count: usize,
    bitmap: [u64; WORDS],
}

impl<const WORDS: usize> BarPagePool<WORDS> {
    /// Largest page count the bitmap can track.
    pub const CAPACITY: usize = WORDS * BITS_PER_WORD;

    /// Create an empty pool of `page_count` pages starting at `base`.
    ///
    /// # Panics
    ///
    /// Panics if `base` is not page aligned or `page_count` exceeds
    /// [`Self::CAPACITY`].
    pub const fn new(base: VirtAddr, page_count: usize) -> Self {
        assert!(base.is_aligned(PAGE_SIZE_4KB), "BAR pool base must be page aligned");
        assert!(page_count <= Self::CAPACITY, "BAR pool larger than its bitmap");
        Self {
            base,
            page_count,
            bitmap: [0; WORDS],
        }
    }

    /// Mark every page free.
    pub fn reset(&mut self) {
        self.bitmap = [0; WORDS];
    }

    #[inline]
    pub const fn base(&self) -> VirtAddr {
        self.base
    }

    #[inline]
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Whether `addr` lies inside the pool region.
    pub fn contains(&self, addr: VirtAddr) -> bool {
        let start = self.base.as_u64();
        let len = (self.page_count as u64) * PAGE_SIZE_4KB;
        addr.as_u64() >= start && addr.as_u64() - start < len
    }

    pub fn is_allocated(&self, page: usize) -> bool {
        if page >= self.page_count {
            return false;
        }
        let (word, mask) = bit_of(page);
        self.bitmap[word] & mask != 0
    }

    pub fn free_pages(&self) -> usize {
        let used: u32 = self.bitmap.iter().map(|w| w.count_ones()).sum();
        self.page_count - used as usize
    }

    /// Reserve enough contiguous pages for `size` bytes.
    ///
    /// `size` is rounded up to whole pages.  Returns the address of the first
    /// page of the run, or `None` for `size == 0` and when no run is long
    /// enough.
    pub fn allocate(&mut self, size: usize) -> Option<VirtAddr> {
        if size == 0 {
            return None;
        }
        let pages = span_count_usize(size, PAGE_SIZE_4KB_USIZE);
        let start = self.find_run(pages)?;

        for page in start..start + pages {
            let (word, mask) = bit_of(page);
            self.bitmap[word] |= mask;
        }

        Some(self.page_addr(start))
    }

    /// Release a run previously returned by [`allocate`](Self::allocate).
    ///
    /// `ptr` and `size` must be exactly what was allocated (with `size` in
    /// whole pages).  Obviously malformed requests are rejected without
    /// touching the bitmap.  A well-formed range is cleared unconditionally;
    /// freeing the same run twice is not detected.
    pub fn free(&mut self, ptr: VirtAddr, size: usize) -> MmResult {
        if size == 0 {
            return Err(MmError::ZeroLength);
        }
        if size % PAGE_SIZE_4KB_USIZE != 0 {
            return Err(MmError::NotAligned {
                value: size as u64,
                required: PAGE_SIZE_4KB,
            });
        }
        if ptr.is_null() {
            return Err(MmError::InvalidAddress { address: 0 });
        }
        if !ptr.is_aligned(PAGE_SIZE_4KB) {
            return Err(MmError::NotAligned {
                value: ptr.as_u64(),
                required: PAGE_SIZE_4KB,
            });
        }
        if !self.contains(ptr) {
            return Err(MmError::InvalidAddress {
                address: ptr.as_u64(),
            });
        }

        let start = ((ptr.as_u64() - self.base.as_u64()) / PAGE_SIZE_4KB) as usize;
        let pages = size / PAGE_SIZE_4KB_USIZE;
        if pages > self.page_count - start {
            return Err(MmError::InvalidAddress {
                address: ptr.as_u64(),
            });
        }

        for page in start..start + pages {
            let (word, mask) = bit_of(page);
            self.bitmap[word] &= !mask;
        }
        Ok(())
    }

    fn find_run(&self, pages: usize) -> Option<usize> {
        if pages > self.page_count {
            return None;
        }
        let mut run = 0usize;
        for page in 0..self.page_count {
            if self.is_allocated(page) {
                run = 0;
                continue;
            }
            run += 1;
            if run == pages {
                return Some(page + 1 - pages);
            }
        }
        None
    }

    #[inline]
    fn page_addr(&self, page: usize) -> VirtAddr {
        self.base.offset((page as u64) * PAGE_SIZE_4KB)
    }
}

/// [`BarPagePool`] behind an interrupt-disabling lock.
pub struct SharedBarPool<const WORDS: usize> {
    inner: IrqMutex<BarPagePool<WORDS>>,
}

impl<const WORDS: usize> SharedBarPool<WORDS> {
    pub const fn new(pool: BarPagePool<WORDS>) -> Self {
        Self {
            inner: IrqMutex::new(pool),
        }
    }

    pub fn allocate<C: InterruptControl + ?Sized>(&self, irq: &C, size: usize) -> Option<VirtAddr> {
        let result = self.inner.lock(irq).allocate(size);
        match result {
            Some(addr) => klog_debug!(
                "PCI BAR pool: allocated {} bytes at 0x{:x}",
                size,
                addr.as_u64()
            ),
            None if size != 0 => klog_warn!(
                "PCI BAR pool: no run of {} pages left",
                span_count_usize(size, PAGE_SIZE_4KB_USIZE)
            ),
            None => {}
        }
        result
    }

    pub fn free<C: InterruptControl + ?Sized>(&self, irq: &C, ptr: VirtAddr, size: usize) -> MmResult {
        let result = self.inner.lock(irq).free(ptr, size);
        if let Err(err) = result {
            klog_warn!(
                "PCI BAR pool: rejected free of {} bytes at 0x{:x}: {}",
                size,
                ptr.as_u64(),
                err
            );
        }
        result
    }

    /// Mark the whole pool free.  Only called during bus bring-up.
    pub fn reset<C: InterruptControl + ?Sized>(&self, irq: &C) {
        self.inner.lock(irq).reset();
    }

    /// Copy of the current pool state, taken under the lock.
    pub fn snapshot<C: InterruptControl + ?Sized>(&self, irq: &C) -> BarPagePool<WORDS> {
        *self.inner.lock(irq)
    }
}
