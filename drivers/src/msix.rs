//! MSI-X (Extended Message Signaled Interrupts) programming.
//!
//! Registering an MSI-X vector is a fixed sequence over config space and the
//! vector table in BAR memory.  The sequence is expressed as a chain of
//! states, each produced by the previous step:
//!
//! ```text
//! MsixLocated --mask_function(index)--> MsixMasked --write_entry()--> MsixEntryWritten
//!                                                                       |
//!                                                            unmask_function()
//! ```
//!
//! `mask_function` validates the table index and resolves the entry before
//! touching the device, and the masked state carries that entry, so only an
//! entry of the located device's table can be written.  Table entries can
//! only be written while the function mask is set, and the mask can only be
//! dropped after an entry has been written.
//!
//! ## Register layout reference (PCI Local Bus Spec §6.8.2)
//!
//! ```text
//! Config space (capability header):
//! Offset  Size  Field
//! +0x00   8     Cap ID (0x11) | Next Pointer
//! +0x02   16    Message Control (table size, function mask, enable)
//! +0x04   32    Table Offset / BIR
//!
//! BAR memory (MSI-X table, 16 bytes per entry):
//! +0x00   32    Message Address (lower)
//! +0x04   32    Message Address (upper)
//! +0x08   32    Message Data
//! +0x0C   32    Vector Control (bit 0 = mask)
//! ```

use bitflags::bitflags;
use qemu_pci_abi::addr::PhysAddr;
use qemu_pci_lib::{klog_debug, klog_info, klog_warn};

use crate::caps::{pci_bar_is_64bit, pci_find_capability, pci_get_bar32, pci_get_bar64};
use crate::config_space::{pci_cfg_read16, pci_cfg_read32, pci_cfg_write16};
use crate::error::{PciError, PciResult};
use crate::msi::msi_message_address;
use crate::pci_defs::{PCI_BAR_MEM_FLAGS_MASK, PCI_CAP_ID_MSIX, PCI_MAX_BARS, PciDevice};
use crate::platform::PciPlatform;

// =============================================================================
// Message Control register (offset +2 from capability base)
// =============================================================================

bitflags! {
    /// MSI-X Message Control flags.
    ///
    /// Values are built with `from_bits_retain` so the read-only table size
    /// field travels back unchanged on write.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MsixControl: u16 {
        /// All entries masked regardless of their vector control (bit 14).
        const FUNCTION_MASK = 1 << 14;
        /// MSI-X enable (bit 15).
        const ENABLE = 1 << 15;
    }
}

/// Table size mask (bits 10:0 of Message Control), encoded as N-1.
pub const MSIX_CTRL_TABLE_SIZE_MASK: u16 = 0x7FF;

// =============================================================================
// Register offsets (relative to capability base)
// =============================================================================

pub const MSIX_REG_CONTROL: u16 = 0x02;
pub const MSIX_REG_TABLE_OFFSET: u16 = 0x04;

/// BAR Indicator Register mask (bits 2:0 of Table Offset/BIR).
pub const MSIX_BIR_MASK: u32 = 0x7;

// =============================================================================
// MSI-X table entry layout (16 bytes per entry, MMIO)
// =============================================================================

pub const MSIX_ENTRY_ADDR_LO: u64 = 0x00;
pub const MSIX_ENTRY_ADDR_HI: u64 = 0x04;
pub const MSIX_ENTRY_DATA: u64 = 0x08;
pub const MSIX_ENTRY_VECTOR_CTRL: u64 = 0x0C;
pub const MSIX_ENTRY_SIZE: u64 = 16;

// =============================================================================
// Table view
// =============================================================================

/// Bounds-checked view of a device's MSI-X table in BAR memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsixTableView {
    base: PhysAddr,
    entries: u32,
}

impl MsixTableView {
    pub const fn new(base: PhysAddr, entries: u32) -> Self {
        Self { base, entries }
    }

    #[inline]
    pub const fn base(&self) -> PhysAddr {
        self.base
    }

    /// Number of entries (table size field + 1).
    #[inline]
    pub const fn entries(&self) -> u32 {
        self.entries
    }

    /// Handle for entry `index`, or [`PciError::IndexOutOfRange`].
    pub fn entry(&self, index: u32) -> PciResult<MsixEntry> {
        if index >= self.entries {
            return Err(PciError::IndexOutOfRange {
                index,
                table_size: self.entries,
            });
        }
        Ok(MsixEntry {
            index,
            addr: self.base.offset(MSIX_ENTRY_SIZE * index as u64),
        })
    }
}

/// One validated MSI-X table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsixEntry {
    index: u32,
    addr: PhysAddr,
}

impl MsixEntry {
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn addr(&self) -> PhysAddr {
        self.addr
    }

    #[inline]
    fn field(&self, offset: u64) -> PhysAddr {
        self.addr.offset(offset)
    }
}

// =============================================================================
// Programming states
// =============================================================================

/// MSI-X capability found; nothing written yet.
pub struct MsixLocated<'a, P: PciPlatform + ?Sized> {
    platform: &'a P,
    dev: PciDevice,
    cap: u16,
    control: u16,
}

/// Function mask set and MSI-X enabled; the selected entry may be written.
pub struct MsixMasked<'a, P: PciPlatform + ?Sized> {
    platform: &'a P,
    dev: PciDevice,
    cap: u16,
    control: MsixControl,
    entry: MsixEntry,
}

/// Entry written under the function mask; ready to unmask.
pub struct MsixEntryWritten<'a, P: PciPlatform + ?Sized> {
    platform: &'a P,
    dev: PciDevice,
    cap: u16,
    control: MsixControl,
}

impl<'a, P: PciPlatform + ?Sized> MsixLocated<'a, P> {
    /// Find the MSI-X capability and read its Message Control register.
    pub fn locate(platform: &'a P, dev: &PciDevice) -> PciResult<Self> {
        let cap = pci_find_capability(platform, dev, PCI_CAP_ID_MSIX)
            .ok_or(PciError::NoCapability {
                id: PCI_CAP_ID_MSIX,
            })? as u16;
        let control = pci_cfg_read16(platform, dev, cap + MSIX_REG_CONTROL);
        Ok(Self {
            platform,
            dev: *dev,
            cap,
            control,
        })
    }

    #[inline]
    pub const fn cap_offset(&self) -> u16 {
        self.cap
    }

    /// Raw Message Control value read at locate time.
    #[inline]
    pub const fn control(&self) -> u16 {
        self.control
    }

    /// Number of table entries the device implements.
    #[inline]
    pub const fn table_entries(&self) -> u32 {
        (self.control & MSIX_CTRL_TABLE_SIZE_MASK) as u32 + 1
    }

    /// Resolve the table location from the Table Offset/BIR register and the
    /// BAR it names.
    ///
    /// A reserved BIR or a BAR with no address yields
    /// [`PciError::InvalidTableBar`].
    pub fn table_view(&self) -> PciResult<MsixTableView> {
        let table_bir = pci_cfg_read32(self.platform, &self.dev, self.cap + MSIX_REG_TABLE_OFFSET);
        let bar = (table_bir & MSIX_BIR_MASK) as u8;
        if bar >= PCI_MAX_BARS {
            return Err(PciError::InvalidTableBar { bir: bar });
        }

        let raw = pci_get_bar32(self.platform, &self.dev, bar);
        let bar_addr = if pci_bar_is_64bit(raw) {
            pci_get_bar64(self.platform, &self.dev, bar)
        } else {
            raw as u64
        };
        let bar_addr = bar_addr & !PCI_BAR_MEM_FLAGS_MASK;
        if bar_addr == 0 {
            return Err(PciError::InvalidTableBar { bir: bar });
        }

        let base = bar_addr + (table_bir & !MSIX_BIR_MASK) as u64;
        Ok(MsixTableView::new(PhysAddr(base), self.table_entries()))
    }

    /// Validate `index` and resolve its table entry.
    ///
    /// The index is checked against Message Control before the table
    /// location is read.
    pub fn entry(&self, index: u32) -> PciResult<MsixEntry> {
        let entries = self.table_entries();
        if index >= entries {
            return Err(PciError::IndexOutOfRange {
                index,
                table_size: entries,
            });
        }
        self.table_view()?.entry(index)
    }

    /// Select table entry `index`, then enable MSI-X with the function mask
    /// set.
    ///
    /// Nothing is written when `index` or the table location is invalid.
    pub fn mask_function(self, index: u32) -> PciResult<MsixMasked<'a, P>> {
        let entry = self.entry(index)?;
        let control =
            MsixControl::from_bits_retain(self.control) | MsixControl::ENABLE | MsixControl::FUNCTION_MASK;
        pci_cfg_write16(
            self.platform,
            &self.dev,
            self.cap + MSIX_REG_CONTROL,
            control.bits(),
        );
        Ok(MsixMasked {
            platform: self.platform,
            dev: self.dev,
            cap: self.cap,
            control,
            entry,
        })
    }
}

impl<'a, P: PciPlatform + ?Sized> MsixMasked<'a, P> {
    /// The table entry selected when the function was masked.
    #[inline]
    pub const fn entry(&self) -> MsixEntry {
        self.entry
    }

    /// Program the selected entry to deliver `data` to the LAPIC at
    /// `address`.
    ///
    /// Writes address low, address high (0), data, then vector control (0,
    /// unmasked) in that order.
    pub fn write_entry(self, address: u32, data: u32) -> MsixEntryWritten<'a, P> {
        let entry = self.entry;
        self.platform.mmio_write32(entry.field(MSIX_ENTRY_ADDR_LO), address);
        self.platform.mmio_write32(entry.field(MSIX_ENTRY_ADDR_HI), 0);
        self.platform.mmio_write32(entry.field(MSIX_ENTRY_DATA), data);
        self.platform.mmio_write32(entry.field(MSIX_ENTRY_VECTOR_CTRL), 0);
        MsixEntryWritten {
            platform: self.platform,
            dev: self.dev,
            cap: self.cap,
            control: self.control,
        }
    }
}

impl<P: PciPlatform + ?Sized> MsixEntryWritten<'_, P> {
    /// Clear the function mask, leaving MSI-X enabled.
    pub fn unmask_function(self) {
        let control = self.control - MsixControl::FUNCTION_MASK;
        pci_cfg_write16(
            self.platform,
            &self.dev,
            self.cap + MSIX_REG_CONTROL,
            control.bits(),
        );
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Route MSI-X table entry `index` of `dev` to `vector` on the current CPU.
///
/// # Programming sequence
///
/// 1. Locate the MSI-X capability and read Message Control.
/// 2. Reject `index` beyond the table size.
/// 3. Resolve the table address from Table Offset/BIR and the named BAR
///    (64-bit BARs read as a pair); reject a reserved BIR or unassigned BAR.
/// 4. Write Message Control with enable and function mask set.
/// 5. Write the entry: address low, address high, data, vector control.
/// 6. Write Message Control with the function mask cleared.
///
/// # Errors
///
/// [`PciError::NoCapability`], [`PciError::IndexOutOfRange`] or
/// [`PciError::InvalidTableBar`]; no register is written in any case.
pub fn pci_msix_register<P: PciPlatform + ?Sized>(
    platform: &P,
    dev: &PciDevice,
    vector: u32,
    index: u32,
) -> PciResult {
    let located = match MsixLocated::locate(platform, dev) {
        Ok(located) => located,
        Err(err) => {
            klog_debug!("MSI-X: {} has no MSI-X capability", dev.bdf);
            return Err(err);
        }
    };

    let masked = match located.mask_function(index) {
        Ok(masked) => masked,
        Err(err) => {
            klog_warn!("MSI-X: BDF {}: {}", dev.bdf, err);
            return Err(err);
        }
    };

    let entry = masked.entry();
    let apic_id = platform.current_apic_id();
    masked
        .write_entry(msi_message_address(apic_id), vector)
        .unmask_function();

    klog_info!(
        "MSI-X: Configured BDF {} entry {} at 0x{:x} -> vector 0x{:02x}, APIC ID {}",
        dev.bdf,
        index,
        entry.addr(),
        vector,
        apic_id,
    );
    Ok(())
}
