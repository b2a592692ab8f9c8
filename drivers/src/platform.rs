//! Board services consumed by the bus driver.
//!
//! Everything that touches real hardware sits behind [`PciPlatform`]:
//! configuration cycles, MMIO stores into BAR memory, the current CPU's APIC
//! ID, page-table installation and interrupt masking.  The QEMU board
//! implementation lives in [`crate::qemu_platform`]; tests use a recording
//! fake.

use qemu_pci_abi::addr::PhysAddr;
use qemu_pci_lib::InterruptControl;
use qemu_pci_mm::RegionMapper;

use crate::pci_defs::PciBdf;

/// Width of a single configuration space access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigWidth {
    Byte = 1,
    Word = 2,
    Dword = 4,
}

impl ConfigWidth {
    /// Map a byte count to an access width; only 1, 2 and 4 are valid.
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::Word),
            4 => Some(Self::Dword),
            _ => None,
        }
    }

    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Mask selecting the low `bytes()` bytes of a dword.
    #[inline]
    pub const fn value_mask(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Word => 0xFFFF,
            Self::Dword => 0xFFFF_FFFF,
        }
    }
}

/// Hardware primitives of the board the bus driver runs on.
pub trait PciPlatform: InterruptControl + RegionMapper {
    /// Read `width` bytes of configuration space at `offset`.
    ///
    /// The result is zero-extended; bits above the access width are zero.
    fn config_read(&self, bdf: PciBdf, offset: u16, width: ConfigWidth) -> u32;

    /// Write the low `width` bytes of `value` to configuration space.
    fn config_write(&self, bdf: PciBdf, offset: u16, value: u32, width: ConfigWidth);

    /// Volatile 32-bit store to device memory at physical address `addr`.
    fn mmio_write32(&self, addr: PhysAddr, value: u32);

    /// Local APIC ID of the CPU executing the call.
    fn current_apic_id(&self) -> u32;
}
