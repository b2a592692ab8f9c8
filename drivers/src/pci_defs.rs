//! PCI configuration space definitions and device handles.
//!
//! Single source of truth for PCI constants used by the bus driver.
//! Add new constants here only when a consumer exists.

use core::fmt;

// =============================================================================
// Configuration Space Register Offsets
// =============================================================================

/// Status register offset (16-bit).
pub const PCI_STATUS_OFFSET: u16 = 0x06;

/// Base Address Register 0 offset.
pub const PCI_BAR0_OFFSET: u16 = 0x10;

/// Capabilities pointer offset (8-bit, header type 0).
pub const PCI_CAP_PTR_OFFSET: u16 = 0x34;

/// Size of the legacy configuration space reachable through CF8/CFC.
pub const PCI_CONFIG_SPACE_SIZE: u16 = 0x100;

// =============================================================================
// Status Register Bits
// =============================================================================

/// Status: Capabilities list present (bit 4).
pub const PCI_STATUS_CAP_LIST: u16 = 0x10;

// =============================================================================
// Base Address Register Bits
// =============================================================================

/// Memory BAR type field value for a 64-bit BAR (bits 2:1 = 10b).
pub const PCI_BAR_64BIT: u32 = 0x4;

/// Low flag bits of a memory BAR (space, type, prefetchable).
pub const PCI_BAR_MEM_FLAGS_MASK: u64 = 0xF;

/// Maximum number of BARs per device.
pub const PCI_MAX_BARS: u8 = 6;

// =============================================================================
// Capability IDs
// =============================================================================

/// PCI Capability ID: Message Signaled Interrupts.
pub const PCI_CAP_ID_MSI: u8 = 0x05;

/// PCI Capability ID: MSI-X.
pub const PCI_CAP_ID_MSIX: u8 = 0x11;

// =============================================================================
// Device Handles
// =============================================================================

/// Bus/device/function address of a PCI function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PciBdf {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciBdf {
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device,
            function,
        }
    }
}

impl fmt::Display for PciBdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

/// A PCI function as handed to the bus driver by the enumeration layer.
///
/// The driver never caches anything about the device; capability offsets and
/// BAR contents are read from configuration space on every call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PciDevice {
    pub bdf: PciBdf,
}

impl PciDevice {
    pub const fn new(bdf: PciBdf) -> Self {
        Self { bdf }
    }

    #[inline]
    pub const fn bdf(&self) -> PciBdf {
        self.bdf
    }
}
