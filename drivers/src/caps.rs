//! Capability list walking and BAR register access.
//!
//! Small utilities over the configuration space accessor that the interrupt
//! programmers rely on.  Offsets are resolved on every call; nothing about a
//! device is remembered between calls.

use crate::config_space::{pci_cfg_read8, pci_cfg_read16, pci_cfg_read32};
use crate::pci_defs::{
    PCI_BAR_64BIT, PCI_BAR0_OFFSET, PCI_CAP_PTR_OFFSET, PCI_MAX_BARS, PCI_STATUS_CAP_LIST,
    PCI_STATUS_OFFSET, PciDevice,
};
use crate::platform::PciPlatform;

/// One entry of a device's capability list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PciCapability {
    /// Config-space byte offset of the capability header.
    pub offset: u8,
    pub id: u8,
}

/// Iterator over PCI capabilities in a device's configuration space.
///
/// Walks the linked list starting from the Capabilities Pointer (offset 0x34).
/// Each header holds an 8-bit ID and the pointer to the next capability.
///
/// # Infinite-loop protection
///
/// A guard counter limits traversal to [`Self::MAX_CAPS`] entries so a
/// malformed (cyclic) list terminates.
pub struct PciCapabilityIter<'a, P: PciPlatform + ?Sized> {
    platform: &'a P,
    dev: PciDevice,
    next_ptr: u8,
    remaining: u8,
}

impl<'a, P: PciPlatform + ?Sized> PciCapabilityIter<'a, P> {
    /// Maximum capabilities to visit before assuming a malformed list.
    pub const MAX_CAPS: u8 = 48;

    /// Returns an empty iterator if the Status register does not advertise a
    /// capabilities list.
    pub fn new(platform: &'a P, dev: &PciDevice) -> Self {
        let status = pci_cfg_read16(platform, dev, PCI_STATUS_OFFSET);
        let first_ptr = if (status & PCI_STATUS_CAP_LIST) != 0 {
            // Bottom 2 bits of the Capabilities Pointer are reserved.
            pci_cfg_read8(platform, dev, PCI_CAP_PTR_OFFSET) & 0xFC
        } else {
            0
        };

        Self {
            platform,
            dev: *dev,
            next_ptr: first_ptr,
            remaining: Self::MAX_CAPS,
        }
    }
}

impl<P: PciPlatform + ?Sized> Iterator for PciCapabilityIter<'_, P> {
    type Item = PciCapability;

    fn next(&mut self) -> Option<PciCapability> {
        if self.next_ptr == 0 || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let offset = self.next_ptr;
        let id = pci_cfg_read8(self.platform, &self.dev, offset as u16);
        let next = pci_cfg_read8(self.platform, &self.dev, offset as u16 + 1) & 0xFC;

        self.next_ptr = next;
        Some(PciCapability { offset, id })
    }
}

/// Find the first capability with the given ID.
///
/// Returns the config-space byte offset of the capability header.
pub fn pci_find_capability<P: PciPlatform + ?Sized>(
    platform: &P,
    dev: &PciDevice,
    cap_id: u8,
) -> Option<u8> {
    PciCapabilityIter::new(platform, dev)
        .find(|cap| cap.id == cap_id)
        .map(|cap| cap.offset)
}

/// Whether a raw memory BAR value decodes as a 64-bit BAR.
#[inline]
pub const fn pci_bar_is_64bit(raw: u32) -> bool {
    (raw & PCI_BAR_64BIT) == PCI_BAR_64BIT
}

#[inline]
fn bar_offset(index: u8) -> u16 {
    PCI_BAR0_OFFSET + (index as u16) * 4
}

/// Raw 32-bit value of BAR `index`, flag bits included.
///
/// Indices past the last BAR read as zero.
pub fn pci_get_bar32<P: PciPlatform + ?Sized>(platform: &P, dev: &PciDevice, index: u8) -> u32 {
    if index >= PCI_MAX_BARS {
        return 0;
    }
    pci_cfg_read32(platform, dev, bar_offset(index))
}

/// Raw 64-bit value of the BAR pair starting at `index`, flag bits included.
///
/// The upper half comes from BAR `index + 1`; a pair that would run past the
/// last BAR reads its upper half as zero.
pub fn pci_get_bar64<P: PciPlatform + ?Sized>(platform: &P, dev: &PciDevice, index: u8) -> u64 {
    let low = pci_get_bar32(platform, dev, index) as u64;
    let high = pci_get_bar32(platform, dev, index.saturating_add(1)) as u64;
    (high << 32) | low
}
