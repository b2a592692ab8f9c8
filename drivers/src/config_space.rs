//! Configuration space accessor.
//!
//! Pass-through from the capability table to the platform's configuration
//! cycle primitive.  Nothing is cached and nothing beyond the hardware access
//! happens here.  The access width must be 1, 2 or 4 bytes and the access
//! must lie inside the 256-byte legacy configuration space; the CF8/CFC
//! mechanism cannot address anything above it.  Either violation is a caller
//! bug and panics.

use crate::pci_defs::{PCI_CONFIG_SPACE_SIZE, PciDevice};
use crate::platform::{ConfigWidth, PciPlatform};

#[inline]
fn checked_width(width: usize) -> ConfigWidth {
    match ConfigWidth::from_bytes(width) {
        Some(width) => width,
        None => panic!("PCI config access of {} bytes is not supported", width),
    }
}

#[inline]
fn checked_access(offset: u16, width: usize) -> ConfigWidth {
    let width = checked_width(width);
    if offset as usize + width.bytes() > PCI_CONFIG_SPACE_SIZE as usize {
        panic!(
            "PCI config access of {} bytes at 0x{:x} is outside config space",
            width.bytes(),
            offset
        );
    }
    width
}

/// Read `width` bytes at `offset` of `dev`'s configuration space.
///
/// # Panics
///
/// Panics if `width` is not 1, 2 or 4, or if the access extends past offset
/// 0xFF.
pub fn pci_cfg_read<P: PciPlatform + ?Sized>(
    platform: &P,
    dev: &PciDevice,
    offset: u16,
    width: usize,
) -> u32 {
    platform.config_read(dev.bdf, offset, checked_access(offset, width))
}

/// Write the low `width` bytes of `value` at `offset`.
///
/// # Panics
///
/// Panics if `width` is not 1, 2 or 4, or if the access extends past offset
/// 0xFF.
pub fn pci_cfg_write<P: PciPlatform + ?Sized>(
    platform: &P,
    dev: &PciDevice,
    offset: u16,
    value: u32,
    width: usize,
) {
    platform.config_write(dev.bdf, offset, value, checked_access(offset, width));
}

#[inline]
pub fn pci_cfg_read8<P: PciPlatform + ?Sized>(platform: &P, dev: &PciDevice, offset: u16) -> u8 {
    platform.config_read(dev.bdf, offset, ConfigWidth::Byte) as u8
}

#[inline]
pub fn pci_cfg_read16<P: PciPlatform + ?Sized>(platform: &P, dev: &PciDevice, offset: u16) -> u16 {
    platform.config_read(dev.bdf, offset, ConfigWidth::Word) as u16
}

#[inline]
pub fn pci_cfg_read32<P: PciPlatform + ?Sized>(platform: &P, dev: &PciDevice, offset: u16) -> u32 {
    platform.config_read(dev.bdf, offset, ConfigWidth::Dword)
}

#[inline]
pub fn pci_cfg_write16<P: PciPlatform + ?Sized>(
    platform: &P,
    dev: &PciDevice,
    offset: u16,
    value: u16,
) {
    platform.config_write(dev.bdf, offset, value as u32, ConfigWidth::Word);
}

#[inline]
pub fn pci_cfg_write32<P: PciPlatform + ?Sized>(
    platform: &P,
    dev: &PciDevice,
    offset: u16,
    value: u32,
) {
    platform.config_write(dev.bdf, offset, value, ConfigWidth::Dword);
}
