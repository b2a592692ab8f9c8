//! MSI (Message Signaled Interrupts) programming.
//!
//! Points a device's single MSI message at the LAPIC of the CPU running the
//! registration, carrying the platform vector as message data.
//!
//! ## Register layout reference (PCI Local Bus Spec §6.8)
//!
//! ```text
//! Offset  Size  Field
//! +0x00   8     Cap ID (0x05) | Next Pointer
//! +0x02   16    Message Control
//! +0x04   32    Message Address (lower)
//! +0x08   32    Message Address (upper), 64-bit capable only
//! +0x08/C 16    Message Data
//! ```

use qemu_pci_lib::{klog_debug, klog_info};

use crate::caps::pci_find_capability;
use crate::config_space::{pci_cfg_read16, pci_cfg_write16, pci_cfg_write32};
use crate::error::{PciError, PciResult};
use crate::pci_defs::{PCI_CAP_ID_MSI, PciDevice};
use crate::platform::PciPlatform;

// =============================================================================
// MSI Message Control register bits (offset +2 from capability base)
// =============================================================================

/// MSI enable bit (bit 0 of Message Control).
pub const MSI_CTRL_ENABLE: u16 = 1 << 0;

/// 64-bit address capable (bit 7).
pub const MSI_CTRL_64BIT: u16 = 1 << 7;

// =============================================================================
// Register offsets (relative to capability base)
// =============================================================================

pub const MSI_REG_CONTROL: u16 = 0x02;
pub const MSI_REG_ADDR_LO: u16 = 0x04;
pub const MSI_REG_ADDR_HI: u16 = 0x08;
pub const MSI_REG_DATA_32: u16 = 0x08;
pub const MSI_REG_DATA_64: u16 = 0x0C;

// =============================================================================
// x86 LAPIC message address format (Intel SDM Vol. 3A §10.11.1)
// =============================================================================

/// Fixed base address for MSI messages on x86 (LAPIC doorbell region).
pub const MSI_ADDR_BASE: u32 = 0xFEE0_0000;

/// Shift for the destination APIC ID in the message address.
pub const MSI_ADDR_DEST_ID_SHIFT: u32 = 12;

/// Message address targeting the LAPIC with `apic_id` (physical mode).
///
/// Shared by MSI and MSI-X.
#[inline]
pub const fn msi_message_address(apic_id: u32) -> u32 {
    MSI_ADDR_BASE | (apic_id << MSI_ADDR_DEST_ID_SHIFT)
}

// =============================================================================
// Programming phases
// =============================================================================

/// Config-space offset of the MSI capability, or [`PciError::NoCapability`].
pub fn msi_locate<P: PciPlatform + ?Sized>(platform: &P, dev: &PciDevice) -> PciResult<u16> {
    pci_find_capability(platform, dev, PCI_CAP_ID_MSI)
        .map(u16::from)
        .ok_or(PciError::NoCapability { id: PCI_CAP_ID_MSI })
}

/// Pick the Message Data register for the capability at `cap`.
///
/// A 64-bit capable function has its upper address register cleared here, so
/// the message always targets the LAPIC window below 4 GiB.
pub fn msi_select_data_register<P: PciPlatform + ?Sized>(
    platform: &P,
    dev: &PciDevice,
    cap: u16,
) -> u16 {
    let control = pci_cfg_read16(platform, dev, cap + MSI_REG_CONTROL);
    if (control & MSI_CTRL_64BIT) != 0 {
        pci_cfg_write32(platform, dev, cap + MSI_REG_ADDR_HI, 0);
        cap + MSI_REG_DATA_64
    } else {
        cap + MSI_REG_DATA_32
    }
}

/// Route the device's MSI to `vector` on the current CPU.
///
/// # Programming sequence
///
/// 1. Locate the MSI capability.
/// 2. Write Message Address (LAPIC base + current APIC ID).
/// 3. Read Message Control; on a 64-bit capable function clear the upper
///    address and use the data register at +0xC, otherwise at +0x8.
/// 4. Write `vector` to Message Data.
/// 5. Write `vector` to Message Control, then write the enable bit alone.
///
/// # Errors
///
/// Returns [`PciError::NoCapability`] if the device has no MSI capability.
/// Nothing is written in that case.
pub fn pci_msi_register<P: PciPlatform + ?Sized>(
    platform: &P,
    dev: &PciDevice,
    vector: u16,
) -> PciResult {
    let cap = match msi_locate(platform, dev) {
        Ok(cap) => cap,
        Err(err) => {
            klog_debug!("MSI: {} has no MSI capability", dev.bdf);
            return Err(err);
        }
    };

    let apic_id = platform.current_apic_id();
    pci_cfg_write32(platform, dev, cap + MSI_REG_ADDR_LO, msi_message_address(apic_id));

    let data_reg = msi_select_data_register(platform, dev, cap);
    pci_cfg_write16(platform, dev, data_reg, vector);

    pci_cfg_write16(platform, dev, cap + MSI_REG_CONTROL, vector);
    pci_cfg_write16(platform, dev, cap + MSI_REG_CONTROL, MSI_CTRL_ENABLE);

    klog_info!(
        "MSI: Configured BDF {} -> vector 0x{:02x}, APIC ID {}{}",
        dev.bdf,
        vector,
        apic_id,
        if data_reg == cap + MSI_REG_DATA_64 {
            ", 64-bit"
        } else {
            ""
        },
    );
    Ok(())
}
