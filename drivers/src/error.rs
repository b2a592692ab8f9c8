//! Error type for the PCI bus operations.

use core::fmt;

use qemu_pci_abi::errno::{EINVAL, ENOMEM, OK};
use qemu_pci_mm::MmError;

/// Failure of a bus capability-table operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciError {
    /// The device does not expose the requested capability.
    NoCapability { id: u8 },
    /// MSI-X table index beyond the device's table.
    IndexOutOfRange { index: u32, table_size: u32 },
    /// MSI-X Table BIR names a reserved or unassigned BAR.
    InvalidTableBar { bir: u8 },
    /// A BAR needs pool backing but no pool is configured.
    NoFallbackPool,
    /// The BAR pool has no run of free pages long enough.
    PoolExhausted { pages: usize },
    /// Installing the page-table mapping failed.
    Mapping(MmError),
}

impl PciError {
    /// Negative errno reported across the capability table.
    pub const fn errno(&self) -> i32 {
        match self {
            Self::NoCapability { .. }
            | Self::IndexOutOfRange { .. }
            | Self::InvalidTableBar { .. } => -EINVAL,
            Self::NoFallbackPool | Self::PoolExhausted { .. } | Self::Mapping(_) => -ENOMEM,
        }
    }
}

impl fmt::Display for PciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCapability { id } => write!(f, "capability 0x{:02x} not present", id),
            Self::IndexOutOfRange { index, table_size } => {
                write!(
                    f,
                    "MSI-X index {} outside table of {} entries",
                    index, table_size
                )
            }
            Self::InvalidTableBar { bir } => {
                write!(f, "MSI-X table BIR {} has no assigned BAR", bir)
            }
            Self::NoFallbackPool => write!(f, "no BAR fallback pool configured"),
            Self::PoolExhausted { pages } => {
                write!(f, "BAR pool cannot supply {} contiguous pages", pages)
            }
            Self::Mapping(err) => write!(f, "mapping failed: {}", err),
        }
    }
}

impl From<MmError> for PciError {
    fn from(err: MmError) -> Self {
        match err {
            MmError::NoMemory { pages } => Self::PoolExhausted { pages },
            other => Self::Mapping(other),
        }
    }
}

/// Convenience result type for bus operations.
pub type PciResult<T = ()> = Result<T, PciError>;

/// Fold a bus result into `0` or a negative errno.
pub fn pci_status<T>(result: &PciResult<T>) -> i32 {
    match result {
        Ok(_) => OK,
        Err(err) => err.errno(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_classes() {
        assert_eq!(PciError::NoCapability { id: 0x11 }.errno(), -22);
        assert_eq!(
            PciError::IndexOutOfRange {
                index: 4,
                table_size: 4
            }
            .errno(),
            -22
        );
        assert_eq!(PciError::InvalidTableBar { bir: 6 }.errno(), -22);
        assert_eq!(PciError::NoFallbackPool.errno(), -12);
        assert_eq!(PciError::from(MmError::NoMemory { pages: 3 }).errno(), -12);
        assert_eq!(PciError::from(MmError::MappingFailed), PciError::Mapping(MmError::MappingFailed));
    }

    #[test]
    fn status_folds_results() {
        assert_eq!(pci_status(&Ok::<u32, PciError>(7)), 0);
        assert_eq!(pci_status::<()>(&Err(PciError::NoCapability { id: 5 })), -22);
    }
}
