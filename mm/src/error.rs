//! Error types for the memory side of the bus driver.

use core::fmt;

/// Memory management error.
///
/// Produced by the BAR page pool and by [`RegionMapper`](crate::mapper::RegionMapper)
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// No run of free pages long enough for the request.
    NoMemory { pages: usize },
    /// The page-table layer refused to install the mapping.
    MappingFailed,
    /// Null pointer or an address outside the managed region.
    InvalidAddress { address: u64 },
    /// A length or address was not a multiple of the required alignment.
    NotAligned { value: u64, required: u64 },
    /// A zero-length request where a length is mandatory.
    ZeroLength,
}

impl fmt::Display for MmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMemory { pages } => {
                write!(f, "no run of {} free pages available", pages)
            }
            Self::MappingFailed => write!(f, "page mapping operation failed"),
            Self::InvalidAddress { address } => write!(f, "invalid address {:#x}", address),
            Self::NotAligned { value, required } => {
                write!(f, "value {:#x} not aligned to {:#x}", value, required)
            }
            Self::ZeroLength => write!(f, "zero-length request"),
        }
    }
}

/// Convenience result type for memory management operations.
pub type MmResult<T = ()> = Result<T, MmError>;
