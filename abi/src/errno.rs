//! Status codes returned across the PCI capability table.
//!
//! `0` is success; failures are the negated errno value, matching the
//! contract the generic PCI layer expects from a bus implementation.

/// Success.
pub const OK: i32 = 0;

/// Out of memory (positive errno; negate before returning).
pub const ENOMEM: i32 = 12;

/// Invalid argument (positive errno; negate before returning).
pub const EINVAL: i32 = 22;
