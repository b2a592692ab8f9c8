//! Shared types for the QEMU x86_64 PCI bus driver.
//!
//! Address newtypes and the negative status codes handed back to the generic
//! PCI layer live here so that every crate in the workspace agrees on them.

#![no_std]
#![forbid(unsafe_code)]

pub mod addr;
pub mod errno;

#[cfg(test)]
extern crate std;

/// Standard 4KB page size.
pub const PAGE_SIZE: u64 = 0x1000;

pub use addr::*;
pub use errno::{EINVAL, ENOMEM, OK};
