#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]

#[cfg(feature = "bar-page-pool")]
pub mod bar_region;
pub mod bus;
pub mod caps;
pub mod config;
pub mod config_space;
pub mod error;
pub mod mapper;
pub mod msi;
pub mod msix;
pub mod pci_defs;
pub mod platform;
#[cfg(target_arch = "x86_64")]
pub mod qemu_platform;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod test_fixtures;

#[cfg(test)]
mod bus_tests;
#[cfg(test)]
mod mapper_tests;

pub use bus::{PciBusOps, PciEnumerator, QemuPciBus};
pub use error::{PciError, PciResult, pci_status};
pub use pci_defs::{PciBdf, PciDevice};
pub use platform::{ConfigWidth, PciPlatform};
