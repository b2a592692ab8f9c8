#![no_std]

pub mod bar_pool;
pub mod error;
pub mod mapper;
pub mod paging_defs;

#[cfg(test)]
extern crate std;


pub use bar_pool::{BarPagePool, SharedBarPool, bitmap_words};
pub use error::{MmError, MmResult};
pub use mapper::RegionMapper;
pub use paging_defs::{IDENTITY_MAP_LIMIT, PAGE_SIZE_4KB, PAGE_SIZE_4KB_USIZE, PageFlags};
