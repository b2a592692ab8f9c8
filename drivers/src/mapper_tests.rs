//! BAR mapping tests.

use qemu_pci_abi::addr::VirtAddr;
use qemu_pci_mm::{BarPagePool, MmError, PageFlags, SharedBarPool};

use crate::error::PciError;
use crate::mapper::{pci_is_identity_mappable, pci_map_mem};
use crate::test_fixtures::{Event, FakePlatform, test_device};

const POOL_BASE: VirtAddr = VirtAddr(0x80_0000);

fn two_page_pool() -> SharedBarPool<1> {
    SharedBarPool::new(BarPagePool::new(POOL_BASE, 2))
}

#[test]
fn threshold_is_strictly_below_four_gib() {
    assert!(!pci_is_identity_mappable(0));
    assert!(pci_is_identity_mappable(0x1000));
    assert!(pci_is_identity_mappable(0xFFFF_F000));
    assert!(!pci_is_identity_mappable(0x1_0000_0000));
}

#[test]
fn low_bar_maps_in_place_without_pool() {
    let platform = FakePlatform::new();
    let pool = two_page_pool();

    let ptr = pci_map_mem(&platform, Some(&pool), &test_device(), 0x1000, 0x1000).unwrap();
    assert_eq!(ptr, VirtAddr(0x1000));
    assert_eq!(
        platform.events(),
        [Event::Map {
            phys: 0x1000,
            length: 0x1000,
            flags: PageFlags::BAR_MMIO
        }]
    );
    assert_eq!(pool.snapshot(&platform).free_pages(), 2);
}

#[test]
fn unassigned_bar_is_backed_by_pool_pages() {
    let platform = FakePlatform::new();
    let pool = two_page_pool();

    let ptr = pci_map_mem(&platform, Some(&pool), &test_device(), 0, 0x2000).unwrap();
    assert_eq!(ptr, POOL_BASE);
    assert_eq!(
        platform.writes(),
        [Event::MapTo {
            virt: POOL_BASE.as_u64(),
            phys: POOL_BASE.as_u64(),
            length: 0x2000,
            flags: PageFlags::BAR_MMIO
        }]
    );
    // Pool scan ran inside one critical section.
    assert_eq!(platform.irq_sections(), 1);
    assert_eq!(pool.snapshot(&platform).free_pages(), 0);
}

#[test]
fn high_bar_is_remapped_through_pool() {
    let platform = FakePlatform::new();
    let pool = two_page_pool();

    let ptr = pci_map_mem(&platform, Some(&pool), &test_device(), 0x8_0000_0000, 0x800).unwrap();
    assert_eq!(ptr, POOL_BASE);
    assert_eq!(
        platform.writes(),
        [Event::MapTo {
            virt: POOL_BASE.as_u64(),
            phys: 0x8_0000_0000,
            length: 0x800,
            flags: PageFlags::BAR_MMIO
        }]
    );
    assert_eq!(pool.snapshot(&platform).free_pages(), 1);
}

#[test]
fn fallback_without_pool_fails() {
    let platform = FakePlatform::new();
    let err =
        pci_map_mem::<_, 1>(&platform, None, &test_device(), 0x1_0000_0000, 0x1000).unwrap_err();
    assert_eq!(err, PciError::NoFallbackPool);
    assert_eq!(err.errno(), -12);
    assert!(platform.events().is_empty());
}

#[test]
fn exhausted_pool_fails_without_mapping() {
    let platform = FakePlatform::new();
    let pool = two_page_pool();
    pci_map_mem(&platform, Some(&pool), &test_device(), 0, 0x2000).unwrap();
    platform.clear_events();

    let err = pci_map_mem(&platform, Some(&pool), &test_device(), 0, 0x1000).unwrap_err();
    assert_eq!(err, PciError::PoolExhausted { pages: 1 });
    assert!(platform.writes().is_empty());
}

#[test]
fn failed_remap_returns_pages_to_pool() {
    let platform = FakePlatform::new();
    let pool = two_page_pool();
    platform.fail_mapping(true);

    let err = pci_map_mem(&platform, Some(&pool), &test_device(), 0, 0x1800).unwrap_err();
    assert_eq!(err, PciError::Mapping(MmError::MappingFailed));
    assert_eq!(pool.snapshot(&platform).free_pages(), 2);
}

#[test]
fn failed_direct_map_is_reported() {
    let platform = FakePlatform::new();
    platform.fail_mapping(true);
    let err = pci_map_mem::<_, 1>(&platform, None, &test_device(), 0xFEB0_0000, 0x1000)
        .unwrap_err();
    assert_eq!(err, PciError::Mapping(MmError::MappingFailed));
}
