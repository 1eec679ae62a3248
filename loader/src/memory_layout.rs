/*++
Licensed under the Apache-2.0 license.

File Name:

    memory_layout.rs

Abstract:

    The file contains the layout of memory. The constants defined
    in this file define the default memory layout of the target.

--*/

use alloc::vec;
use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};

//
// Memory Addresses
//
pub const DRAM_ORG: u64 = 0x8000_0000;
pub const STAGE_CODE_ORG: u64 = 0x8FF0_0000;
pub const STAGE_DATA_ORG: u64 = 0x8FF8_0000;
pub const STAGE_STACK_ORG: u64 = 0x8FFC_0000;

//
// Memory Sizes In Bytes
//
pub const DRAM_SIZE: u64 = 256 * 1024 * 1024;
pub const STAGE_CODE_SIZE: u64 = 512 * 1024;
pub const STAGE_DATA_SIZE: u64 = 256 * 1024;
pub const STAGE_STACK_SIZE: u64 = 256 * 1024;

/// Contiguous range of physical addresses
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryRegion {
    pub start: u64,
    pub size: u64,
}

impl MemoryRegion {
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// Exclusive end address, `None` when it does not fit in 64 bits
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.size)
    }

    /// Returns true if `other` lies entirely inside this region
    pub fn contains(&self, other: &MemoryRegion) -> bool {
        match (self.end(), other.end()) {
            (Some(end), Some(other_end)) => other.start >= self.start && other_end <= end,
            _ => false,
        }
    }

    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        match (self.end(), other.end()) {
            (Some(end), Some(other_end)) => {
                self.size != 0 && other.size != 0 && self.start < other_end && other.start < end
            }
            _ => true,
        }
    }
}

/// RAM regions images may be placed in, and the regions the running stage
/// occupies
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    ram: Vec<MemoryRegion>,
    reserved: Vec<MemoryRegion>,
}

impl MemoryLayout {
    /// Create a layout. Every region must fit the address space.
    pub fn new(ram: Vec<MemoryRegion>, reserved: Vec<MemoryRegion>) -> VbootResult<Self> {
        if ram.is_empty() || ram.iter().chain(&reserved).any(|r| r.end().is_none()) {
            return Err(VbootError::CONFIG_BAD_MEMORY_LAYOUT);
        }
        Ok(Self { ram, reserved })
    }

    pub fn ram(&self) -> &[MemoryRegion] {
        &self.ram
    }

    pub fn reserved(&self) -> &[MemoryRegion] {
        &self.reserved
    }

    /// Returns true if `region` is inside a single RAM region
    pub fn in_ram(&self, region: &MemoryRegion) -> bool {
        self.ram.iter().any(|ram| ram.contains(region))
    }

    /// Returns true if `region` touches memory used by the running stage
    pub fn overlaps_reserved(&self, region: &MemoryRegion) -> bool {
        self.reserved.iter().any(|r| r.overlaps(region))
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            ram: vec![MemoryRegion::new(DRAM_ORG, DRAM_SIZE)],
            reserved: vec![
                MemoryRegion::new(STAGE_CODE_ORG, STAGE_CODE_SIZE),
                MemoryRegion::new(STAGE_DATA_ORG, STAGE_DATA_SIZE),
                MemoryRegion::new(STAGE_STACK_ORG, STAGE_STACK_SIZE),
            ],
        }
    }
}

#[test]
#[allow(clippy::assertions_on_constants)]
fn mem_layout_test_stage() {
    assert_eq!(STAGE_DATA_ORG - STAGE_CODE_ORG, STAGE_CODE_SIZE);
    assert_eq!(STAGE_STACK_ORG - STAGE_DATA_ORG, STAGE_DATA_SIZE);
    assert_eq!(STAGE_STACK_ORG + STAGE_STACK_SIZE, DRAM_ORG + DRAM_SIZE);
}

#[test]
fn mem_layout_test_default() {
    let layout = MemoryLayout::default();
    for region in layout.reserved() {
        assert!(layout.in_ram(region));
    }
    assert!(layout.in_ram(&MemoryRegion::new(DRAM_ORG, 0x1000)));
    assert!(!layout.in_ram(&MemoryRegion::new(DRAM_ORG - 1, 0x10)));
    assert!(!layout.in_ram(&MemoryRegion::new(DRAM_ORG + DRAM_SIZE - 4, 8)));
    assert!(layout.overlaps_reserved(&MemoryRegion::new(STAGE_CODE_ORG - 4, 8)));
    assert!(!layout.overlaps_reserved(&MemoryRegion::new(STAGE_CODE_ORG - 4, 4)));
}

#[test]
fn mem_layout_test_rejects_overflow() {
    assert_eq!(
        MemoryLayout::new(vec![MemoryRegion::new(u64::MAX, 2)], vec![]),
        Err(VbootError::CONFIG_BAD_MEMORY_LAYOUT)
    );
    assert_eq!(
        MemoryLayout::new(vec![], vec![]),
        Err(VbootError::CONFIG_BAD_MEMORY_LAYOUT)
    );
}
