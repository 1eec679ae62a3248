/*++

Licensed under the Apache-2.0 license.

File Name:

    stage.rs

Abstract:

    File contains the routines that place a verified image into target
    memory.

--*/

use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};
use vboot_image_types::{Compression, ImageDescriptor};

use crate::memory_layout::{MemoryLayout, MemoryRegion};
use crate::BootDevice;

/// Image placed in memory and ready to run
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LoadedImage {
    pub entry_point: u64,
    pub load_address: u64,

    /// Total payload bytes copied
    pub bytes_loaded: usize,

    /// Device the image was read from
    pub device: Option<BootDevice>,
}

/// Memory the next stage is loaded into
pub trait TargetMemory {
    /// Copy `data` to `addr`. The destination has been validated against
    /// the memory layout.
    fn write(&mut self, addr: u64, data: &[u8]) -> VbootResult<()>;

    /// Returns true if `src` shares memory with `dest`
    fn aliases(&self, src: &[u8], dest: &MemoryRegion) -> bool {
        MemoryRegion::new(src.as_ptr() as u64, src.len() as u64).overlaps(dest)
    }
}

/// Physical memory of the running target
pub struct RawMemory {
    _private: (),
}

impl RawMemory {
    /// # Safety
    ///
    /// Addresses passed to `write` are dereferenced directly. The caller
    /// must guarantee that the memory layout used to validate them
    /// describes memory nothing else references.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl TargetMemory for RawMemory {
    fn write(&mut self, addr: u64, data: &[u8]) -> VbootResult<()> {
        let addr = usize::try_from(addr).map_err(|_| VbootError::LOAD_OUT_OF_RAM)?;
        // SAFETY: the destination was checked to be RAM outside the stage
        // and not aliasing `data`.
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), addr as *mut u8, data.len());
        }
        Ok(())
    }
}

/// Host-side memory standing in for the target's RAM
pub struct SimMemory {
    base: u64,
    bytes: Vec<u8>,
}

impl SimMemory {
    pub fn new(region: MemoryRegion) -> Self {
        Self {
            base: region.start,
            bytes: alloc::vec![0u8; region.size as usize],
        }
    }

    fn offset(&self, addr: u64, len: usize) -> Option<core::ops::Range<usize>> {
        let start = usize::try_from(addr.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }

    /// Bytes at `addr`, `None` outside the simulated region
    pub fn read(&self, addr: u64, len: usize) -> Option<&[u8]> {
        self.bytes.get(self.offset(addr, len)?)
    }
}

impl TargetMemory for SimMemory {
    fn write(&mut self, addr: u64, data: &[u8]) -> VbootResult<()> {
        let range = self
            .offset(addr, data.len())
            .ok_or(VbootError::LOAD_OUT_OF_RAM)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn aliases(&self, src: &[u8], _dest: &MemoryRegion) -> bool {
        let backing = MemoryRegion::new(self.bytes.as_ptr() as u64, self.bytes.len() as u64);
        backing.overlaps(&MemoryRegion::new(src.as_ptr() as u64, src.len() as u64))
    }
}

struct Placement<'a> {
    dest: MemoryRegion,
    data: &'a [u8],
}

/// Check every destination of `desc` before copying anything.
fn plan<'a>(
    desc: &ImageDescriptor,
    buffer: &'a [u8],
    layout: &MemoryLayout,
    memory: &dyn TargetMemory,
) -> VbootResult<Vec<Placement<'a>>> {
    let mut placements: Vec<Placement<'a>> = Vec::new();

    for payload in &desc.payload_ranges {
        let Some(load_address) = payload.load_address else {
            continue;
        };
        if payload.compression != Compression::None {
            return Err(VbootError::LOAD_UNSUPPORTED_COMPRESSION);
        }
        let data = payload.range().slice(buffer)?;
        let dest = MemoryRegion::new(load_address, data.len() as u64);

        if dest.end().is_none() || !layout.in_ram(&dest) {
            return Err(VbootError::LOAD_OUT_OF_RAM);
        }
        if layout.overlaps_reserved(&dest) {
            return Err(VbootError::LOAD_OVERLAPS_STAGE);
        }
        if memory.aliases(data, &dest) {
            return Err(VbootError::LOAD_SOURCE_ALIASES_DEST);
        }
        if placements.iter().any(|p| p.dest.overlaps(&dest)) {
            return Err(VbootError::LOAD_OVERLAPPING_PAYLOADS);
        }
        placements.push(Placement { dest, data });
    }

    if placements.is_empty() {
        return Err(VbootError::LOAD_NO_DESTINATION);
    }

    let entry = MemoryRegion::new(desc.entry_point, 1);
    if !placements.iter().any(|p| p.dest.contains(&entry)) {
        return Err(VbootError::LOAD_ENTRY_OUTSIDE_IMAGE);
    }
    Ok(placements)
}

/// Load the payloads of a verified image
///
/// # Arguments
///
/// * `desc`   - Descriptor of the verified image
/// * `buffer` - Buffer the descriptor was parsed from
/// * `layout` - Memory layout of the target
/// * `memory` - Target memory
///
/// # Returns
///
/// * `LoadedImage` - Entry point and size of the loaded image
pub fn load(
    desc: &ImageDescriptor,
    buffer: &[u8],
    layout: &MemoryLayout,
    memory: &mut dyn TargetMemory,
) -> VbootResult<LoadedImage> {
    let placements = plan(desc, buffer, layout, memory)?;

    let mut bytes_loaded = 0;
    for placement in &placements {
        memory.write(placement.dest.start, placement.data)?;
        bytes_loaded += placement.data.len();
    }

    Ok(LoadedImage {
        entry_point: desc.entry_point,
        load_address: desc.load_address,
        bytes_loaded,
        device: None,
    })
}
