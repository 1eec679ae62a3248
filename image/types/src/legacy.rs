/*++

Licensed under the Apache-2.0 license.

File Name:

    legacy.rs

Abstract:

    File contains the on-media layout of the Legacy image header.

--*/

use core::ops::Range;

use getset::{CopyGetters, Getters};
use memoffset::span_of;
use zerocopy::byteorder::big_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Compression, WordSize};

pub const IH_MAGIC: u32 = 0x2705_1956;
pub const IH_NMLEN: usize = 32;

pub const IH_OS_LINUX: u8 = 5;
pub const IH_OS_VXWORKS: u8 = 14;
pub const IH_OS_U_BOOT: u8 = 17;
pub const IH_OS_OPENRTOS: u8 = 24;
pub const IH_OS_ARM_TRUSTED_FIRMWARE: u8 = 25;
pub const IH_OS_TEE: u8 = 26;
pub const IH_OS_OPENSBI: u8 = 27;
pub const IH_OS_EFI: u8 = 28;
pub const IH_OS_ELF: u8 = 29;

pub const IH_ARCH_ARM: u8 = 2;
pub const IH_ARCH_I386: u8 = 3;
pub const IH_ARCH_MIPS: u8 = 5;
pub const IH_ARCH_PPC: u8 = 7;
pub const IH_ARCH_ARM64: u8 = 22;
pub const IH_ARCH_X86_64: u8 = 24;
pub const IH_ARCH_RISCV: u8 = 26;

pub const IH_TYPE_STANDALONE: u8 = 1;
pub const IH_TYPE_KERNEL: u8 = 2;
pub const IH_TYPE_RAMDISK: u8 = 3;
pub const IH_TYPE_MULTI: u8 = 4;
pub const IH_TYPE_FIRMWARE: u8 = 5;
pub const IH_TYPE_SCRIPT: u8 = 6;
pub const IH_TYPE_FILESYSTEM: u8 = 7;
pub const IH_TYPE_FLATDT: u8 = 8;
pub const IH_TYPE_KERNEL_NOLOAD: u8 = 14;

pub const IH_COMP_NONE: u8 = 0;
pub const IH_COMP_GZIP: u8 = 1;
pub const IH_COMP_BZIP2: u8 = 2;
pub const IH_COMP_LZMA: u8 = 3;
pub const IH_COMP_LZO: u8 = 4;
pub const IH_COMP_LZ4: u8 = 5;
pub const IH_COMP_ZSTD: u8 = 6;

pub const LEGACY_HEADER32_SIZE: usize = core::mem::size_of::<LegacyHeader32>();
pub const LEGACY_HEADER64_SIZE: usize = core::mem::size_of::<LegacyHeader64>();

/// Legacy header with 32-bit address fields
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Copy, Clone)]
pub struct LegacyHeader32 {
    pub magic: U32,
    pub hcrc: U32,
    pub time: U32,
    pub size: U32,
    pub load: U32,
    pub ep: U32,
    pub dcrc: U32,
    pub os: u8,
    pub arch: u8,
    pub image_type: u8,
    pub comp: u8,
    pub name: [u8; IH_NMLEN],
}

/// Legacy header with 64-bit address fields
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Copy, Clone)]
pub struct LegacyHeader64 {
    pub magic: U32,
    pub hcrc: U32,
    pub time: U32,
    pub size: U32,
    pub load: U64,
    pub ep: U64,
    pub dcrc: U32,
    pub os: u8,
    pub arch: u8,
    pub image_type: u8,
    pub comp: u8,
    pub name: [u8; IH_NMLEN],
}

/// Size of the header for the given platform word size.
pub const fn legacy_header_size(word_size: WordSize) -> usize {
    match word_size {
        WordSize::Bits32 => LEGACY_HEADER32_SIZE,
        WordSize::Bits64 => LEGACY_HEADER64_SIZE,
    }
}

/// Byte span of the header checksum field. The field is at the same
/// offset in both layouts.
pub fn legacy_hcrc_span() -> Range<usize> {
    span_of!(LegacyHeader32, hcrc)
}

/// Legacy header, decoded and independent of the address width.
#[derive(Debug, Clone, Eq, PartialEq, Getters, CopyGetters)]
pub struct LegacyHeader {
    /// Header checksum
    #[getset(get_copy = "pub")]
    hcrc: u32,

    /// Creation timestamp
    #[getset(get_copy = "pub")]
    time: u32,

    /// Size of the data following the header
    #[getset(get_copy = "pub")]
    size: u32,

    /// Load address
    #[getset(get_copy = "pub")]
    load: u64,

    /// Entry point
    #[getset(get_copy = "pub")]
    ep: u64,

    /// Data checksum
    #[getset(get_copy = "pub")]
    dcrc: u32,

    /// Operating system tag
    #[getset(get_copy = "pub")]
    os: u8,

    /// CPU architecture tag
    #[getset(get_copy = "pub")]
    arch: u8,

    /// Image type tag
    #[getset(get_copy = "pub")]
    image_type: u8,

    /// Compression tag
    #[getset(get_copy = "pub")]
    comp: u8,

    /// Image name, NUL padded
    #[getset(get = "pub")]
    name: [u8; IH_NMLEN],

    /// Size of the on-media header
    #[getset(get_copy = "pub")]
    header_size: usize,
}

impl From<&LegacyHeader32> for LegacyHeader {
    fn from(hdr: &LegacyHeader32) -> Self {
        Self {
            hcrc: hdr.hcrc.get(),
            time: hdr.time.get(),
            size: hdr.size.get(),
            load: hdr.load.get().into(),
            ep: hdr.ep.get().into(),
            dcrc: hdr.dcrc.get(),
            os: hdr.os,
            arch: hdr.arch,
            image_type: hdr.image_type,
            comp: hdr.comp,
            name: hdr.name,
            header_size: LEGACY_HEADER32_SIZE,
        }
    }
}

impl From<&LegacyHeader64> for LegacyHeader {
    fn from(hdr: &LegacyHeader64) -> Self {
        Self {
            hcrc: hdr.hcrc.get(),
            time: hdr.time.get(),
            size: hdr.size.get(),
            load: hdr.load.get(),
            ep: hdr.ep.get(),
            dcrc: hdr.dcrc.get(),
            os: hdr.os,
            arch: hdr.arch,
            image_type: hdr.image_type,
            comp: hdr.comp,
            name: hdr.name,
            header_size: LEGACY_HEADER64_SIZE,
        }
    }
}

impl LegacyHeader {
    pub fn is_multi(&self) -> bool {
        self.image_type == IH_TYPE_MULTI
    }

    pub fn compression(&self) -> Compression {
        Compression::from_legacy_tag(self.comp)
    }

    /// Name up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(IH_NMLEN);
        &self.name[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeros;

    #[test]
    fn test_header_sizes() {
        assert_eq!(LEGACY_HEADER32_SIZE, 64);
        assert_eq!(LEGACY_HEADER64_SIZE, 72);
        assert_eq!(legacy_header_size(WordSize::Bits32), 64);
        assert_eq!(legacy_header_size(WordSize::Bits64), 72);
    }

    #[test]
    fn test_hcrc_span() {
        assert_eq!(legacy_hcrc_span(), 4..8);
        assert_eq!(span_of!(LegacyHeader64, hcrc), 4..8);
        assert_eq!(span_of!(LegacyHeader32, name), 32..64);
        assert_eq!(span_of!(LegacyHeader64, name), 40..72);
    }

    #[test]
    fn test_name_bytes() {
        let mut raw = LegacyHeader32::new_zeroed();
        raw.name[..6].copy_from_slice(b"kernel");
        let hdr = LegacyHeader::from(&raw);
        assert_eq!(hdr.name_bytes(), b"kernel");
        assert_eq!(hdr.header_size(), 64);
    }
}
