/*++

Licensed under the Apache-2.0 license.

File Name:

    legacy.rs

Abstract:

    Legacy image header parser.

--*/

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};
use vboot_image_types::*;

use crate::cursor::{align4, ByteCursor};

fn decode_header(buf: &[u8], word_size: WordSize) -> VbootResult<LegacyHeader> {
    let mut cursor = ByteCursor::new(buf);
    Ok(match word_size {
        WordSize::Bits32 => LegacyHeader::from(&cursor.read::<LegacyHeader32>()?),
        WordSize::Bits64 => LegacyHeader::from(&cursor.read::<LegacyHeader64>()?),
    })
}

/// Verify the header checksum. The checksum field reads as zero while
/// the checksum is computed.
fn check_header_crc(raw: &[u8], expected: u32) -> VbootResult<()> {
    let span = legacy_hcrc_span();
    let mut digest = crc::crc32::Digest::new(crc::crc32::IEEE);
    crc::Hasher32::write(&mut digest, &raw[..span.start]);
    crc::Hasher32::write(&mut digest, &[0u8; 4]);
    crc::Hasher32::write(&mut digest, &raw[span.end..]);
    if crc::Hasher32::sum32(&digest) != expected {
        return Err(VbootError::PARSE_CHECKSUM_MISMATCH);
    }
    Ok(())
}

const BOOTABLE_TYPES: [u8; 5] = [
    IH_TYPE_STANDALONE,
    IH_TYPE_KERNEL,
    IH_TYPE_KERNEL_NOLOAD,
    IH_TYPE_FIRMWARE,
    IH_TYPE_MULTI,
];

const BOOTABLE_OS: [u8; 7] = [
    IH_OS_LINUX,
    IH_OS_U_BOOT,
    IH_OS_TEE,
    IH_OS_OPENRTOS,
    IH_OS_EFI,
    IH_OS_VXWORKS,
    IH_OS_ELF,
];

/// Reject headers whose architecture, type or OS tag cannot boot here. A
/// `None` platform skips the architecture check.
fn check_target(header: &LegacyHeader, platform: Option<Arch>) -> VbootResult<()> {
    if let Some(platform) = platform {
        match Arch::from_legacy_tag(header.arch()) {
            Some(arch) if platform.runs(arch) => {}
            _ => return Err(VbootError::PARSE_WRONG_ARCH),
        }
    }
    if !BOOTABLE_TYPES.contains(&header.image_type()) {
        return Err(VbootError::PARSE_WRONG_TYPE);
    }
    if !BOOTABLE_OS.contains(&header.os()) {
        return Err(VbootError::PARSE_WRONG_OS);
    }
    Ok(())
}

/// Number of bytes a Legacy image occupies, from its header alone.
pub fn legacy_image_len(buf: &[u8], word_size: WordSize) -> VbootResult<usize> {
    let header = decode_header(buf, word_size)?;
    header
        .header_size()
        .checked_add(header.size() as usize)
        .ok_or(VbootError::PARSE_TRUNCATED)
}

/// Parse a Legacy image at the start of `buf`.
///
/// Checks run in a fixed order: magic, header checksum, header tags
/// against `platform`, declared length against the buffer, then the
/// multi-file length table.
pub fn parse_legacy(
    buf: &[u8],
    word_size: WordSize,
    platform: Option<Arch>,
) -> VbootResult<ImageDescriptor> {
    let magic = ByteCursor::new(buf).u32_be()?;
    if magic != IH_MAGIC {
        return Err(VbootError::PARSE_BAD_MAGIC);
    }

    let header = decode_header(buf, word_size)?;
    let header_size = header.header_size();
    check_header_crc(&buf[..header_size], header.hcrc())?;
    check_target(&header, platform)?;

    let data = ByteRange::new(header_size, header.size() as usize);
    let data_end = data.within(buf.len())?.end;

    let name = String::from_utf8_lossy(header.name_bytes()).into_owned();
    let compression = header.compression();

    let payload_ranges = if header.is_multi() {
        multi_payloads(&buf[..data_end], &header, &name)?
    } else {
        vec![PayloadRange {
            name,
            offset: data.offset,
            len: data.len,
            load_address: Some(header.load()),
            compression,
        }]
    };

    Ok(ImageDescriptor {
        load_address: header.load(),
        entry_point: header.ep(),
        declared_checksum: Some(DeclaredChecksum {
            value: header.dcrc(),
            range: data,
        }),
        verification_nodes: Vec::new(),
        payload_ranges,
        format: ImageFormat::Legacy(header),
    })
}

/// Walk the zero terminated length table of a multi-file image. `buf`
/// ends at the end of the declared data. Sub-images are placed back to
/// back from the header load address, keeping their 4-byte padding.
fn multi_payloads(
    buf: &[u8],
    header: &LegacyHeader,
    name: &str,
) -> VbootResult<Vec<PayloadRange>> {
    let mut table = ByteCursor::at(buf, header.header_size())?;
    let mut lengths = Vec::new();
    loop {
        match table.u32_be()? {
            0 => break,
            len => lengths.push(len as usize),
        }
    }
    if lengths.is_empty() {
        return Err(VbootError::PARSE_NO_PAYLOAD);
    }

    let first = table.position();
    let mut offset = first;
    let mut payloads = Vec::with_capacity(lengths.len());
    for (i, len) in lengths.into_iter().enumerate() {
        let end = ByteRange::new(offset, len).within(buf.len())?.end;
        let load_address = header
            .load()
            .checked_add((offset - first) as u64)
            .ok_or(VbootError::PARSE_BAD_PROPERTY)?;
        payloads.push(PayloadRange {
            name: alloc::format!("{}.{}", name, i),
            offset,
            len,
            load_address: Some(load_address),
            compression: header.compression(),
        });
        offset = align4(end).ok_or(VbootError::PARSE_TRUNCATED)?;
    }
    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vboot_image_gen::LegacyGenerator;

    fn kernel(size: usize) -> Vec<u8> {
        let payload: Vec<u8> = (0..size).map(|i| i as u8).collect();
        LegacyGenerator::kernel(WordSize::Bits32, 0x8000_0000, 0x8000_0040, &payload).generate()
    }

    #[test]
    fn test_parse_kernel() {
        let image = kernel(0x100);
        let desc = parse_legacy(&image, WordSize::Bits32, Arch::native()).unwrap();
        assert!(desc.is_legacy());
        assert_eq!(desc.load_address, 0x8000_0000);
        assert_eq!(desc.entry_point, 0x8000_0040);
        assert_eq!(desc.payload_ranges.len(), 1);
        assert_eq!(desc.primary().unwrap().offset, 64);
        assert_eq!(desc.primary().unwrap().len, 0x100);
        assert_eq!(desc.primary().unwrap().name, "kernel");
        let checksum = desc.declared_checksum.unwrap();
        assert_eq!(checksum.range, ByteRange::new(64, 0x100));
        assert_eq!(
            checksum.value,
            crc::crc32::checksum_ieee(&image[64..64 + 0x100])
        );
    }

    #[test]
    fn test_parse_kernel_64bit() {
        let image = LegacyGenerator::kernel(WordSize::Bits64, 0x1_0000_0000, 0x1_0000_1000, &[7u8; 32])
            .generate();
        let desc = parse_legacy(&image, WordSize::Bits64, Arch::native()).unwrap();
        assert_eq!(desc.load_address, 0x1_0000_0000);
        assert_eq!(desc.entry_point, 0x1_0000_1000);
        assert_eq!(desc.primary().unwrap().offset, 72);
    }

    #[test]
    fn test_header_tamper_detected() {
        let image = kernel(0x40);
        // Every header byte outside the checksum field is covered.
        for i in (0..64).filter(|i| !legacy_hcrc_span().contains(i)) {
            let mut tampered = image.clone();
            tampered[i] ^= 0x01;
            let expected = if i < 4 {
                VbootError::PARSE_BAD_MAGIC
            } else {
                VbootError::PARSE_CHECKSUM_MISMATCH
            };
            assert_eq!(
                parse_legacy(&tampered, WordSize::Bits32, Arch::native()),
                Err(expected),
                "byte {i}"
            );
        }
    }

    #[test]
    fn test_truncated_by_one_byte() {
        let image = kernel(0x1000);
        assert_eq!(image.len(), 64 + 0x1000);
        assert_eq!(
            parse_legacy(&image[..image.len() - 1], WordSize::Bits32, Arch::native()),
            Err(VbootError::PARSE_TRUNCATED)
        );
        assert_eq!(
            parse_legacy(&image[..0x0FFF], WordSize::Bits32, Arch::native()),
            Err(VbootError::PARSE_TRUNCATED)
        );
    }

    #[test]
    fn test_header_shorter_than_layout() {
        let image = kernel(0x10);
        assert_eq!(
            parse_legacy(&image[..40], WordSize::Bits32, Arch::native()),
            Err(VbootError::PARSE_TRUNCATED)
        );
        assert_eq!(
            parse_legacy(&[], WordSize::Bits32, Arch::native()),
            Err(VbootError::PARSE_TRUNCATED)
        );
    }

    #[test]
    fn test_multi_layout() {
        let image =
            LegacyGenerator::multi(WordSize::Bits32, 0x4000_0000, &[&[1u8; 5], &[2u8; 8], &[3u8; 3]])
                .generate();
        let desc = parse_legacy(&image, WordSize::Bits32, Arch::native()).unwrap();
        let table = 64 + 4 * 4;
        let ranges: Vec<_> = desc
            .payload_ranges
            .iter()
            .map(|p| (p.offset, p.len, p.load_address))
            .collect();
        assert_eq!(
            ranges,
            vec![
                (table, 5, Some(0x4000_0000)),
                (table + 8, 8, Some(0x4000_0008)),
                (table + 16, 3, Some(0x4000_0010)),
            ]
        );
        assert_eq!(&image[table + 8..table + 16], &[2u8; 8]);
    }

    /// Rewrite the header checksum after editing the header or data.
    fn reseal(image: &mut [u8]) {
        let data_crc = crc::crc32::checksum_ieee(&image[64..]);
        image[24..28].copy_from_slice(&data_crc.to_be_bytes());
        image[4..8].fill(0);
        let hcrc = crc::crc32::checksum_ieee(&image[..64]);
        image[4..8].copy_from_slice(&hcrc.to_be_bytes());
    }

    #[test]
    fn test_multi_table_overflow() {
        let mut image =
            LegacyGenerator::multi(WordSize::Bits32, 0x4000_0000, &[&[1u8; 8], &[2u8; 8]]).generate();
        // Second entry claims far more data than the container holds.
        image[68..72].copy_from_slice(&0xffff_fff0u32.to_be_bytes());
        reseal(&mut image);
        assert_eq!(
            parse_legacy(&image, WordSize::Bits32, Arch::native()),
            Err(VbootError::PARSE_TRUNCATED)
        );
    }

    #[test]
    fn test_multi_table_unterminated() {
        let mut image =
            LegacyGenerator::multi(WordSize::Bits32, 0x4000_0000, &[&[1u8; 4]]).generate();
        // Terminator and payload replaced by non-zero lengths.
        image[68..72].copy_from_slice(&4u32.to_be_bytes());
        image[72..76].copy_from_slice(&4u32.to_be_bytes());
        reseal(&mut image);
        assert_eq!(
            parse_legacy(&image, WordSize::Bits32, Arch::native()),
            Err(VbootError::PARSE_TRUNCATED)
        );
    }

    #[test]
    fn test_multi_empty_table() {
        let image = LegacyGenerator::multi(WordSize::Bits32, 0x4000_0000, &[]).generate();
        assert_eq!(
            parse_legacy(&image, WordSize::Bits32, Arch::native()),
            Err(VbootError::PARSE_NO_PAYLOAD)
        );
    }

    fn tagged(os: u8, arch: u8, image_type: u8) -> Vec<u8> {
        let mut gen = LegacyGenerator::kernel(WordSize::Bits32, 0x8000_0000, 0x8000_0000, &[0; 16]);
        gen.os = os;
        gen.arch = arch;
        gen.image_type = image_type;
        gen.generate()
    }

    #[test]
    fn test_header_tags_checked() {
        let arm = Some(Arch::Arm);
        let parse = |image: &[u8]| parse_legacy(image, WordSize::Bits32, arm).map(|_| ());

        assert_eq!(parse(&tagged(IH_OS_LINUX, IH_ARCH_ARM, IH_TYPE_KERNEL)), Ok(()));
        assert_eq!(parse(&tagged(IH_OS_U_BOOT, IH_ARCH_ARM, IH_TYPE_FIRMWARE)), Ok(()));
        assert_eq!(
            parse(&tagged(IH_OS_LINUX, IH_ARCH_ARM64, IH_TYPE_KERNEL)),
            Err(VbootError::PARSE_WRONG_ARCH)
        );
        assert_eq!(
            parse(&tagged(IH_OS_LINUX, 0xee, IH_TYPE_KERNEL)),
            Err(VbootError::PARSE_WRONG_ARCH)
        );
        assert_eq!(
            parse(&tagged(IH_OS_LINUX, IH_ARCH_ARM, IH_TYPE_RAMDISK)),
            Err(VbootError::PARSE_WRONG_TYPE)
        );
        assert_eq!(
            parse(&tagged(IH_OS_LINUX, IH_ARCH_ARM, IH_TYPE_SCRIPT)),
            Err(VbootError::PARSE_WRONG_TYPE)
        );
        assert_eq!(
            parse(&tagged(IH_OS_OPENSBI, IH_ARCH_ARM, IH_TYPE_KERNEL)),
            Err(VbootError::PARSE_WRONG_OS)
        );

        // Without a platform architecture any tag is accepted.
        let foreign = tagged(IH_OS_LINUX, IH_ARCH_PPC, IH_TYPE_KERNEL);
        assert!(parse_legacy(&foreign, WordSize::Bits32, None).is_ok());
    }

    #[test]
    fn test_image_len() {
        let image = kernel(0x123);
        assert_eq!(legacy_image_len(&image, WordSize::Bits32), Ok(64 + 0x123));
    }
}
