/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the parsers that turn untrusted boot media bytes into an
    image descriptor.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod cursor;
pub mod fdt;
mod fit;
mod keys;
mod legacy;

use vboot_error::{VbootError, VbootResult};
use vboot_image_types::{Arch, ImageDescriptor, WordSize, FDT_MAGIC, IH_MAGIC};

pub use fit::{parse_fit, required_len};
pub use keys::{boot_order_from_fdt, trust_store_from_fdt};
pub use legacy::{legacy_image_len, parse_legacy};

use crate::cursor::ByteCursor;

/// Parser inputs that do not come from the image itself
#[derive(Debug, Copy, Clone)]
pub struct ParseOptions<'a> {
    /// Platform word size; selects the Legacy header layout
    pub word_size: WordSize,

    /// Platform architecture images must be built for; `None` accepts any
    pub arch: Option<Arch>,

    /// FIT configuration to boot; `None` selects the default
    pub configuration: Option<&'a str>,
}

impl Default for ParseOptions<'_> {
    fn default() -> Self {
        Self {
            word_size: WordSize::native(),
            arch: Arch::native(),
            configuration: None,
        }
    }
}

/// Container format, from the magic number at offset 0
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Magic {
    Legacy,
    Fit,
}

pub fn detect(buf: &[u8]) -> VbootResult<Magic> {
    match ByteCursor::new(buf).u32_be() {
        Ok(IH_MAGIC) => Ok(Magic::Legacy),
        Ok(FDT_MAGIC) => Ok(Magic::Fit),
        _ => Err(VbootError::PARSE_BAD_MAGIC),
    }
}

/// Parse the image at the start of `buf`.
pub fn parse(buf: &[u8], options: &ParseOptions) -> VbootResult<ImageDescriptor> {
    match detect(buf)? {
        Magic::Legacy => parse_legacy(buf, options.word_size, options.arch),
        Magic::Fit => parse_fit(buf, options.configuration, options.arch),
    }
}

/// Bytes to read for the image whose first bytes are in `header`. For FIT
/// images this covers the tree only; payloads stored after the tree are
/// found with [`required_len`] once the tree has been read.
pub fn probe_len(header: &[u8], word_size: WordSize) -> VbootResult<usize> {
    match detect(header)? {
        Magic::Legacy => legacy_image_len(header, word_size),
        Magic::Fit => fdt::fdt_total_size(header),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vboot_image_gen::{FitConfig, FitGenerator, FitImage, LegacyGenerator, RustCrypto};
    use vboot_image_types::IH_ARCH_MIPS;

    #[test]
    fn test_detect() {
        assert_eq!(detect(&[0x27, 0x05, 0x19, 0x56]), Ok(Magic::Legacy));
        assert_eq!(detect(&[0xd0, 0x0d, 0xfe, 0xed, 0]), Ok(Magic::Fit));
        assert_eq!(detect(&[0x7f, b'E', b'L', b'F']), Err(VbootError::PARSE_BAD_MAGIC));
        assert_eq!(detect(&[0x27, 0x05]), Err(VbootError::PARSE_BAD_MAGIC));
    }

    #[test]
    fn test_probe_len() {
        let legacy = LegacyGenerator::kernel(WordSize::Bits32, 0x1000, 0x1000, &[0; 100]).generate();
        assert_eq!(probe_len(&legacy[..64], WordSize::Bits32), Ok(164));

        let fit = FitGenerator::new(RustCrypto::default())
            .image(FitImage::new("kernel", "kernel", &[1; 100]).load(0x1000))
            .config(FitConfig::new("conf-1").kernel("kernel"))
            .default_config("conf-1")
            .generate()
            .unwrap();
        assert_eq!(probe_len(&fit[..40], WordSize::Bits32), Ok(fit.len()));
    }

    #[test]
    fn test_parse_dispatch() {
        let legacy = LegacyGenerator::kernel(WordSize::Bits64, 0x1000, 0x1000, &[0; 8]).generate();
        let options = ParseOptions {
            word_size: WordSize::Bits64,
            ..Default::default()
        };
        assert!(parse(&legacy, &options).unwrap().is_legacy());
        assert_eq!(
            parse(&[0u8; 128], &options),
            Err(VbootError::PARSE_BAD_MAGIC)
        );
    }

    #[test]
    fn test_parse_checks_platform_arch() {
        let mut gen = LegacyGenerator::kernel(WordSize::Bits64, 0x1000, 0x1000, &[0; 8]);
        gen.arch = IH_ARCH_MIPS;
        let legacy = gen.generate();
        let fit = FitGenerator::new(RustCrypto::default())
            .image(FitImage::new("kernel", "kernel", &[1; 8]).load(0x1000).arch("mips"))
            .config(FitConfig::new("conf-1").kernel("kernel"))
            .default_config("conf-1")
            .generate()
            .unwrap();

        let riscv = ParseOptions {
            word_size: WordSize::Bits64,
            arch: Some(Arch::RiscV),
            configuration: None,
        };
        assert_eq!(parse(&legacy, &riscv), Err(VbootError::PARSE_WRONG_ARCH));
        assert_eq!(parse(&fit, &riscv), Err(VbootError::PARSE_WRONG_ARCH));

        let mips = ParseOptions {
            arch: Some(Arch::Mips),
            ..riscv
        };
        assert!(parse(&legacy, &mips).is_ok());
        assert!(parse(&fit, &mips).is_ok());
    }
}
