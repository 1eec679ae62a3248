/*++

Licensed under the Apache-2.0 license.

File Name:

   legacy.rs

Abstract:

    Legacy image generator.

--*/

use vboot_image_types::*;
use zerocopy::byteorder::big_endian::{U32, U64};
use zerocopy::IntoBytes;

/// Legacy image generator
pub struct LegacyGenerator {
    pub word_size: WordSize,
    pub os: u8,
    pub arch: u8,
    pub image_type: u8,
    pub comp: u8,
    pub time: u32,
    pub load: u64,
    pub ep: u64,
    pub name: String,
    pub payloads: Vec<Vec<u8>>,
}

impl LegacyGenerator {
    /// Single payload kernel image for the host architecture
    pub fn kernel(word_size: WordSize, load: u64, ep: u64, payload: &[u8]) -> Self {
        Self {
            word_size,
            os: IH_OS_LINUX,
            arch: match (Arch::native(), word_size) {
                (Some(arch), _) => arch.legacy_tag(),
                (None, WordSize::Bits32) => IH_ARCH_ARM,
                (None, WordSize::Bits64) => IH_ARCH_ARM64,
            },
            image_type: IH_TYPE_KERNEL,
            comp: IH_COMP_NONE,
            time: 0x6500_0000,
            load,
            ep,
            name: "kernel".into(),
            payloads: vec![payload.to_vec()],
        }
    }

    /// Multi-file image
    pub fn multi(word_size: WordSize, load: u64, payloads: &[&[u8]]) -> Self {
        let mut gen = Self::kernel(word_size, load, load, &[]);
        gen.image_type = IH_TYPE_MULTI;
        gen.name = "multi".into();
        gen.payloads = payloads.iter().map(|p| p.to_vec()).collect();
        gen
    }

    fn data(&self) -> Vec<u8> {
        if self.image_type != IH_TYPE_MULTI {
            return self.payloads.concat();
        }
        let mut data = Vec::new();
        for payload in &self.payloads {
            data.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        }
        data.extend_from_slice(&0u32.to_be_bytes());
        for (i, payload) in self.payloads.iter().enumerate() {
            data.extend_from_slice(payload);
            if i + 1 < self.payloads.len() {
                data.resize((data.len() + 3) & !3, 0);
            }
        }
        data
    }

    fn name_field(&self) -> [u8; IH_NMLEN] {
        let mut name = [0u8; IH_NMLEN];
        let len = self.name.len().min(IH_NMLEN);
        name[..len].copy_from_slice(&self.name.as_bytes()[..len]);
        name
    }

    /// Generate header and data with valid checksums
    pub fn generate(&self) -> Vec<u8> {
        let data = self.data();
        let dcrc = crc::crc32::checksum_ieee(&data);

        let mut header = match self.word_size {
            WordSize::Bits32 => LegacyHeader32 {
                magic: U32::new(IH_MAGIC),
                hcrc: U32::new(0),
                time: U32::new(self.time),
                size: U32::new(data.len() as u32),
                load: U32::new(self.load as u32),
                ep: U32::new(self.ep as u32),
                dcrc: U32::new(dcrc),
                os: self.os,
                arch: self.arch,
                image_type: self.image_type,
                comp: self.comp,
                name: self.name_field(),
            }
            .as_bytes()
            .to_vec(),
            WordSize::Bits64 => LegacyHeader64 {
                magic: U32::new(IH_MAGIC),
                hcrc: U32::new(0),
                time: U32::new(self.time),
                size: U32::new(data.len() as u32),
                load: U64::new(self.load),
                ep: U64::new(self.ep),
                dcrc: U32::new(dcrc),
                os: self.os,
                arch: self.arch,
                image_type: self.image_type,
                comp: self.comp,
                name: self.name_field(),
            }
            .as_bytes()
            .to_vec(),
        };

        let hcrc = crc::crc32::checksum_ieee(&header);
        header[legacy_hcrc_span()].copy_from_slice(&hcrc.to_be_bytes());
        header.extend_from_slice(&data);
        header
    }
}
