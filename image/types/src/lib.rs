/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the format-independent data structures describing a
    candidate boot image.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod fit;
mod keys;
mod legacy;

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;

use vboot_error::{VbootError, VbootResult};

pub use fit::{
    referenced_names, ConfigReference, ConfigSignedData, FitImageProps, SignedImage,
    CONFIG_REFERENCE_PROPS,
};
pub use keys::{EcCurve, KeyAlgo, KeyMaterial, KeyRequirement, PublicKey, TrustStore};
pub use legacy::*;

pub const FDT_MAGIC: u32 = 0xD00D_FEED;
pub const MAX_DIGEST_BYTE_SIZE: usize = 64;

/// Platform word size; selects the width of Legacy address fields.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WordSize {
    Bits32,
    Bits64,
}

impl WordSize {
    /// Word size of the platform this stage is built for.
    pub const fn native() -> Self {
        NATIVE_WORD_SIZE
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        const NATIVE_WORD_SIZE: WordSize = WordSize::Bits64;
    } else {
        const NATIVE_WORD_SIZE: WordSize = WordSize::Bits32;
    }
}

impl Default for WordSize {
    fn default() -> Self {
        Self::native()
    }
}

/// CPU architecture an image is built for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Arch {
    Arm,
    Arm64,
    I386,
    X86_64,
    RiscV,
    Mips,
    PowerPc,
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        const NATIVE_ARCH: Option<Arch> = Some(Arch::Arm64);
    } else if #[cfg(target_arch = "arm")] {
        const NATIVE_ARCH: Option<Arch> = Some(Arch::Arm);
    } else if #[cfg(target_arch = "x86_64")] {
        const NATIVE_ARCH: Option<Arch> = Some(Arch::X86_64);
    } else if #[cfg(target_arch = "x86")] {
        const NATIVE_ARCH: Option<Arch> = Some(Arch::I386);
    } else if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
        const NATIVE_ARCH: Option<Arch> = Some(Arch::RiscV);
    } else if #[cfg(target_arch = "mips")] {
        const NATIVE_ARCH: Option<Arch> = Some(Arch::Mips);
    } else if #[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))] {
        const NATIVE_ARCH: Option<Arch> = Some(Arch::PowerPc);
    } else {
        const NATIVE_ARCH: Option<Arch> = None;
    }
}

impl Arch {
    /// Architecture this stage is built for; `None` on targets without
    /// an image architecture tag.
    pub const fn native() -> Option<Self> {
        NATIVE_ARCH
    }

    /// Decode a Legacy header architecture tag.
    pub fn from_legacy_tag(tag: u8) -> Option<Self> {
        match tag {
            IH_ARCH_ARM => Some(Self::Arm),
            IH_ARCH_ARM64 => Some(Self::Arm64),
            IH_ARCH_I386 => Some(Self::I386),
            IH_ARCH_X86_64 => Some(Self::X86_64),
            IH_ARCH_RISCV => Some(Self::RiscV),
            IH_ARCH_MIPS => Some(Self::Mips),
            IH_ARCH_PPC => Some(Self::PowerPc),
            _ => None,
        }
    }

    /// Decode a FIT `arch` property.
    pub fn from_fit_name(name: &str) -> Option<Self> {
        match name {
            "arm" => Some(Self::Arm),
            "arm64" => Some(Self::Arm64),
            "x86" => Some(Self::I386),
            "x86_64" => Some(Self::X86_64),
            "riscv" => Some(Self::RiscV),
            "mips" => Some(Self::Mips),
            "powerpc" | "ppc" => Some(Self::PowerPc),
            _ => None,
        }
    }

    pub const fn legacy_tag(&self) -> u8 {
        match self {
            Self::Arm => IH_ARCH_ARM,
            Self::Arm64 => IH_ARCH_ARM64,
            Self::I386 => IH_ARCH_I386,
            Self::X86_64 => IH_ARCH_X86_64,
            Self::RiscV => IH_ARCH_RISCV,
            Self::Mips => IH_ARCH_MIPS,
            Self::PowerPc => IH_ARCH_PPC,
        }
    }

    pub const fn fit_name(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
            Self::I386 => "x86",
            Self::X86_64 => "x86_64",
            Self::RiscV => "riscv",
            Self::Mips => "mips",
            Self::PowerPc => "powerpc",
        }
    }

    /// Returns true if a platform of this architecture can run an image
    /// built for `image`. An x86 platform also runs x86_64 images.
    pub fn runs(&self, image: Arch) -> bool {
        *self == image || (*self == Self::I386 && image == Self::X86_64)
    }
}

/// Byte span inside the buffer read from the boot medium.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ByteRange {
    pub offset: usize,
    pub len: usize,
}

impl ByteRange {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// End offset, `None` on overflow.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.len)
    }

    /// Returns the `Range<usize>` if the span fits inside `buf_len`.
    pub fn within(&self, buf_len: usize) -> VbootResult<Range<usize>> {
        match self.end() {
            Some(end) if end <= buf_len => Ok(self.offset..end),
            _ => Err(VbootError::PARSE_TRUNCATED),
        }
    }

    /// Borrow the bytes covered by this range.
    pub fn slice<'a>(&self, buf: &'a [u8]) -> VbootResult<&'a [u8]> {
        let range = self.within(buf.len())?;
        Ok(&buf[range])
    }
}

/// Payload compression as declared by the container.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
    Lzma,
    Lzo,
    Lz4,
    Zstd,
    Unknown,
}

impl Compression {
    /// Decode a Legacy header compression tag.
    pub fn from_legacy_tag(tag: u8) -> Self {
        match tag {
            IH_COMP_NONE => Self::None,
            IH_COMP_GZIP => Self::Gzip,
            IH_COMP_BZIP2 => Self::Bzip2,
            IH_COMP_LZMA => Self::Lzma,
            IH_COMP_LZO => Self::Lzo,
            IH_COMP_LZ4 => Self::Lz4,
            IH_COMP_ZSTD => Self::Zstd,
            _ => Self::Unknown,
        }
    }

    /// Decode a FIT `compression` property.
    pub fn from_fit_name(name: &str) -> Self {
        match name {
            "none" => Self::None,
            "gzip" => Self::Gzip,
            "bzip2" => Self::Bzip2,
            "lzma" => Self::Lzma,
            "lzo" => Self::Lzo,
            "lz4" => Self::Lz4,
            "zstd" => Self::Zstd,
            _ => Self::Unknown,
        }
    }
}

/// One embedded sub-image.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PayloadRange {
    /// Image unit name (FIT) or position (Legacy)
    pub name: String,

    /// Offset of the payload in the source buffer
    pub offset: usize,

    /// Length of the payload
    pub len: usize,

    /// Destination address, if the payload is to be copied
    pub load_address: Option<u64>,

    /// Declared compression
    pub compression: Compression,
}

impl PayloadRange {
    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.offset, self.len)
    }
}

/// Hash or signature requirement
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NodeKind {
    Hash,
    Signature,
}

/// What a verification node covers
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NodeTarget {
    /// Data of the payload at this index of `ImageDescriptor::payload_ranges`
    Image(usize),

    /// The selected configuration, see [`ConfigSignedData`]
    Configuration,
}

/// One hash or signature requirement attached to a payload or to the
/// selected configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VerificationNode {
    /// Diagnostic name, `<image>/<node>` or `<configuration>/<node>`
    pub name: String,

    pub target: NodeTarget,

    pub kind: NodeKind,

    /// `sha256` for hashes, `sha256,rsa2048` for signatures
    pub algo: String,

    /// Trust store key name (signatures only)
    pub key_hint: Option<String>,

    /// Failure of a required node rejects the image
    pub required: bool,

    /// Embedded digest or signature
    pub expected_value: Vec<u8>,
}

/// Checksum embedded in a Legacy header.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeclaredChecksum {
    pub value: u32,
    pub range: ByteRange,
}

/// FIT specific information retained after parsing.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FitInfo {
    /// Name of the selected configuration
    pub configuration: String,

    /// Size of the property tree itself
    pub tree_size: usize,

    /// Image reference properties of the selected configuration
    pub references: Vec<ConfigReference>,

    /// Every image the configuration references, in signing order
    pub signed_images: Vec<SignedImage>,
}

/// Container format together with its format specific header.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ImageFormat {
    Legacy(LegacyHeader),
    Fit(FitInfo),
}

/// Parsed, format-independent view of a candidate image.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageDescriptor {
    pub format: ImageFormat,

    /// Never empty; the first entry is the primary payload
    pub payload_ranges: Vec<PayloadRange>,

    pub load_address: u64,

    pub entry_point: u64,

    pub declared_checksum: Option<DeclaredChecksum>,

    pub verification_nodes: Vec<VerificationNode>,
}

impl ImageDescriptor {
    pub fn is_legacy(&self) -> bool {
        matches!(self.format, ImageFormat::Legacy(_))
    }

    /// Primary payload; `None` only for a descriptor built by hand
    /// without payloads.
    pub fn primary(&self) -> Option<&PayloadRange> {
        self.payload_ranges.first()
    }

    /// Nodes attached to the payload at `image`.
    pub fn nodes_for(&self, image: usize) -> impl Iterator<Item = &VerificationNode> {
        self.verification_nodes
            .iter()
            .filter(move |node| node.target == NodeTarget::Image(image))
    }
}

/// Digest algorithms known to the pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HashId {
    Crc32,
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

/// Fixed capacity digest value.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct DigestBytes {
    algo: HashId,
    len: usize,
    bytes: [u8; MAX_DIGEST_BYTE_SIZE],
}

impl DigestBytes {
    /// Create a digest from raw bytes; `None` if longer than the capacity.
    pub fn new(algo: HashId, value: &[u8]) -> Option<Self> {
        if value.len() > MAX_DIGEST_BYTE_SIZE {
            return None;
        }
        let mut bytes = [0u8; MAX_DIGEST_BYTE_SIZE];
        bytes[..value.len()].copy_from_slice(value);
        Some(Self {
            algo,
            len: value.len(),
            bytes,
        })
    }

    pub fn algo(&self) -> HashId {
        self.algo
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl core::fmt::Debug for DigestBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}(", self.algo)?;
        for b in self.as_bytes() {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}
