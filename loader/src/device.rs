/*++

Licensed under the Apache-2.0 license.

File Name:

    device.rs

Abstract:

    Boot device names and their textual form, e.g. `mmc1`,
    `mmc0@0x8000` or `net0:/boot/fit.itb`.

--*/

use alloc::string::String;
use ufmt::{uDisplay, uWrite};

use crate::print::HexU64;

/// Class of boot medium
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceKind {
    Mmc,
    SpiFlash,
    Nand,
    Network,
    Ram,
    Usb,
    Sata,
}

impl DeviceKind {
    const ALL: [DeviceKind; 7] = [
        DeviceKind::Mmc,
        DeviceKind::SpiFlash,
        DeviceKind::Nand,
        DeviceKind::Network,
        DeviceKind::Ram,
        DeviceKind::Usb,
        DeviceKind::Sata,
    ];

    /// Name prefix used in boot target lists
    pub fn prefix(&self) -> &'static str {
        match self {
            DeviceKind::Mmc => "mmc",
            DeviceKind::SpiFlash => "spi",
            DeviceKind::Nand => "nand",
            DeviceKind::Network => "net",
            DeviceKind::Ram => "ram",
            DeviceKind::Usb => "usb",
            DeviceKind::Sata => "sata",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

/// How the image is located on the medium
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AccessMode {
    /// Image starts at a fixed byte offset
    Raw { offset: u64 },

    /// Image is a file on the medium
    Filesystem { path: String },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BootDevice {
    pub kind: DeviceKind,
    pub ordinal: u8,
    pub mode: AccessMode,
}

impl BootDevice {
    pub fn raw(kind: DeviceKind, ordinal: u8, offset: u64) -> Self {
        Self {
            kind,
            ordinal,
            mode: AccessMode::Raw { offset },
        }
    }

    pub fn file(kind: DeviceKind, ordinal: u8, path: &str) -> Self {
        Self {
            kind,
            ordinal,
            mode: AccessMode::Filesystem { path: path.into() },
        }
    }

    /// Parse one boot target.
    ///
    /// `<kind><ordinal>` reads the image at offset zero, `@<offset>`
    /// (decimal or `0x` hex) selects another raw offset and `:<path>`
    /// names a file. Returns `None` for anything else.
    pub fn parse(target: &str) -> Option<Self> {
        let (name, mode) = if let Some((name, path)) = target.split_once(':') {
            if path.is_empty() {
                return None;
            }
            (name, AccessMode::Filesystem { path: path.into() })
        } else if let Some((name, offset)) = target.split_once('@') {
            (name, AccessMode::Raw {
                offset: parse_number(offset)?,
            })
        } else {
            (target, AccessMode::Raw { offset: 0 })
        };

        let digits = name.find(|c: char| c.is_ascii_digit())?;
        let (prefix, ordinal) = name.split_at(digits);
        Some(Self {
            kind: DeviceKind::from_prefix(prefix)?,
            ordinal: ordinal.parse().ok()?,
            mode,
        })
    }

    /// Byte offset of a raw image
    pub fn offset(&self) -> Option<u64> {
        match self.mode {
            AccessMode::Raw { offset } => Some(offset),
            AccessMode::Filesystem { .. } => None,
        }
    }
}

fn parse_number(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

impl uDisplay for BootDevice {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        ufmt::uwrite!(f, "{}{}", self.kind.prefix(), self.ordinal)?;
        match &self.mode {
            AccessMode::Raw { offset: 0 } => Ok(()),
            AccessMode::Raw { offset } => ufmt::uwrite!(f, "@{}", HexU64(*offset)),
            AccessMode::Filesystem { path } => ufmt::uwrite!(f, ":{}", path.as_str()),
        }
    }
}
