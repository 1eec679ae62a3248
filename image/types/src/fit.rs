/*++

Licensed under the Apache-2.0 license.

File Name:

    fit.rs

Abstract:

    File contains the data covered by a FIT configuration signature.

--*/

use alloc::string::String;
use alloc::vec::Vec;

use crate::ByteRange;

/// Configuration properties that reference images, in signing order.
pub const CONFIG_REFERENCE_PROPS: [&str; 5] = ["firmware", "kernel", "fdt", "ramdisk", "loadables"];

const CONFIG_SIGNATURE_CONTEXT: &[u8] = b"FIT configuration signature\0";

/// One image reference property of a configuration.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ConfigReference {
    pub property: String,
    pub images: Vec<String>,
}

/// Image node properties bound by a configuration signature.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FitImageProps {
    pub image_type: Option<String>,
    pub arch: Option<String>,
    pub os: Option<String>,
    pub compression: Option<String>,
    pub load: Option<u64>,
    pub entry: Option<u64>,
}

/// Image covered by a configuration signature.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SignedImage {
    pub name: String,
    pub props: FitImageProps,

    /// Location of the image data in the FIT buffer
    pub data: ByteRange,
}

/// Names referenced by `references`, first occurrence only.
pub fn referenced_names(references: &[ConfigReference]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for name in references.iter().flat_map(|r| r.images.iter()) {
        if !names.contains(&name.as_str()) {
            names.push(name);
        }
    }
    names
}

/// Builder for the message a configuration signature is computed over.
///
/// The message binds the configuration name, every reference property
/// with its image names, and for each referenced image its name, the
/// properties in [`FitImageProps`] and a digest of its data. Strings are
/// length prefixed and optional fields carry a presence byte, so no two
/// distinct configurations encode to the same bytes.
#[derive(Debug, Clone)]
pub struct ConfigSignedData {
    buf: Vec<u8>,
}

impl ConfigSignedData {
    pub fn new(configuration: &str, references: &[ConfigReference]) -> Self {
        let mut data = Self {
            buf: CONFIG_SIGNATURE_CONTEXT.to_vec(),
        };
        data.put_bytes(configuration.as_bytes());
        data.put_u32(references.len() as u32);
        for reference in references {
            data.put_bytes(reference.property.as_bytes());
            data.put_u32(reference.images.len() as u32);
            for image in &reference.images {
                data.put_bytes(image.as_bytes());
            }
        }
        data
    }

    /// Append one referenced image. Images must be appended in
    /// [`referenced_names`] order.
    pub fn image(&mut self, name: &str, props: &FitImageProps, data_digest: &[u8]) {
        self.put_bytes(name.as_bytes());
        self.put_opt_str(props.image_type.as_deref());
        self.put_opt_str(props.arch.as_deref());
        self.put_opt_str(props.os.as_deref());
        self.put_opt_str(props.compression.as_deref());
        self.put_opt_u64(props.load);
        self.put_opt_u64(props.entry);
        self.put_bytes(data_digest);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn put_u32(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_be_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    fn put_opt_str(&mut self, val: Option<&str>) {
        match val {
            Some(s) => {
                self.buf.push(1);
                self.put_bytes(s.as_bytes());
            }
            None => self.buf.push(0),
        }
    }

    fn put_opt_u64(&mut self, val: Option<u64>) {
        match val {
            Some(v) => {
                self.buf.push(1);
                self.buf.extend_from_slice(&v.to_be_bytes());
            }
            None => self.buf.push(0),
        }
    }
}
