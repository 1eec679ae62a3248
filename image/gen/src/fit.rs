/*++

Licensed under the Apache-2.0 license.

File Name:

   fit.rs

Abstract:

    FIT image generator.

--*/

use anyhow::bail;
use vboot_image_types::{
    referenced_names, Arch, ConfigReference, ConfigSignedData, FitImageProps,
};

use crate::{split_algo, FdtWriter, ImageGeneratorCrypto, SigningKey};

/// Where the payload bytes of an image are stored
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DataPlacement {
    /// `data` property inside the tree
    Embedded,

    /// `data-offset` relative to the end of the tree
    External,

    /// `data-position`, absolute offset from the start of the blob
    Position(u32),
}

/// Signature node attached to an image or a configuration
pub struct FitSignature<'a> {
    pub algo: String,
    pub key_name: String,
    pub key: &'a SigningKey,
    pub required: Option<String>,
}

/// Image node
pub struct FitImage<'a> {
    pub name: String,
    pub image_type: String,
    pub arch: Option<String>,
    pub os: Option<String>,
    pub data: Vec<u8>,
    pub load: Option<u64>,
    pub entry: Option<u64>,
    pub compression: Option<String>,
    pub placement: DataPlacement,
    pub hashes: Vec<String>,
    pub signatures: Vec<FitSignature<'a>>,
}

impl<'a> FitImage<'a> {
    pub fn new(name: &str, image_type: &str, data: &[u8]) -> Self {
        Self {
            name: name.into(),
            image_type: image_type.into(),
            arch: Arch::native().map(|arch| arch.fit_name().into()),
            os: Some("linux".into()),
            data: data.to_vec(),
            load: None,
            entry: None,
            compression: None,
            placement: DataPlacement::Embedded,
            hashes: Vec::new(),
            signatures: Vec::new(),
        }
    }

    pub fn arch(mut self, name: &str) -> Self {
        self.arch = Some(name.into());
        self
    }

    pub fn os(mut self, name: &str) -> Self {
        self.os = Some(name.into());
        self
    }

    pub fn load(mut self, addr: u64) -> Self {
        self.load = Some(addr);
        self
    }

    pub fn entry(mut self, addr: u64) -> Self {
        self.entry = Some(addr);
        self
    }

    pub fn compression(mut self, name: &str) -> Self {
        self.compression = Some(name.into());
        self
    }

    pub fn placement(mut self, placement: DataPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn hash(mut self, algo: &str) -> Self {
        self.hashes.push(algo.into());
        self
    }

    pub fn signature(mut self, algo: &str, key_name: &str, key: &'a SigningKey) -> Self {
        self.signatures.push(FitSignature {
            algo: algo.into(),
            key_name: key_name.into(),
            key,
            required: None,
        });
        self
    }

    pub fn required_signature(mut self, algo: &str, key_name: &str, key: &'a SigningKey) -> Self {
        self.signatures.push(FitSignature {
            algo: algo.into(),
            key_name: key_name.into(),
            key,
            required: Some("image".into()),
        });
        self
    }

    /// Properties as written to the image node
    fn props(&self) -> FitImageProps {
        FitImageProps {
            image_type: Some(self.image_type.clone()),
            arch: self.arch.clone(),
            os: self.os.clone(),
            compression: Some(self.compression.clone().unwrap_or_else(|| "none".into())),
            load: self.load,
            entry: self.entry,
        }
    }
}

/// Configuration node
#[derive(Default)]
pub struct FitConfig<'a> {
    pub name: String,
    pub firmware: Option<String>,
    pub kernel: Option<String>,
    pub fdt: Option<String>,
    pub ramdisk: Option<String>,
    pub loadables: Vec<String>,
    pub signatures: Vec<FitSignature<'a>>,
}

impl<'a> FitConfig<'a> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn firmware(mut self, image: &str) -> Self {
        self.firmware = Some(image.into());
        self
    }

    pub fn kernel(mut self, image: &str) -> Self {
        self.kernel = Some(image.into());
        self
    }

    pub fn fdt(mut self, image: &str) -> Self {
        self.fdt = Some(image.into());
        self
    }

    pub fn ramdisk(mut self, image: &str) -> Self {
        self.ramdisk = Some(image.into());
        self
    }

    pub fn loadable(mut self, image: &str) -> Self {
        self.loadables.push(image.into());
        self
    }

    pub fn signature(mut self, algo: &str, key_name: &str, key: &'a SigningKey) -> Self {
        self.signatures.push(FitSignature {
            algo: algo.into(),
            key_name: key_name.into(),
            key,
            required: None,
        });
        self
    }

    pub fn required_signature(mut self, algo: &str, key_name: &str, key: &'a SigningKey) -> Self {
        self.signatures.push(FitSignature {
            algo: algo.into(),
            key_name: key_name.into(),
            key,
            required: Some("conf".into()),
        });
        self
    }

    /// Reference properties in the order they are signed
    fn references(&self) -> Vec<ConfigReference> {
        let single = |property: &str, image: &Option<String>| {
            image.as_ref().map(|name| ConfigReference {
                property: property.into(),
                images: vec![name.clone()],
            })
        };
        let mut refs: Vec<ConfigReference> = [
            single("firmware", &self.firmware),
            single("kernel", &self.kernel),
            single("fdt", &self.fdt),
            single("ramdisk", &self.ramdisk),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !self.loadables.is_empty() {
            refs.push(ConfigReference {
                property: "loadables".into(),
                images: self.loadables.clone(),
            });
        }
        refs
    }
}

/// FIT image generator
pub struct FitGenerator<'a, Crypto: ImageGeneratorCrypto> {
    crypto: Crypto,
    images: Vec<FitImage<'a>>,
    configs: Vec<FitConfig<'a>>,
    default_config: Option<String>,
}

fn align4(val: usize) -> usize {
    (val + 3) & !3
}

fn addr_prop(w: &mut FdtWriter, name: &str, addr: u64) {
    match u32::try_from(addr) {
        Ok(addr) => w.prop_u32(name, addr),
        Err(_) => w.prop_u64(name, addr),
    }
}

impl<'a, Crypto: ImageGeneratorCrypto> FitGenerator<'a, Crypto> {
    pub fn new(crypto: Crypto) -> Self {
        Self {
            crypto,
            images: Vec::new(),
            configs: Vec::new(),
            default_config: None,
        }
    }

    pub fn image(mut self, image: FitImage<'a>) -> Self {
        self.images.push(image);
        self
    }

    pub fn config(mut self, config: FitConfig<'a>) -> Self {
        self.configs.push(config);
        self
    }

    pub fn default_config(mut self, name: &str) -> Self {
        self.default_config = Some(name.into());
        self
    }

    /// Message covered by a signature of `config` using `hash`
    fn config_signed_data(&self, config: &FitConfig, hash: &str) -> anyhow::Result<Vec<u8>> {
        let refs = config.references();
        let mut data = ConfigSignedData::new(&config.name, &refs);
        for name in referenced_names(&refs) {
            let Some(image) = self.images.iter().find(|image| image.name == name) else {
                bail!("configuration {} references missing image {name}", config.name);
            };
            data.image(name, &image.props(), &self.crypto.digest(hash, &image.data)?);
        }
        Ok(data.finish())
    }

    /// Generate the image blob
    pub fn generate(&self) -> anyhow::Result<Vec<u8>> {
        let mut w = FdtWriter::new();
        let mut external = Vec::new();
        let mut positioned = Vec::new();

        w.begin_node("");
        w.prop_str("description", "boot image");
        w.prop_u32("#address-cells", 1);

        w.begin_node("images");
        for image in &self.images {
            w.begin_node(&image.name);
            w.prop_str("description", &image.name);
            w.prop_str("type", &image.image_type);
            if let Some(arch) = &image.arch {
                w.prop_str("arch", arch);
            }
            if let Some(os) = &image.os {
                w.prop_str("os", os);
            }
            w.prop_str(
                "compression",
                image.compression.as_deref().unwrap_or("none"),
            );
            if let Some(load) = image.load {
                addr_prop(&mut w, "load", load);
            }
            if let Some(entry) = image.entry {
                addr_prop(&mut w, "entry", entry);
            }
            match image.placement {
                DataPlacement::Embedded => w.prop("data", &image.data),
                DataPlacement::External => {
                    w.prop_u32("data-offset", external.len() as u32);
                    w.prop_u32("data-size", image.data.len() as u32);
                    external.extend_from_slice(&image.data);
                    external.resize(align4(external.len()), 0);
                }
                DataPlacement::Position(pos) => {
                    w.prop_u32("data-position", pos);
                    w.prop_u32("data-size", image.data.len() as u32);
                    positioned.push((pos as usize, &image.data));
                }
            }

            for (i, algo) in image.hashes.iter().enumerate() {
                w.begin_node(&format!("hash-{}", i + 1));
                w.prop_str("algo", algo);
                w.prop("value", &self.crypto.digest(algo, &image.data)?);
                w.end_node();
            }

            for (i, sig) in image.signatures.iter().enumerate() {
                let (hash, _) = split_algo(&sig.algo)?;
                let digest = self.crypto.digest(hash, &image.data)?;
                w.begin_node(&format!("signature-{}", i + 1));
                w.prop_str("algo", &sig.algo);
                w.prop_str("key-name-hint", &sig.key_name);
                if let Some(required) = &sig.required {
                    w.prop_str("required", required);
                }
                w.prop("value", &self.crypto.sign(sig.key, hash, &digest)?);
                w.end_node();
            }
            w.end_node();
        }
        w.end_node();

        w.begin_node("configurations");
        if let Some(default) = &self.default_config {
            w.prop_str("default", default);
        }
        for config in &self.configs {
            w.begin_node(&config.name);
            if let Some(firmware) = &config.firmware {
                w.prop_str("firmware", firmware);
            }
            if let Some(kernel) = &config.kernel {
                w.prop_str("kernel", kernel);
            }
            if let Some(fdt) = &config.fdt {
                w.prop_str("fdt", fdt);
            }
            if let Some(ramdisk) = &config.ramdisk {
                w.prop_str("ramdisk", ramdisk);
            }
            if !config.loadables.is_empty() {
                let loadables: Vec<&str> = config.loadables.iter().map(String::as_str).collect();
                w.prop_str_list("loadables", &loadables);
            }

            for (i, sig) in config.signatures.iter().enumerate() {
                let (hash, _) = split_algo(&sig.algo)?;
                let digest = self
                    .crypto
                    .digest(hash, &self.config_signed_data(config, hash)?)?;
                w.begin_node(&format!("signature-{}", i + 1));
                w.prop_str("algo", &sig.algo);
                w.prop_str("key-name-hint", &sig.key_name);
                if let Some(required) = &sig.required {
                    w.prop_str("required", required);
                }
                w.prop("value", &self.crypto.sign(sig.key, hash, &digest)?);
                w.end_node();
            }
            w.end_node();
        }
        w.end_node();
        w.end_node();

        let mut blob = w.finish();
        if !external.is_empty() {
            blob.resize(align4(blob.len()), 0);
            blob.extend_from_slice(&external);
        }
        for (pos, data) in positioned {
            if pos < blob.len() {
                bail!("data-position {pos:#x} overlaps earlier content");
            }
            blob.resize(pos, 0);
            blob.extend_from_slice(data);
        }
        Ok(blob)
    }
}
